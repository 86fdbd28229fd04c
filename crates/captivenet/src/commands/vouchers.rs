//! Voucher command handlers.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tabled::Tabled;

use captivenet_core::{
    Action, Command as CoreCommand, CommandResult, Console, GenerateVouchersRequest,
    RedeemVoucherRequest, Role, Session, Voucher,
};

use crate::cli::{GlobalOpts, VouchersArgs, VouchersCommand};
use crate::error::CliError;
use crate::output;

use super::{sessions, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct VoucherRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Plan")]
    plan: u64,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Uses")]
    uses: String,
    #[tabled(rename = "Valid Until")]
    valid_until: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

impl VoucherRow {
    fn new(v: &Voucher, now: DateTime<Utc>, color: bool) -> Self {
        Self {
            code: v.code.to_string(),
            plan: v.plan_id.get(),
            status: output::paint_voucher_status(v.status_at(now), color),
            uses: format!("{}/{}", v.used_count, v.max_uses),
            valid_until: output::fmt_time(v.valid_until),
            notes: v.notes.clone().unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct Redemption {
    session: Arc<Session>,
    voucher: Arc<Voucher>,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    console: &Console,
    args: VouchersArgs,
    role: &Role,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let now = console.now();
    let show_list = |vouchers: &[Arc<Voucher>]| {
        let out = output::render_list(
            &global.output,
            vouchers,
            |v| VoucherRow::new(v, now, color),
            |v| v.code.to_string(),
        );
        output::print_output(&out, global.quiet);
    };

    match args.command {
        VouchersCommand::List { status } => {
            util::require(console, role, Action::GenerateVoucher)?;
            let vouchers: Vec<_> = console
                .vouchers_snapshot()
                .into_iter()
                .filter(|v| status.is_none_or(|s| v.status_at(now) == s))
                .collect();
            show_list(vouchers.as_slice());
            Ok(())
        }

        VouchersCommand::Generate {
            plan,
            quantity,
            max_uses,
            valid_for,
            notes,
        } => {
            let valid_until = valid_for
                .map(|d| {
                    TimeDelta::from_std(d.into()).map_err(|_| CliError::Validation {
                        field: "valid-for".into(),
                        reason: "duration out of range".into(),
                    })
                })
                .transpose()?
                .map(|offset| now + offset);
            let req = GenerateVouchersRequest {
                plan_id: plan,
                quantity,
                max_uses,
                valid_from: None,
                valid_until,
                notes,
                created_by: None,
            };
            let result = console
                .execute_as(role, CoreCommand::GenerateVouchers(req))
                .await?;
            if let CommandResult::Vouchers(vouchers) = result {
                output::notice(
                    &format!("Generated {} voucher(s) for plan {plan}", vouchers.len()),
                    global.quiet,
                );
                show_list(vouchers.as_slice());
            }
            Ok(())
        }

        VouchersCommand::Redeem {
            code,
            mac,
            device_name,
            ip,
        } => {
            let req = RedeemVoucherRequest {
                code,
                device: util::device(&mac, device_name, ip)?,
            };
            if let CommandResult::Redeemed { session, voucher } =
                console.execute(CoreCommand::RedeemVoucher(req)).await?
            {
                let redemption = Redemption { session, voucher };
                let out = output::render_single(
                    &global.output,
                    &redemption,
                    |r| {
                        format!(
                            "Redeemed {} ({} use(s) left)\n\n{}",
                            r.voucher.code,
                            r.voucher.uses_remaining(),
                            sessions::detail(&r.session, now, color)
                        )
                    },
                    |r| r.session.id.to_string(),
                );
                output::print_output(&out, global.quiet);
            }
            Ok(())
        }

        VouchersCommand::Revoke { code } => {
            if !util::confirm(&format!("Revoke voucher {code}?"), global.yes)? {
                return Ok(());
            }
            let result = console
                .execute_as(role, CoreCommand::RevokeVoucher { code })
                .await?;
            if let CommandResult::Voucher(voucher) = result {
                output::notice(&format!("Voucher {} revoked", voucher.code), global.quiet);
                show_list(std::slice::from_ref(&voucher));
            }
            Ok(())
        }
    }
}
