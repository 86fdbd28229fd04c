//! Plan catalog listing.

use tabled::Tabled;

use captivenet_core::{Console, Plan};

use crate::cli::{GlobalOpts, PlansArgs, PlansCommand};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    plan_type: String,
    #[tabled(rename = "Data")]
    data: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Devices")]
    devices: u32,
    #[tabled(rename = "Price")]
    price: String,
}

impl From<&Plan> for PlanRow {
    fn from(p: &Plan) -> Self {
        Self {
            id: p.id.get(),
            code: p.code.clone(),
            name: p.name.clone(),
            plan_type: p.plan_type.to_string(),
            data: output::fmt_bytes(p.data_quota_bytes),
            time: output::fmt_secs(p.time_quota_secs),
            devices: p.max_devices,
            price: format!(
                "{}.{:02} {}",
                p.price_cents / 100,
                p.price_cents % 100,
                p.currency
            ),
        }
    }
}

pub fn handle(console: &Console, args: PlansArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        PlansCommand::List => {
            let plans = &console.config().plans;
            let out = output::render_list(
                &global.output,
                plans,
                |p| PlanRow::from(p),
                |p| p.code.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
