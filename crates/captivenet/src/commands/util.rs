//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::net::IpAddr;

use captivenet_core::{Action, Console, DeviceRef, MacAddress, Role};

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.trim_end_matches('?').into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Read-only views are gated like commands: the role needs `action`.
pub fn require(console: &Console, role: &Role, action: Action) -> Result<(), CliError> {
    console.policy().require(role, None, action)?;
    Ok(())
}

pub fn device(mac: &str, name: String, ip: Option<IpAddr>) -> Result<DeviceRef, CliError> {
    let mac = MacAddress::new(mac);
    let well_formed = mac.as_str().split(':').count() == 6
        && mac
            .as_str()
            .split(':')
            .all(|octet| octet.len() == 2 && octet.bytes().all(|b| b.is_ascii_hexdigit()));
    if !well_formed {
        return Err(CliError::Validation {
            field: "mac".into(),
            reason: format!("expected six hex octets, got '{mac}'"),
        });
    }
    Ok(DeviceRef { name, mac, ip })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_mac_is_normalized_and_checked() {
        let d = device("AA-BB-CC-DD-EE-0F", "phone".into(), None).unwrap();
        assert_eq!(d.mac.as_str(), "aa:bb:cc:dd:ee:0f");
        assert!(matches!(
            device("aa:bb:cc", "phone".into(), None),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn yes_flag_skips_prompt() {
        assert!(confirm("Terminate session 1?", true).unwrap());
    }
}
