//! `devices` command implementation.

use anyhow::{Context, Result};
use contracts::{DeviceDriver, SessionConfig};
use device::MockDriver;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::DevicesArgs;

#[derive(Serialize, Debug, PartialEq)]
struct DeviceListing {
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_serial: Option<String>,
    serials: Vec<String>,
    pipelines: Vec<String>,
}

/// Execute the `devices` command
pub fn run_devices(args: &DevicesArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let listing = list_devices(&config);
    info!(count = listing.count, "Devices enumerated");

    if args.json {
        let json = serde_json::to_string_pretty(&listing)
            .context("Failed to serialize device listing")?;
        println!("{}", json);
    } else {
        print_listing(&listing);
    }
    Ok(())
}

fn list_devices(config: &SessionConfig) -> DeviceListing {
    let mut driver = MockDriver::with_config(config.mock.clone());
    let count = driver.enumerate_devices();

    DeviceListing {
        count,
        default_serial: driver.default_serial(),
        serials: driver.serials(),
        pipelines: driver
            .available_backends()
            .into_iter()
            .map(|kind| kind.to_string())
            .collect(),
    }
}

fn print_listing(listing: &DeviceListing) {
    if listing.count == 0 {
        println!("No Kinect v2 device connected");
        return;
    }

    println!("Devices ({}):", listing.count);
    for serial in &listing.serials {
        let marker = if listing.default_serial.as_deref() == Some(serial.as_str()) {
            " (default)"
        } else {
            ""
        };
        println!("  - {}{}", serial, marker);
    }
    println!("\nPipelines: {}", listing.pipelines.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_configured_devices() {
        let mut config = SessionConfig::default();
        config.mock.device_count = 2;
        config.mock.serials = vec!["FIRST".into()];

        let listing = list_devices(&config);
        assert_eq!(listing.count, 2);
        assert_eq!(listing.default_serial.as_deref(), Some("FIRST"));
        assert_eq!(listing.serials, vec!["FIRST".to_string(), "500000000001".to_string()]);
        assert_eq!(listing.pipelines, vec!["cpu".to_string(), "opengl".to_string()]);
    }

    #[test]
    fn test_list_without_devices() {
        let mut config = SessionConfig::default();
        config.mock.device_count = 0;

        let listing = list_devices(&config);
        assert_eq!(listing.count, 0);
        assert_eq!(listing.default_serial, None);
        let json = serde_json::to_value(&listing).unwrap();
        assert!(json.get("default_serial").is_none());
    }
}
