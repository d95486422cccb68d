//! `selftest` command implementation.

use anyhow::{Context, Result};
use contracts::{SensorGeometry, Timestamps};
use device::MockDriver;
use serde::Serialize;
use session::{SelftestReport, Session};
use tracing::info;

use super::resolve_config;
use crate::cli::SelftestArgs;

#[derive(Serialize)]
struct SelftestOutput {
    serial: String,
    firmware: String,
    backend: String,
    geometry: SensorGeometry,
    frames: Vec<Timestamps>,
    monotonic: bool,
}

/// Execute the `selftest` command
pub fn run_selftest(args: &SelftestArgs) -> Result<()> {
    let config = resolve_config(&args.device)?;
    let driver = MockDriver::with_config(config.mock.clone());
    let mut session = Session::new(driver, config);

    info!(frames = args.frames, "Running selftest");
    let report = session.selftest(args.frames).context("Selftest failed")?;
    let output = to_output(&report);

    if args.json {
        let json = serde_json::to_string_pretty(&output)
            .context("Failed to serialize selftest report")?;
        println!("{}", json);
    } else {
        print_report(&output);
    }

    if output.monotonic {
        Ok(())
    } else {
        anyhow::bail!("Timestamps went backwards during selftest")
    }
}

fn to_output(report: &SelftestReport) -> SelftestOutput {
    let monotonic = report
        .timestamps
        .windows(2)
        .all(|pair| pair[1].not_before(&pair[0]));

    SelftestOutput {
        serial: report.serial.clone(),
        firmware: report.firmware.clone(),
        backend: report.backend.to_string(),
        geometry: report.geometry,
        frames: report.timestamps.clone(),
        monotonic,
    }
}

fn print_report(output: &SelftestOutput) {
    println!("Device {} (firmware {})", output.serial, output.firmware);
    println!("Pipeline: {}", output.backend);

    let geometry = &output.geometry;
    println!("\nGeometry:");
    println!("  color:       {}", geometry.color);
    println!("  infrared:    {}", geometry.infrared);
    println!("  depth:       {}", geometry.depth);
    println!("  registered:  {}", geometry.registered);
    println!("  undistorted: {}", geometry.undistorted);

    println!("\nTimestamps (color / infrared / depth):");
    for (index, ts) in output.frames.iter().enumerate() {
        println!("  {:>3}: {} / {} / {}", index, ts.color, ts.infrared, ts.depth);
    }

    if output.monotonic {
        println!("\nSelftest passed: {} frames", output.frames.len());
    } else {
        println!("\nSelftest failed: timestamps are not monotonic");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BackendKind, StreamGeometry};

    fn report(timestamps: Vec<Timestamps>) -> SelftestReport {
        let stream = StreamGeometry::new(4, 2, 4);
        SelftestReport {
            serial: "S".into(),
            firmware: "F".into(),
            backend: BackendKind::Cpu,
            geometry: SensorGeometry {
                color: stream,
                infrared: stream,
                depth: stream,
                registered: stream,
                undistorted: stream,
            },
            timestamps,
        }
    }

    fn ts(tick: u32) -> Timestamps {
        Timestamps {
            color: tick,
            infrared: tick,
            depth: tick,
        }
    }

    #[test]
    fn test_monotonic_detection() {
        assert!(to_output(&report(vec![ts(1), ts(2), ts(2)])).monotonic);
        assert!(!to_output(&report(vec![ts(3), ts(2)])).monotonic);
    }

    #[test]
    fn test_output_serializes() {
        let output = to_output(&report(vec![ts(333)]));
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["backend"], "cpu");
        assert_eq!(json["frames"][0]["depth"], 333);
        assert_eq!(json["geometry"]["color"]["width"], 4);
    }
}
