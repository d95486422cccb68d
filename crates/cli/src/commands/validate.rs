//! `validate` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use contracts::SessionConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    serial: Option<String>,
    backend: String,
    gpu_id: u32,
    depth_range_m: (f32, f32),
    timeout_ms: u64,
    probe_timeout_ms: u64,
    mirror_depth: bool,
    legacy_remap: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(&args.config);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(path: &Path) -> ValidationResult {
    let config_path = path.display().to_string();

    if !path.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", path.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(path) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: config.version.clone(),
                    serial: config.device.serial.clone(),
                    backend: config.pipeline.backend.to_string(),
                    gpu_id: config.pipeline.gpu_id,
                    depth_range_m: (config.depth.min_depth_m, config.depth.max_depth_m),
                    timeout_ms: config.capture.timeout_ms,
                    probe_timeout_ms: config.capture.probe_timeout_ms,
                    mirror_depth: config.capture.mirror_depth,
                    legacy_remap: config.capture.legacy_remap,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(config: &SessionConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.pipeline.backend.uses_gpu_id() && config.pipeline.gpu_id != 0 {
        warnings.push(format!(
            "pipeline.gpu_id is ignored by the '{}' pipeline",
            config.pipeline.backend
        ));
    }

    if !config.mock.backends.contains(&config.pipeline.backend) {
        warnings.push(format!(
            "pipeline '{}' is not offered by the mock driver",
            config.pipeline.backend
        ));
    }

    if let Some(serial) = &config.device.serial {
        let known = (0..config.mock.device_count).any(|i| config.mock.serial_at(i) == *serial);
        if !known {
            warnings.push(format!("device serial '{serial}' is not enumerated by the mock driver"));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Device: {}",
                summary.serial.as_deref().unwrap_or("first enumerated")
            );
            println!("  Pipeline: {} (gpu {})", summary.backend, summary.gpu_id);
            println!(
                "  Depth range: {:.2} - {:.2} m",
                summary.depth_range_m.0, summary.depth_range_m.1
            );
            println!(
                "  Timeouts: {} ms (probe {} ms)",
                summary.timeout_ms, summary.probe_timeout_ms
            );
            println!("  Mirror depth: {}", summary.mirror_depth);
            println!("  Legacy remap: {}", summary.legacy_remap);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
