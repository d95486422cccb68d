//! Command implementations.

mod devices;
mod run;
mod selftest;
mod validate;

pub use devices::run_devices;
pub use run::run_capture;
pub use selftest::run_selftest;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::SessionConfig;
use tracing::info;

use crate::cli::DeviceArgs;

/// Load the config file, or defaults when no path was given
pub(crate) fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(SessionConfig::default())
        }
    }
}

/// Load the configuration and apply the device overrides from the command line
pub(crate) fn resolve_config(args: &DeviceArgs) -> Result<SessionConfig> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(serial) = &args.serial {
        info!(serial = %serial, "Overriding device serial from CLI");
        config.device.serial = Some(serial.clone());
    }
    if let Some(backend) = args.backend {
        info!(backend = %backend, "Overriding pipeline from CLI");
        config.pipeline.backend = backend;
    }
    if let Some(gpu_id) = args.gpu_id {
        config.pipeline.gpu_id = gpu_id;
    }

    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;
    Ok(config)
}
