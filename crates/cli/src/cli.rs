//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::BackendKind;
use std::path::PathBuf;

/// kinect-sync - synchronized Kinect v2 color/IR/depth acquisition
#[derive(Parser, Debug)]
#[command(
    name = "kinect-sync",
    author,
    version,
    about = "Synchronized Kinect v2 color, infrared and depth acquisition",
    long_about = "Opens a Kinect v2 device through the configured processing pipeline, \n\
                  captures synchronized color/infrared/depth bundles, registers them \n\
                  and optionally remaps the result into the legacy 640x480 canvas."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "KINECT_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "KINECT_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture synchronized frames until Ctrl+C or --max-frames
    Run(RunArgs),

    /// Open the device, capture a fixed number of frames and report
    Selftest(SelftestArgs),

    /// List connected devices and available pipelines
    Devices(DevicesArgs),

    /// Validate a configuration file without opening a device
    Validate(ValidateArgs),
}

/// Options shared by commands that open a device
#[derive(Parser, Debug, Clone)]
pub struct DeviceArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when absent
    #[arg(short, long, env = "KINECT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the device serial from configuration
    #[arg(long, env = "KINECT_SYNC_SERIAL")]
    pub serial: Option<String>,

    /// Override the processing pipeline (cpu, opengl, opencl, opencl_kde, cuda, cuda_kde)
    #[arg(long, env = "KINECT_SYNC_BACKEND")]
    pub backend: Option<BackendKind>,

    /// GPU index for GPU pipelines
    #[arg(long, env = "KINECT_SYNC_GPU_ID")]
    pub gpu_id: Option<u32>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Maximum number of frames to capture (0 = unlimited)
    #[arg(long, default_value = "0", env = "KINECT_SYNC_MAX_FRAMES")]
    pub max_frames: u64,

    /// Mirror the depth buffer horizontally
    #[arg(long)]
    pub mirror: bool,

    /// Remap registered output into the legacy 640x480 canvas
    #[arg(long)]
    pub legacy_remap: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "KINECT_SYNC_METRICS_PORT")]
    pub metrics_port: u16,

    /// Log a progress line every N frames (0 = never)
    #[arg(long, default_value = "30")]
    pub report_every: u64,
}

/// Arguments for the `selftest` command
#[derive(Parser, Debug, Clone)]
pub struct SelftestArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Frames to capture
    #[arg(long, default_value = "30")]
    pub frames: usize,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `devices` command
#[derive(Parser, Debug, Clone)]
pub struct DevicesArgs {
    /// Path to configuration file (mock driver setup)
    #[arg(short, long, env = "KINECT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "kinect-sync.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "kinect-sync",
            "-vv",
            "run",
            "--backend",
            "opencl-kde",
            "--serial",
            "011054343347",
            "--max-frames",
            "100",
            "--legacy-remap",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.device.backend, Some(BackendKind::OpenClKde));
        assert_eq!(args.device.serial.as_deref(), Some("011054343347"));
        assert_eq!(args.max_frames, 100);
        assert!(args.legacy_remap);
        assert!(!args.mirror);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["kinect-sync", "run", "--backend", "vulkan"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["kinect-sync", "-q", "-v", "devices"]).is_err());
    }
}
