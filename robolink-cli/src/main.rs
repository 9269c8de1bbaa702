// robolink command line interface
// Classifies camera frames and forwards the recognized gesture to a robot over MQTT

mod pipeline;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use robolink_core::{CaptureSource, PayloadFormat, RobolinkConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Picked up when no `--config` is given
const DEFAULT_CONFIG_FILE: &str = "robolink.toml";

#[derive(Parser)]
#[command(name = "robolink")]
#[command(about = "Vision classifier to robot command bridge", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start classifying and publishing commands
    ///
    /// Frames come from camera 0 unless --images or the config file names
    /// another source. Reading a camera needs a build with the camera
    /// feature (cargo build --features camera); other builds must be given
    /// --images <DIR>.
    Run(RunArgs),

    /// Download (or verify) the model bundle and exit
    FetchModel {
        /// Model bundle location (https URL or local directory)
        #[arg(long)]
        model: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Broker URL, e.g. wss://test.mosquitto.org:8081/mqtt
    #[arg(long)]
    broker: Option<String>,

    /// Receiving device identifier
    #[arg(long)]
    device_id: Option<String>,

    /// Heartbeat interval for an unchanged label, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Model bundle location (https URL or local directory)
    #[arg(long)]
    model: Option<String>,

    /// Replay still images from a directory instead of a camera (required
    /// unless built with the camera feature)
    #[arg(long, value_name = "DIR", conflicts_with = "camera")]
    images: Option<PathBuf>,

    /// Camera device index (needs the camera feature)
    #[arg(long)]
    camera: Option<u32>,

    /// Do not mirror frames horizontally
    #[arg(long)]
    no_mirror: bool,

    /// command, raw-label or label-with-confidence
    #[arg(long)]
    payload_format: Option<PayloadFormat>,
}

impl RunArgs {
    fn apply(&self, config: &mut RobolinkConfig) {
        if let Some(url) = &self.broker {
            config.broker.url = url.clone();
        }
        if let Some(device_id) = &self.device_id {
            config.broker.device_id = device_id.clone();
        }
        if let Some(interval) = self.interval_ms {
            config.gate.interval_ms = interval;
        }
        if let Some(model) = &self.model {
            config.model.source = model.clone();
        }
        if let Some(path) = &self.images {
            config.capture.source = CaptureSource::Directory { path: path.clone() };
        }
        if let Some(index) = self.camera {
            config.capture.source = CaptureSource::Camera { index };
        }
        if self.no_mirror {
            config.capture.mirror = false;
        }
        if let Some(format) = self.payload_format {
            config.gate.payload_format = format;
        }
    }
}

fn init_tracing(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{}'", level))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// File (explicit or `./robolink.toml`), then `ROBOLINK_*` variables.
fn load_config(path: Option<&Path>) -> anyhow::Result<RobolinkConfig> {
    let mut config = match path {
        Some(path) => RobolinkConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            RobolinkConfig::from_file(DEFAULT_CONFIG_FILE)
                .with_context(|| format!("failed to load {}", DEFAULT_CONFIG_FILE))?
        }
        None => RobolinkConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config);
            config.validate().map_err(|e| anyhow!("invalid configuration: {}", e))?;
            let report = pipeline::run(config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::FetchModel { model } => {
            if let Some(model) = model {
                config.model.source = model;
            }
            config.model.validate().map_err(|e| anyhow!("invalid model configuration: {}", e))?;
            let bundle = pipeline::fetch_bundle(&config.model).await?;
            println!(
                "{} ({} labels: {})",
                bundle.model_path.display(),
                bundle.metadata.labels.len(),
                bundle.metadata.labels.join(", ")
            );
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
