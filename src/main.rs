use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod acquisition;
mod config;
mod display;
mod error;
mod frame;
mod permission;
mod prompt;
mod server;
mod shell;
mod transform;

#[derive(Parser, Debug)]
#[command(name = "grayscale-shell")]
#[command(about = "Capture or pick a photo and display its grayscale rendition")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "SHELL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SHELL_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 20MB)
    #[arg(long, env = "SHELL_MAX_FILE_SIZE", default_value = "20971520")]
    pub max_file_size: usize,

    /// Directory the gallery picker offers images from (defaults to the user's pictures directory)
    #[arg(long, env = "SHELL_GALLERY_DIR")]
    pub gallery_dir: Option<PathBuf>,

    /// Luminance coefficients used for the grayscale conversion
    #[arg(long, env = "SHELL_LUMA", value_enum, default_value = "bt601")]
    pub luma: transform::LumaWeights,

    /// Capabilities already granted at startup (comma separated)
    #[arg(long, env = "SHELL_PRE_GRANT", value_enum, value_delimiter = ',')]
    pub pre_grant: Vec<permission::Capability>,

    /// Do not ask for permissions at startup, only before each acquisition
    #[arg(long)]
    pub skip_startup_check: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from(args);

    tracing::info!("Starting grayscale-shell v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Gallery directory: {}", config.gallery_dir.display());
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
