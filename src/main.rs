use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use swerve_vision_runtime::config::Config;

#[derive(Parser)]
#[command(name = "swerve-vision-runtime")]
#[command(about = "Swerve teleop and vision pose fusion over Zenoh", long_about = None)]
struct Cli {
    /// JSON config file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the field layout path from the config
    #[arg(long)]
    field_layout: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(path) = cli.field_layout {
        config.vision.field_layout_path = path;
    }
    info!(
        "Loaded config: {} camera(s), field layout {}",
        config.vision.cameras.len(),
        config.vision.field_layout_path.display()
    );

    if let Err(e) = swerve_vision_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
