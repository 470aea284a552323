use clap::Parser;
use tracing_subscriber::EnvFilter;

use ucorobot_runtime::config::{DEFAULT_CONFIG_PATH, Settings};

#[derive(Parser, Debug)]
#[command(about = "Multi-robot potential-field controller")]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Compute and publish commands without opening the UDP channel
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = ucorobot_runtime::runtime::run(settings, args.dry_run).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
