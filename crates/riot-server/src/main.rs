use anyhow::{bail, Result};
use clap::Parser;
use riot_config::ConfigLoader;
use riot_server::{App, Backend, SignalHandler};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sensor tracker and store-and-forward relay", long_about = None)]
struct Args {
    /// Directory containing tracker.toml
    #[arg(short, long, default_value = ".")]
    config_dir: PathBuf,

    /// Use the in-process simulated radio
    #[arg(long)]
    simulate: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Load and validate the configuration, print it, then exit
    #[arg(long)]
    validate: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let config = ConfigLoader::new(&args.config_dir).load_validated()?;
    if args.validate {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if !args.simulate {
        bail!("No radio backend is available in this build, run with --simulate");
    }
    info!(config_dir = %args.config_dir.display(), "Starting riot-tracker");

    let app = App::start(&config, Backend::simulated(&config)).await?;

    let signals = SignalHandler::default();
    let signal = signals.wait().await?;
    info!(signal = ?signal, "Shutting down");

    app.stop().await?;
    Ok(())
}
