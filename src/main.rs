use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use ferrite_cd::{Driver, HarnessConfig};

#[derive(Parser, Debug)]
#[command(name = "ferrite-cd", about = "Train and evaluate a change-detection model")]
struct Args {
    /// Path to the JSON run configuration.
    #[arg(short, long, default_value = "configs/stnet.json")]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = HarnessConfig::load_json(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    log::info!("experiment `{}`: {} epochs", config.exp_name, config.epoch);

    let mut driver = Driver::from_config(&config, None).context("setting up the run")?;
    let history = driver.run().context("training")?;

    if let Some(best) = history
        .iter()
        .max_by(|a, b| a.val_change_f1.total_cmp(&b.val_change_f1))
    {
        log::info!(
            "best val_change_f1 {:.4} at epoch {} (test_change_f1 {:.4})",
            best.val_change_f1,
            best.epoch,
            best.test_change_f1
        );
    }
    Ok(())
}
