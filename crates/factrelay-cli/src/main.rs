//! 🚀 factrelay — the front door, the bouncer, the maitre d'.
//!
//! 📦 This binary crate is the thin CLI wrapper that loads config,
//! sets up logging, and then lets the library do the heavy lifting.
//! Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 📮 Accepts facts on POST /submit and forwards them, one by one, to the collector.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// TOML config file. Defaults to ./factrelay.toml when it exists, env vars (FACTRELAY_*) otherwise.
    config: Option<PathBuf>,
}

/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args
/// 3. Load config (the moment of truth)
/// 4. Run the thing
/// 5. Handle errors (cry)
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // 🎯 An explicit path must exist. The implicit default is allowed to be missing.
    let config_file = match cli.config {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!("💀 Couldn't check whether the config file exists: '{}'", path.display())
            })?;
            anyhow::ensure!(
                exists,
                "💀 Configuration file not found: '{}'. Relative paths are relative to the cwd, \
                 use an absolute path to be absolutely certain.",
                path.display()
            );
            Some(path)
        }
        None => {
            let default = PathBuf::from("factrelay.toml");
            default.is_file().then_some(default)
        }
    };

    let app_config = factrelay::app_config::load_config(config_file.as_deref())
        .context("💀 Couldn't load the config. Make sure you didn't forget something obvious.")?;

    if let Err(err) = factrelay::run(app_config).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut the_vibes_are_giving_port_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("Address already in use") || cause_str.contains("Permission denied") {
                the_vibes_are_giving_port_issues = true;
            }
        }

        if the_vibes_are_giving_port_issues {
            error!(
                "🔧 hint: the listen address is taken or off-limits. \
                Pick another with FACTRELAY_SERVER__LISTEN_ADDR or [server] listen_addr."
            );
        }

        std::process::exit(1);
    }

    Ok(())
}
