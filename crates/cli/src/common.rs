use std::path::Path;
use anyhow::{Context, Result};
use recwatch::WatchConfig;

/// Logs go to stderr; stdout is reserved for command output.
/// RUST_LOG wins over the defaults.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

/// Config file (if any), then WORKDIR / WATCHDIR / EPGSTATION_URL on top
pub fn load_config(path: Option<&Path>) -> Result<WatchConfig> {
    let mut cfg = WatchConfig::load_config(path).context("Failed to load configuration")?;
    cfg.apply_env(|key| std::env::var(key).ok());
    log::debug!("Configuration: {:?}", cfg);
    Ok(cfg)
}

/// Parse arguments; usage errors exit with status 1, help/version with 0
pub fn parse_args<T: clap::Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(1);
            }
        },
    }
}
