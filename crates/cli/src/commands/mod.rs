//! CLI subcommands.

pub mod migrate;
pub mod sign;
pub mod sync;
pub mod webhooks;

use storesync_server::config::SyncConfig;
use storesync_server::services::Services;

/// Write one line of command output to stdout.
#[allow(clippy::print_stdout)]
pub fn print_line(line: &str) {
    println!("{line}");
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    print_line(&serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load configuration and build the same services the server runs with.
pub async fn services() -> Result<(SyncConfig, Services), Box<dyn std::error::Error>> {
    let config = SyncConfig::from_env()?;
    let services = Services::build(&config).await?;
    Ok((config, services))
}
