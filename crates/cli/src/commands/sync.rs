//! One-off bulk sync.
//!
//! Runs in-process with the server's configuration, so a sync can be
//! triggered without the HTTP surface (cron jobs, first import).

use serde_json::json;

use storesync_core::EntityKind;

use super::{print_json, services};

/// Sync one kind, or every kind when `target` is `all`.
pub async fn run(target: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, services) = services().await?;

    if target.eq_ignore_ascii_case("all") {
        let full = services.sync.sync_everything().await;
        print_json(&json!({
            "success": full.is_complete(),
            "totals": full.totals(),
            "kinds": full.kinds,
        }))?;
        if full.all_failed() {
            return Err("every kind failed to sync".into());
        }
        return Ok(());
    }

    let kind: EntityKind = target.parse()?;
    let report = services.sync.sync_all(kind).await?;
    print_json(&json!({ "success": true, "kind": kind, "report": report }))?;
    Ok(())
}
