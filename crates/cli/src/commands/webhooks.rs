//! Webhook subscription commands.

use storesync_server::routes::webhooks::{delete_all_subscriptions, register_all};

use super::{print_json, print_line, services};

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let (_config, services) = services().await?;
    let webhooks = services.sync.platform().list_webhooks().await?;
    print_json(&webhooks)?;
    Ok(())
}

pub async fn register() -> Result<(), Box<dyn std::error::Error>> {
    let (config, services) = services().await?;
    let registration =
        register_all(services.sync.platform(), &config.webhook_callback_url()).await?;
    print_json(&registration)?;
    if !registration.success {
        return Err("some topics failed to register".into());
    }
    Ok(())
}

pub async fn delete_all() -> Result<(), Box<dyn std::error::Error>> {
    let (_config, services) = services().await?;
    let deleted = delete_all_subscriptions(services.sync.platform()).await?;
    print_line(&format!("Deleted {deleted} webhook subscription(s)"));
    Ok(())
}
