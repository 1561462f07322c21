//! Validation of target definitions before they reach the registry.

use anyhow::{Result, anyhow};
use url::Url;

use crate::database::models::Target;

/// Validate a full target record
pub fn validate_target(target: &Target) -> Result<()> {
    if target.name.trim().is_empty() {
        return Err(anyhow!("Target name is required"));
    }

    validate_http_target(&target.url)?;

    for email in &target.notification_emails {
        validate_email(email)?;
    }

    if let Some(webhook) = &target.webhook_url {
        validate_http_target(webhook).map_err(|e| anyhow!("Invalid webhook: {}", e))?;
    }

    Ok(())
}

/// Validate an HTTP/HTTPS URL
pub fn validate_http_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for HTTP target: {}", other)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("URL has no host: {}", target));
    }

    if url.port() == Some(0) {
        return Err(anyhow!("Port 0 is not valid"));
    }

    Ok(())
}

/// Shallow address check; the mail transport does the real parsing
fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(anyhow!("Invalid notification email: {}", email)),
    }
}
