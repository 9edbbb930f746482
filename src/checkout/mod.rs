//! Hand-off to the external payment page.

#[cfg(feature = "desktop")]
pub mod desktop;

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::config::FunnelConfig;

/// A browsing context opened for the checkout.
pub trait ContextHandle: Send {
    /// `true` when the context was closed (or blocked) right after opening.
    fn is_closed(&self) -> bool;
}

pub trait BrowserOpener: Send + Sync {
    fn open_new_context(&self, url: &str) -> Result<Box<dyn ContextHandle>>;
    fn navigate_current(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckoutOutcome {
    NewContext,
    Navigated,
}

/// `base + path`, followed by `?query` when there is one.
pub fn checkout_url(config: &FunnelConfig, query: &str) -> String {
    let base = config.checkout_base_url.trim_end_matches('/');
    let path = config.checkout_path.trim_start_matches('/');

    let mut url = if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    };

    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(query);
    }

    url
}

/// Opens `url` in a new context, navigating the current one instead when the
/// new context fails to open or is already closed after `check_delay`.
pub async fn open_checkout(
    opener: &dyn BrowserOpener,
    url: &str,
    check_delay: Duration,
) -> Result<CheckoutOutcome> {
    match opener.open_new_context(url) {
        Ok(handle) => {
            tokio::time::sleep(check_delay).await;
            if !handle.is_closed() {
                info!("Checkout opened in a new context");
                return Ok(CheckoutOutcome::NewContext);
            }
            warn!("Checkout context closed right after opening; navigating in place");
        }
        Err(err) => {
            warn!("Could not open checkout in a new context: {err:#}; navigating in place");
        }
    }

    opener
        .navigate_current(url)
        .context("failed to navigate to checkout")?;
    Ok(CheckoutOutcome::Navigated)
}
