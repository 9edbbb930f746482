use log::{info, warn};

use crate::storage::{keys, SafeStorage};

use super::params::{scan_url, TrackingParams};

/// Captures the attribution parameters of the page the visitor landed on and
/// backs them up so later pages can still attribute the checkout. Storage is
/// only touched when something was captured.
pub fn capture_tracking_params(page_url: &str, storage: &SafeStorage) -> TrackingParams {
    let params = match scan_url(page_url) {
        Ok(params) => params,
        Err(err) => {
            warn!("Skipping tracking capture: {err:#}");
            return TrackingParams::new();
        }
    };

    if !params.is_empty() {
        storage.set(keys::TRACKING_PARAMS, &params);
        info!("Captured {} tracking parameters", params.len());
    }

    params
}
