//! Campaign attribution: capture on landing, replay on checkout.

mod capture;
mod params;
mod query;

#[cfg(feature = "desktop")]
pub mod commands;

pub use capture::capture_tracking_params;
pub use params::{is_tracking_param, scan_url, TrackingParams, TRACKING_PARAM_ALLOWLIST};
pub use query::{
    attribution_code, CheckoutQueryBuilder, ATTRIBUTION_DELIMITER, DEFAULT_MAX_VALUE_LEN,
    SCK_FIELD, TIMESTAMP_FIELD, XCOD_FIELD,
};
