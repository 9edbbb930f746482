use chrono::Utc;
use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::storage::{keys, SafeStorage};

use super::params::{scan_url, TrackingParams};

pub const DEFAULT_MAX_VALUE_LEN: usize = 200;

/// Separator the payment platform expects between attribution fields.
pub const ATTRIBUTION_DELIMITER: &str = "hQwK21wXxR";

pub const XCOD_FIELD: &str = "xcod";
pub const SCK_FIELD: &str = "sck";
pub const TIMESTAMP_FIELD: &str = "ts";

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Source, campaign, medium, content and term joined by [`ATTRIBUTION_DELIMITER`].
/// Reads the raw mapping: the length ceiling of the query builder does not apply.
pub fn attribution_code(params: &TrackingParams) -> String {
    let source = params
        .non_empty("utm_source")
        .or_else(|| params.non_empty("fbclid"))
        .unwrap_or("no_source");

    [
        source,
        params.non_empty("utm_campaign").unwrap_or("no_campaign"),
        params.non_empty("utm_medium").unwrap_or("no_medium"),
        params.non_empty("utm_content").unwrap_or("no_content"),
        params.non_empty("utm_term").unwrap_or("no_term"),
    ]
    .join(ATTRIBUTION_DELIMITER)
}

/// Rebuilds the attribution query string appended to checkout links.
#[derive(Debug, Clone)]
pub struct CheckoutQueryBuilder {
    max_value_len: usize,
}

impl Default for CheckoutQueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALUE_LEN)
    }
}

impl CheckoutQueryBuilder {
    pub fn new(max_value_len: usize) -> Self {
        Self { max_value_len }
    }

    /// Query string without a leading `?`. Always ends with the `xcod`, `sck`
    /// and `ts` fields, even when no attribution is known.
    pub fn build(&self, page_url: &str, storage: &SafeStorage) -> String {
        self.build_at(page_url, storage, Utc::now().timestamp_millis())
    }

    pub fn build_at(&self, page_url: &str, storage: &SafeStorage, timestamp_ms: i64) -> String {
        let params = resolve_params(page_url, storage);

        let mut pairs: Vec<String> = params
            .iter()
            .filter(|(_, value)| self.accepts(value))
            .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
            .collect();

        let code = encode(&attribution_code(&params));
        pairs.push(format!("{XCOD_FIELD}={code}"));
        pairs.push(format!("{SCK_FIELD}={code}"));
        pairs.push(format!("{TIMESTAMP_FIELD}={timestamp_ms}"));

        pairs.join("&")
    }

    /// The ceiling counts UTF-16 code units, the unit browser pages measure in.
    fn accepts(&self, value: &str) -> bool {
        !value.is_empty() && value.encode_utf16().count() <= self.max_value_len
    }
}

/// Current URL first, then the backup written by the landing page.
fn resolve_params(page_url: &str, storage: &SafeStorage) -> TrackingParams {
    match scan_url(page_url) {
        Ok(params) if !params.is_empty() => return params,
        Ok(_) => {}
        Err(err) => debug!("Falling back to stored tracking params: {err:#}"),
    }

    storage.get(keys::TRACKING_PARAMS).unwrap_or_default()
}
