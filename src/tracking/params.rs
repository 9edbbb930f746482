use std::collections::{btree_map, BTreeMap};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameter names that carry campaign or click attribution. Matching is
/// case-insensitive and by prefix, so `UTM_Source` and `utm_source_2` both count.
pub const TRACKING_PARAM_ALLOWLIST: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "fb_action_ids",
    "fb_action_types",
    "fb_source",
    "gclid",
    "gclsrc",
    "dclid",
    "gbraid",
    "wbraid",
    "msclkid",
    "twclid",
    "li_fat_id",
    "ttclid",
    "igshid",
    "sclid",
    "ref",
    "source",
    "medium",
    "campaign",
    "term",
    "content",
    "adgroup",
    "keyword",
    "placement",
    "network",
    "device",
    "creative",
    "matchtype",
    "adposition",
    "feeditemid",
    "targetid",
];

pub fn is_tracking_param(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    TRACKING_PARAM_ALLOWLIST
        .iter()
        .any(|allowed| lowered.starts_with(allowed))
}

/// Attribution values keyed by the parameter name as it appeared in the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingParams(BTreeMap<String, String>);

impl TrackingParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get) but treats an empty value as absent.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for TrackingParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TrackingParams {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Collects the allowlisted, percent-decoded query parameters of `page_url`.
/// A repeated name keeps its last value.
pub fn scan_url(page_url: &str) -> Result<TrackingParams> {
    let parsed =
        Url::parse(page_url).with_context(|| format!("invalid page url '{page_url}'"))?;

    Ok(parsed
        .query_pairs()
        .filter(|(name, _)| is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_matches_by_case_insensitive_prefix() {
        assert!(is_tracking_param("utm_source"));
        assert!(is_tracking_param("UTM_Campaign"));
        assert!(is_tracking_param("gclid_extra"));
        assert!(is_tracking_param("referrer"));
        assert!(!is_tracking_param("page"));
        assert!(!is_tracking_param("x_utm_source"));
    }

    #[test]
    fn scan_keeps_only_allowlisted_names_decoded() {
        let params = scan_url(
            "https://quiz.example.com/?utm_source=face%20book&page=2&FBCLID=abc%2B1&lang=en",
        )
        .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("utm_source"), Some("face book"));
        assert_eq!(params.get("FBCLID"), Some("abc+1"));
        assert!(params.get("page").is_none());
    }

    #[test]
    fn repeated_name_keeps_last_value() {
        let params = scan_url("https://quiz.example.com/?utm_term=a&utm_term=b").unwrap();
        assert_eq!(params.get("utm_term"), Some("b"));
    }

    #[test]
    fn relative_url_is_an_error() {
        assert!(scan_url("/landing?utm_source=x").is_err());
    }

    #[test]
    fn non_empty_skips_blank_values() {
        let mut params = TrackingParams::new();
        params.insert("utm_source", "");
        assert_eq!(params.get("utm_source"), Some(""));
        assert!(params.non_empty("utm_source").is_none());
    }
}
