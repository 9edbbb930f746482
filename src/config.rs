use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::tracking::DEFAULT_MAX_VALUE_LEN;

const CHECKOUT_URL_ENV: &str = "FUNNEL_CHECKOUT_URL";
const DEBUG_ENV: &str = "FUNNEL_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FunnelConfig {
    pub checkout_base_url: String,
    pub checkout_path: String,
    pub analytics_debounce_ms: u64,
    pub modal_delay_ms: u64,
    /// Scroll fraction (0.0..=1.0) that opens the landing modal early.
    pub modal_scroll_threshold: f64,
    pub popup_check_delay_ms: u64,
    pub offer_countdown_ms: u64,
    /// Offsets, from the moment the result page opens, of each staged reveal.
    pub result_reveal_offsets_ms: Vec<u64>,
    pub max_tracking_value_len: usize,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            checkout_base_url: "https://pay.example.com".into(),
            checkout_path: "/checkout".into(),
            analytics_debounce_ms: 300,
            modal_delay_ms: 8_000,
            modal_scroll_threshold: 0.5,
            popup_check_delay_ms: 1_000,
            offer_countdown_ms: 10 * 60 * 1_000,
            result_reveal_offsets_ms: vec![0, 1_500, 3_000, 4_500],
            max_tracking_value_len: DEFAULT_MAX_VALUE_LEN,
        }
    }
}

impl FunnelConfig {
    pub fn analytics_debounce(&self) -> Duration {
        Duration::from_millis(self.analytics_debounce_ms)
    }

    pub fn modal_delay(&self) -> Duration {
        Duration::from_millis(self.modal_delay_ms)
    }

    pub fn popup_check_delay(&self) -> Duration {
        Duration::from_millis(self.popup_check_delay_ms)
    }

    pub fn offer_countdown(&self) -> Duration {
        Duration::from_millis(self.offer_countdown_ms)
    }

    /// Applies `FUNNEL_CHECKOUT_URL` and `FUNNEL_DEBUG` on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base) = std::env::var(CHECKOUT_URL_ENV) {
            if !base.trim().is_empty() {
                self.checkout_base_url = base.trim().to_string();
            }
        }

        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.modal_delay_ms = 0;
            self.analytics_debounce_ms = 1;
        }

        self
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<FunnelConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read funnel config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unparsable funnel config {}: {err}", path.display());
                FunnelConfig::default()
            })
        } else {
            info!("No funnel config at {}; using defaults", path.display());
            FunnelConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> FunnelConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, config: FunnelConfig) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    fn persist(&self, data: &FunnelConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write funnel config to {}", self.path.display()))
    }
}
