//! Tauri commands for the funnel config file

use tauri::State;

use crate::{config::FunnelConfig, desktop::AppState};

/// The config as stored on disk, before environment overrides.
#[tauri::command]
pub async fn get_funnel_config(state: State<'_, AppState>) -> Result<FunnelConfig, String> {
    Ok(state.config_store.current())
}

/// Persists a new config. The running funnel picks it up on next launch.
#[tauri::command]
pub async fn update_funnel_config(
    state: State<'_, AppState>,
    config: FunnelConfig,
) -> Result<FunnelConfig, String> {
    state
        .config_store
        .update(config)
        .map_err(|e| e.to_string())?;
    Ok(state.config_store.current())
}
