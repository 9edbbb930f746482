use tauri::State;

use crate::desktop::AppState;

use super::{capture_tracking_params, TrackingParams};

#[tauri::command]
pub async fn capture_tracking(
    state: State<'_, AppState>,
    page_url: String,
) -> Result<TrackingParams, String> {
    Ok(capture_tracking_params(&page_url, state.funnel.storage()))
}

#[tauri::command]
pub async fn checkout_query(state: State<'_, AppState>, page_url: String) -> Result<String, String> {
    Ok(state.funnel.checkout_query(&page_url))
}
