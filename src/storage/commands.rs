use serde_json::Value;
use tauri::State;

use crate::desktop::AppState;

#[tauri::command]
pub async fn storage_get(state: State<'_, AppState>, key: String) -> Result<Option<Value>, String> {
    Ok(state.funnel.storage().get(&key))
}

/// A missing or `null` value removes the key.
#[tauri::command]
pub async fn storage_set(
    state: State<'_, AppState>,
    key: String,
    value: Option<Value>,
) -> Result<(), String> {
    state.funnel.storage().set(&key, &value);
    Ok(())
}
