use std::time::Duration;

use serde_json::Value;
use tauri::{AppHandle, Emitter, State};

use crate::{
    checkout::CheckoutOutcome,
    desktop::{AppState, LandingState, ResultState},
    timing::CountdownTicker,
};

use super::{ModalTrigger, ResultView};

#[tauri::command]
pub async fn land(
    app_handle: AppHandle,
    state: State<'_, AppState>,
    page_url: String,
) -> Result<(), String> {
    let page = state.funnel.land(&page_url);

    let emitter = app_handle.clone();
    let modal_timer = page
        .arm_modal_timer(move |trigger| {
            let _ = emitter.emit("landing-modal-open", trigger);
        })
        .map_err(|e| e.to_string())?;

    // Replacing an earlier landing drops its timer handle, which cancels it.
    *state
        .landing
        .lock()
        .map_err(|_| "landing state is unavailable".to_string())? = Some(LandingState {
        page,
        _modal_timer: modal_timer,
    });

    Ok(())
}

#[tauri::command]
pub async fn landing_scroll(
    app_handle: AppHandle,
    state: State<'_, AppState>,
    fraction: f64,
) -> Result<bool, String> {
    let guard = state
        .landing
        .lock()
        .map_err(|_| "landing state is unavailable".to_string())?;
    let Some(landing) = guard.as_ref() else {
        return Ok(false);
    };

    let opened = landing.page.on_scroll(fraction);
    if opened {
        app_handle
            .emit("landing-modal-open", ModalTrigger::Scroll)
            .map_err(|e| e.to_string())?;
    }
    Ok(opened)
}

#[tauri::command]
pub async fn track_event(
    state: State<'_, AppState>,
    name: String,
    properties: Option<Value>,
) -> Result<String, String> {
    let event_id = state
        .funnel
        .analytics()
        .track(name, properties.unwrap_or(Value::Null));
    Ok(event_id.to_string())
}

#[tauri::command]
pub async fn result_view(
    app_handle: AppHandle,
    state: State<'_, AppState>,
    page_url: String,
) -> Result<ResultView, String> {
    let view = state.funnel.result_view(&page_url);

    let stage_emitter = app_handle.clone();
    let reveals = view
        .reveal_schedule()
        .start(move |stage| {
            let _ = stage_emitter.emit("result-stage", stage);
        })
        .map_err(|e| e.to_string())?;

    let tick_emitter = app_handle.clone();
    let countdown = CountdownTicker::spawn(view.countdown(), Duration::from_secs(1), move |snapshot| {
        let _ = tick_emitter.emit("countdown-tick", snapshot);
    })
    .map_err(|e| e.to_string())?;

    *state
        .result
        .lock()
        .map_err(|_| "result state is unavailable".to_string())? = Some(ResultState {
        _reveals: reveals,
        _countdown: countdown,
    });

    Ok(view)
}

/// Tears down the landing and result timers.
#[tauri::command]
pub async fn leave_result(state: State<'_, AppState>) -> Result<(), String> {
    if let Ok(mut result) = state.result.lock() {
        result.take();
    }
    if let Ok(mut landing) = state.landing.lock() {
        landing.take();
    }
    Ok(())
}

#[tauri::command]
pub async fn open_checkout(
    state: State<'_, AppState>,
    page_url: String,
) -> Result<CheckoutOutcome, String> {
    state
        .funnel
        .go_to_checkout(&page_url, &state.opener)
        .await
        .map_err(|e| e.to_string())
}
