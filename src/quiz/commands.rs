use std::sync::MutexGuard;

use serde::Serialize;
use tauri::State;

use crate::desktop::AppState;

use super::{QuizSession, RenderedStep};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgress {
    pub step: Option<RenderedStep>,
    pub progress: f64,
    pub complete: bool,
}

impl From<&QuizSession> for QuizProgress {
    fn from(session: &QuizSession) -> Self {
        Self {
            step: session.current_step(),
            progress: session.progress(),
            complete: session.is_complete(),
        }
    }
}

fn quiz_from_state<'a>(state: &'a State<'_, AppState>) -> Result<MutexGuard<'a, QuizSession>, String> {
    state
        .quiz
        .lock()
        .map_err(|_| "quiz state is unavailable".to_string())
}

#[tauri::command]
pub async fn quiz_restart(state: State<'_, AppState>) -> Result<QuizProgress, String> {
    let mut quiz = quiz_from_state(&state)?;
    *quiz = state.funnel.start_quiz();
    Ok(QuizProgress::from(&*quiz))
}

#[tauri::command]
pub async fn quiz_current_step(state: State<'_, AppState>) -> Result<QuizProgress, String> {
    let quiz = quiz_from_state(&state)?;
    Ok(QuizProgress::from(&*quiz))
}

#[tauri::command]
pub async fn quiz_answer(
    state: State<'_, AppState>,
    option_id: String,
) -> Result<QuizProgress, String> {
    let mut quiz = quiz_from_state(&state)?;
    quiz.answer(&option_id).map_err(|e| e.to_string())?;
    Ok(QuizProgress::from(&*quiz))
}

#[tauri::command]
pub async fn quiz_advance(state: State<'_, AppState>) -> Result<QuizProgress, String> {
    let mut quiz = quiz_from_state(&state)?;
    quiz.advance().map_err(|e| e.to_string())?;
    Ok(QuizProgress::from(&*quiz))
}

#[tauri::command]
pub async fn quiz_back(state: State<'_, AppState>) -> Result<QuizProgress, String> {
    let mut quiz = quiz_from_state(&state)?;
    quiz.back();
    Ok(QuizProgress::from(&*quiz))
}
