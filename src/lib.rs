pub mod analytics;
pub mod checkout;
pub mod config;
pub mod funnel;
pub mod quiz;
pub mod storage;
pub mod timing;
pub mod tracking;

#[cfg(feature = "desktop")]
mod config_commands;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::{Arc, Mutex};

    use tauri::Manager;

    use crate::{
        analytics::{webview::WebviewSink, AnalyticsClient},
        checkout::desktop::TauriOpener,
        config::ConfigStore,
        config_commands::{get_funnel_config, update_funnel_config},
        funnel::{
            commands::{land, landing_scroll, leave_result, open_checkout, result_view, track_event},
            Funnel, LandingPage,
        },
        quiz::{
            commands::{quiz_advance, quiz_answer, quiz_back, quiz_current_step, quiz_restart},
            ContentProvider, QuizSession, StaticContent,
        },
        storage::{
            commands::{storage_get, storage_set},
            SafeStorage, SqliteBackend,
        },
        timing::{CountdownTicker, ScheduleHandle},
        tracking::commands::{capture_tracking, checkout_query},
    };

    pub(crate) struct LandingState {
        pub(crate) page: LandingPage,
        pub(crate) _modal_timer: ScheduleHandle,
    }

    pub(crate) struct ResultState {
        pub(crate) _reveals: ScheduleHandle,
        pub(crate) _countdown: CountdownTicker,
    }

    pub(crate) struct AppState {
        pub(crate) funnel: Funnel,
        pub(crate) config_store: ConfigStore,
        pub(crate) quiz: Mutex<QuizSession>,
        pub(crate) landing: Mutex<Option<LandingState>>,
        pub(crate) result: Mutex<Option<ResultState>>,
        pub(crate) opener: TauriOpener,
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        // Initialize logging (reads RUST_LOG env var)
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();

        log::info!("Quiz funnel starting up...");

        tauri::Builder::default()
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let config_store = ConfigStore::new(app_data_dir.join("funnel.json"))?;
                    let config = config_store.current().with_env_overrides();

                    let backend = SqliteBackend::open(app_data_dir.join("funnel.sqlite3"))?;
                    let storage = SafeStorage::new(Arc::new(backend));

                    let content_path = app_data_dir.join("quiz.json");
                    let content = if content_path.exists() {
                        StaticContent::load(&content_path)?
                    } else {
                        StaticContent::builtin()?
                    };

                    let analytics = AnalyticsClient::new(
                        Arc::new(WebviewSink::new(app.handle().clone())),
                        config.analytics_debounce(),
                    );

                    let content: Arc<dyn ContentProvider> = Arc::new(content);
                    let quiz =
                        QuizSession::new(Arc::clone(&content), storage.clone(), analytics.clone());
                    let funnel = Funnel::new(storage, analytics, content, config);

                    app.manage(AppState {
                        funnel,
                        config_store,
                        quiz: Mutex::new(quiz),
                        landing: Mutex::new(None),
                        result: Mutex::new(None),
                        opener: TauriOpener::new(app.handle().clone()),
                    });

                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                capture_tracking,
                checkout_query,
                storage_get,
                storage_set,
                land,
                landing_scroll,
                track_event,
                quiz_restart,
                quiz_current_step,
                quiz_answer,
                quiz_advance,
                quiz_back,
                result_view,
                leave_result,
                open_checkout,
                get_funnel_config,
                update_funnel_config,
            ])
            .build(tauri::generate_context!())
            .expect("error while building tauri application")
            .run(|app_handle, event| {
                if let tauri::RunEvent::Exit = event {
                    if let Some(state) = app_handle.try_state::<AppState>() {
                        let delivered = state.funnel.analytics().shutdown();
                        log::info!("Flushed {delivered} analytics events on exit");
                    }
                }
            });
    }
}
