//! The three pages of the funnel and the wiring between them.
//!
//! Landing captures attribution and opens the lead modal, the quiz walks the
//! step table, and the result page rebuilds the checkout link from whatever
//! attribution survived.

mod landing;
mod result;

#[cfg(feature = "desktop")]
pub mod commands;

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use crate::{
    analytics::{events, AnalyticsClient},
    checkout::{checkout_url, open_checkout, BrowserOpener, CheckoutOutcome},
    config::FunnelConfig,
    quiz::{ContentProvider, Gender, QuizAnswers, QuizSession},
    storage::{keys, SafeStorage},
    tracking::{capture_tracking_params, CheckoutQueryBuilder},
};

pub use landing::{LandingPage, ModalTrigger};
pub use result::{ResultStage, ResultView};

#[derive(Clone)]
pub struct Funnel {
    storage: SafeStorage,
    analytics: AnalyticsClient,
    content: Arc<dyn ContentProvider>,
    config: FunnelConfig,
    query_builder: CheckoutQueryBuilder,
}

impl Funnel {
    pub fn new(
        storage: SafeStorage,
        analytics: AnalyticsClient,
        content: Arc<dyn ContentProvider>,
        config: FunnelConfig,
    ) -> Self {
        let query_builder = CheckoutQueryBuilder::new(config.max_tracking_value_len);
        Self {
            storage,
            analytics,
            content,
            config,
            query_builder,
        }
    }

    pub fn storage(&self) -> &SafeStorage {
        &self.storage
    }

    pub fn analytics(&self) -> &AnalyticsClient {
        &self.analytics
    }

    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    pub fn land(&self, page_url: &str) -> LandingPage {
        let captured = capture_tracking_params(page_url, &self.storage);
        self.analytics.track(
            events::PAGE_VIEW,
            json!({ "page": "landing", "trackingParams": captured.len() }),
        );
        LandingPage::new(
            self.analytics.clone(),
            self.config.modal_delay(),
            self.config.modal_scroll_threshold,
        )
    }

    /// Clears answers left by an earlier attempt and starts at the first step.
    pub fn start_quiz(&self) -> QuizSession {
        self.storage.remove(keys::QUIZ_ANSWERS);
        self.analytics.track(events::QUIZ_START, json!({}));
        QuizSession::new(
            Arc::clone(&self.content),
            self.storage.clone(),
            self.analytics.clone(),
        )
    }

    pub fn checkout_query(&self, page_url: &str) -> String {
        self.query_builder.build(page_url, &self.storage)
    }

    pub fn checkout_link(&self, page_url: &str) -> String {
        checkout_url(&self.config, &self.checkout_query(page_url))
    }

    pub fn result_view(&self, page_url: &str) -> ResultView {
        let answers: QuizAnswers = self.storage.get_or(keys::QUIZ_ANSWERS, QuizAnswers::new());
        let gender: Option<Gender> = self.storage.get(keys::USER_GENDER);

        self.analytics.track(
            events::RESULT_VIEW,
            json!({ "answers": answers.len() }),
        );

        ResultView::new(
            answers,
            gender,
            self.checkout_link(page_url),
            self.config.offer_countdown(),
            &self.config.result_reveal_offsets_ms,
        )
    }

    /// Reports the checkout intent, flushes analytics before the page may be
    /// replaced, then opens the checkout.
    pub async fn go_to_checkout(
        &self,
        page_url: &str,
        opener: &dyn BrowserOpener,
    ) -> Result<CheckoutOutcome> {
        let url = self.checkout_link(page_url);
        self.analytics
            .track(events::INITIATE_CHECKOUT, json!({ "page": "result" }));
        self.analytics.flush();

        open_checkout(opener, &url, self.config.popup_check_delay()).await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use anyhow::anyhow;

    use super::*;
    use crate::{
        analytics::RecordingSink,
        checkout::ContextHandle,
        quiz::StaticContent,
        storage::{KeyValueBackend, MemoryBackend},
        tracking::{TrackingParams, SCK_FIELD, XCOD_FIELD},
    };

    fn funnel() -> (Funnel, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let analytics = AnalyticsClient::new(sink.clone(), Duration::from_millis(300));
        let config = FunnelConfig {
            checkout_base_url: "https://pay.example.com".into(),
            checkout_path: "/K42".into(),
            ..FunnelConfig::default()
        };
        let funnel = Funnel::new(
            SafeStorage::in_memory(),
            analytics,
            Arc::new(StaticContent::builtin().unwrap()),
            config,
        );
        (funnel, sink)
    }

    #[test]
    fn landing_backs_up_attribution_for_the_result_page() {
        let (funnel, sink) = funnel();

        funnel.land("https://quiz.example.com/?utm_source=meta&utm_campaign=spring&x=1");

        let stored: TrackingParams = funnel.storage().get(keys::TRACKING_PARAMS).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(sink.names(), vec!["PageView"]);

        let link = funnel.checkout_link("https://quiz.example.com/result");
        assert!(link.starts_with("https://pay.example.com/K42?utm_campaign=spring&utm_source=meta&"));
        assert!(link.contains(&format!("{XCOD_FIELD}=metahQwK21wXxRspring")));
        assert!(link.contains(&format!("{SCK_FIELD}=metahQwK21wXxRspring")));
    }

    #[test]
    fn full_walkthrough_feeds_the_result_view() {
        let (funnel, sink) = funnel();
        funnel.land("https://quiz.example.com/?fbclid=IwAR");

        let mut quiz = funnel.start_quiz();
        quiz.answer("female").unwrap();
        quiz.answer("30-44").unwrap();
        quiz.answer("energy").unwrap();
        quiz.advance().unwrap();
        quiz.answer("10").unwrap();
        quiz.answer("yes").unwrap();
        assert!(quiz.is_complete());

        let view = funnel.result_view("https://quiz.example.com/result");

        assert_eq!(view.gender, Some(Gender::Female));
        assert_eq!(view.answers.get("goal").map(String::as_str), Some("More energy"));
        assert_eq!(view.headline, "We built a plan around her goals");
        assert!(view.checkout_url.contains("fbclid=IwAR"));
        assert!(view.checkout_url.contains("xcod=IwARhQwK21wXxRno_campaign"));
        assert_eq!(sink.names().last().map(String::as_str), Some("ResultView"));
    }

    #[test]
    fn restarting_the_quiz_clears_old_answers() {
        let (funnel, _) = funnel();
        let mut quiz = funnel.start_quiz();
        quiz.answer("male").unwrap();
        assert!(funnel.storage().get::<QuizAnswers>(keys::QUIZ_ANSWERS).is_some());

        let quiz = funnel.start_quiz();

        assert!(quiz.answers().is_empty());
        assert!(funnel.storage().get::<QuizAnswers>(keys::QUIZ_ANSWERS).is_none());
    }

    #[test]
    fn result_view_survives_corrupted_storage() {
        let (funnel, _) = funnel();
        let backend = Arc::new(MemoryBackend::new());
        let storage = SafeStorage::new(backend.clone());
        backend.set_raw(keys::QUIZ_ANSWERS, "[broken").unwrap();
        backend.set_raw(keys::USER_GENDER, "\"robot\"").unwrap();
        backend.set_raw(keys::TRACKING_PARAMS, "nope").unwrap();
        let funnel = Funnel::new(
            storage,
            funnel.analytics().clone(),
            Arc::new(StaticContent::builtin().unwrap()),
            funnel.config().clone(),
        );

        let view = funnel.result_view("https://quiz.example.com/result");

        assert!(view.answers.is_empty());
        assert_eq!(view.gender, None);
        assert!(view.checkout_url.starts_with("https://pay.example.com/K42?xcod=no_source"));
    }

    struct BlockedPopups {
        navigated: Mutex<Vec<String>>,
    }

    impl BrowserOpener for BlockedPopups {
        fn open_new_context(&self, _url: &str) -> Result<Box<dyn ContextHandle>> {
            Err(anyhow!("blocked"))
        }

        fn navigate_current(&self, url: &str) -> Result<()> {
            self.navigated.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn checkout_flushes_analytics_and_falls_back_to_navigation() {
        let (funnel, sink) = funnel();
        let opener = BlockedPopups {
            navigated: Mutex::new(Vec::new()),
        };

        let outcome = funnel
            .go_to_checkout("https://quiz.example.com/result?utm_source=tiktok", &opener)
            .await
            .unwrap();

        assert_eq!(outcome, CheckoutOutcome::Navigated);
        assert_eq!(sink.names(), vec!["InitiateCheckout"]);
        let navigated = opener.navigated.lock().unwrap();
        assert!(navigated[0].starts_with("https://pay.example.com/K42?utm_source=tiktok&xcod=tiktok"));
    }
}
