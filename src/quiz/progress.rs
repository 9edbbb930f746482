use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use log::info;
use serde::Serialize;
use serde_json::json;

use crate::{
    analytics::{events, AnalyticsClient},
    storage::{keys, SafeStorage},
};

use super::content::{ContentProvider, Gender, QuizAnswers, QuizStep};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedOption {
    pub id: String,
    pub label: String,
}

/// A step with its text resolved for the visitor's gender.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedStep {
    pub id: String,
    pub prompt: String,
    pub detail: Option<String>,
    pub options: Vec<RenderedOption>,
    /// 1-based position among the steps currently visible.
    pub position: usize,
    pub total: usize,
}

/// Walks the step table one index at a time, skipping steps whose `show_if`
/// condition does not hold for the answers given so far.
pub struct QuizSession {
    content: Arc<dyn ContentProvider>,
    storage: SafeStorage,
    analytics: AnalyticsClient,
    index: usize,
    answers: QuizAnswers,
    gender: Option<Gender>,
}

impl QuizSession {
    pub fn new(
        content: Arc<dyn ContentProvider>,
        storage: SafeStorage,
        analytics: AnalyticsClient,
    ) -> Self {
        let gender = storage.get(keys::USER_GENDER);
        let mut session = Self {
            content,
            storage,
            analytics,
            index: 0,
            answers: QuizAnswers::new(),
            gender,
        };
        session.index = session.next_visible_from(0);
        session
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn answers(&self) -> &QuizAnswers {
        &self.answers
    }

    pub fn gender(&self) -> Option<Gender> {
        self.gender
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.content.steps().len()
    }

    /// Fraction of the visible steps already behind the visitor.
    pub fn progress(&self) -> f64 {
        if self.is_complete() {
            return 1.0;
        }
        let total = self.visible_count();
        if total == 0 {
            return 1.0;
        }
        self.visible_before(self.index) as f64 / total as f64
    }

    pub fn current_step(&self) -> Option<RenderedStep> {
        let step = self.content.steps().get(self.index)?;
        Some(self.render(step))
    }

    /// Records the option's label under the current question and moves on.
    pub fn answer(&mut self, option_id: &str) -> Result<Option<RenderedStep>> {
        let content = Arc::clone(&self.content);
        let step = content
            .steps()
            .get(self.index)
            .ok_or_else(|| anyhow!("quiz is already complete"))?;

        if !step.is_question() {
            bail!("step '{}' has no options to answer", step.id);
        }

        let option = step
            .options
            .iter()
            .find(|option| option.id == option_id)
            .ok_or_else(|| anyhow!("step '{}' has no option '{option_id}'", step.id))?;

        self.answers.insert(step.id.clone(), option.label.text.clone());
        self.prune_hidden_answers();
        self.storage.set(keys::QUIZ_ANSWERS, &self.answers);

        if let Some(gender) = option.sets_gender {
            self.gender = Some(gender);
            self.storage.set(keys::USER_GENDER, &gender);
        }

        self.analytics.track(
            events::QUIZ_ANSWER,
            json!({
                "question": step.id,
                "answer": option.label.text,
                "position": self.visible_before(self.index) + 1,
            }),
        );

        self.move_forward();
        Ok(self.current_step())
    }

    /// Moves past an informational step.
    pub fn advance(&mut self) -> Result<Option<RenderedStep>> {
        let step = self
            .content
            .steps()
            .get(self.index)
            .ok_or_else(|| anyhow!("quiz is already complete"))?;

        if step.is_question() {
            bail!("step '{}' needs an answer before moving on", step.id);
        }

        self.move_forward();
        Ok(self.current_step())
    }

    /// Returns to the previous visible step; stays put on the first one.
    pub fn back(&mut self) -> Option<RenderedStep> {
        let steps = self.content.steps();
        if let Some(previous) = (0..self.index.min(steps.len()))
            .rev()
            .find(|&i| steps[i].is_visible(&self.answers))
        {
            self.index = previous;
        }
        self.current_step()
    }

    fn move_forward(&mut self) {
        self.index = self.next_visible_from(self.index + 1);
        if self.is_complete() {
            info!("Quiz completed with {} answers", self.answers.len());
            self.analytics.track(
                events::QUIZ_COMPLETE,
                json!({ "answers": self.answers.len() }),
            );
        }
    }

    fn next_visible_from(&self, start: usize) -> usize {
        let steps = self.content.steps();
        (start..steps.len())
            .find(|&i| steps[i].is_visible(&self.answers))
            .unwrap_or(steps.len())
    }

    /// Answers to steps that a changed answer has since hidden no longer apply.
    /// Conditions only point at earlier steps, so one ordered pass over the
    /// shrinking answer set clears whole chains of follow-ups.
    fn prune_hidden_answers(&mut self) {
        for step in self.content.steps() {
            if !step.is_visible(&self.answers) {
                self.answers.remove(&step.id);
            }
        }
    }

    fn visible_count(&self) -> usize {
        self.content
            .steps()
            .iter()
            .filter(|step| step.is_visible(&self.answers))
            .count()
    }

    fn visible_before(&self, index: usize) -> usize {
        self.content
            .steps()
            .iter()
            .take(index)
            .filter(|step| step.is_visible(&self.answers))
            .count()
    }

    fn render(&self, step: &QuizStep) -> RenderedStep {
        RenderedStep {
            id: step.id.clone(),
            prompt: step.prompt.resolve(self.gender).to_string(),
            detail: step
                .detail
                .as_ref()
                .map(|detail| detail.resolve(self.gender).to_string()),
            options: step
                .options
                .iter()
                .map(|option| RenderedOption {
                    id: option.id.clone(),
                    label: option.label.resolve(self.gender).to_string(),
                })
                .collect(),
            position: self.visible_before(self.index) + 1,
            total: self.visible_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::analytics::RecordingSink;
    use crate::quiz::content::StaticContent;

    struct Harness {
        session: QuizSession,
        storage: SafeStorage,
        sink: Arc<RecordingSink>,
    }

    fn harness() -> Harness {
        let storage = SafeStorage::in_memory();
        let sink = Arc::new(RecordingSink::new());
        let analytics = AnalyticsClient::new(sink.clone(), Duration::from_millis(300));
        let content = Arc::new(StaticContent::builtin().unwrap());
        Harness {
            session: QuizSession::new(content, storage.clone(), analytics),
            storage,
            sink,
        }
    }

    #[test]
    fn starts_on_the_first_step() {
        let h = harness();
        let step = h.session.current_step().unwrap();
        assert_eq!(step.id, "gender");
        assert_eq!(step.position, 1);
        assert_eq!(h.session.progress(), 0.0);
    }

    #[test]
    fn answering_persists_answers_and_gender() {
        let mut h = harness();

        let next = h.session.answer("female").unwrap().unwrap();

        assert_eq!(next.id, "age");
        assert_eq!(next.prompt, "How old are you, ma'am?");
        assert_eq!(h.session.gender(), Some(Gender::Female));
        assert_eq!(h.storage.get::<Gender>(keys::USER_GENDER), Some(Gender::Female));
        let stored: QuizAnswers = h.storage.get(keys::QUIZ_ANSWERS).unwrap();
        assert_eq!(stored.get("gender").map(String::as_str), Some("A woman"));
        assert_eq!(h.sink.names(), vec!["QuizAnswer"]);
    }

    #[test]
    fn conditional_step_is_skipped_unless_selected() {
        let mut h = harness();
        h.session.answer("male").unwrap();
        h.session.answer("30-44").unwrap();

        let next = h.session.answer("sleep").unwrap().unwrap();
        assert_eq!(next.id, "social_proof");

        assert_eq!(h.session.back().unwrap().id, "goal");
        let next = h.session.answer("weight").unwrap().unwrap();
        assert_eq!(next.id, "weight_target");
    }

    #[test]
    fn changing_an_answer_drops_hidden_follow_ups() {
        let mut h = harness();
        h.session.answer("male").unwrap();
        h.session.answer("30-44").unwrap();
        h.session.answer("weight").unwrap();
        h.session.answer("gt10").unwrap();
        assert!(h.session.answers().contains_key("weight_target"));

        h.session.back();
        h.session.back();
        h.session.answer("energy").unwrap();

        assert!(!h.session.answers().contains_key("weight_target"));
    }

    #[test]
    fn changing_an_answer_drops_nested_follow_up_chains() {
        let content = StaticContent::from_json(
            r#"[
                { "id": "a", "prompt": "A?", "options": [
                    { "id": "x", "label": "X" }, { "id": "z", "label": "Z" } ] },
                { "id": "b", "prompt": "B?", "showIf": { "questionId": "a", "equals": "X" },
                  "options": [ { "id": "y", "label": "Y" } ] },
                { "id": "c", "prompt": "C?", "showIf": { "questionId": "b", "equals": "Y" },
                  "options": [ { "id": "c1", "label": "C1" } ] },
                { "id": "d", "prompt": "D?", "options": [ { "id": "d1", "label": "D1" } ] }
            ]"#,
        )
        .unwrap();
        let storage = SafeStorage::in_memory();
        let analytics =
            AnalyticsClient::new(Arc::new(RecordingSink::new()), Duration::from_millis(300));
        let mut session = QuizSession::new(Arc::new(content), storage.clone(), analytics);

        session.answer("x").unwrap();
        session.answer("y").unwrap();
        session.answer("c1").unwrap();
        session.back();
        session.back();
        assert_eq!(session.back().unwrap().id, "a");

        let next = session.answer("z").unwrap().unwrap();

        assert_eq!(next.id, "d");
        let expected: QuizAnswers = [("a".to_string(), "Z".to_string())].into_iter().collect();
        assert_eq!(session.answers(), &expected);
        assert_eq!(storage.get::<QuizAnswers>(keys::QUIZ_ANSWERS), Some(expected));
    }

    #[test]
    fn info_steps_need_advance_not_answer() {
        let mut h = harness();
        h.session.answer("male").unwrap();
        h.session.answer("18-29").unwrap();
        h.session.answer("energy").unwrap();

        let info_step = h.session.current_step().unwrap();
        assert_eq!(info_step.id, "social_proof");
        assert!(info_step.options.is_empty());
        assert_eq!(info_step.prompt, "Thousands of men already follow this routine.");
        assert!(h.session.answer("anything").is_err());

        let next = h.session.advance().unwrap().unwrap();
        assert_eq!(next.id, "routine");
        assert!(h.session.advance().is_err());
    }

    #[test]
    fn completing_the_quiz_reports_completion() {
        let mut h = harness();
        h.session.answer("female").unwrap();
        h.session.answer("45-59").unwrap();
        h.session.answer("sleep").unwrap();
        h.session.advance().unwrap();
        h.session.answer("20").unwrap();
        let last = h.session.answer("yes").unwrap();

        assert!(last.is_none());
        assert!(h.session.is_complete());
        assert_eq!(h.session.progress(), 1.0);
        assert_eq!(h.sink.names().last().map(String::as_str), Some("QuizComplete"));
        assert!(h.session.answer("yes").is_err());
    }

    #[test]
    fn unknown_option_is_rejected_without_side_effects() {
        let mut h = harness();
        assert!(h.session.answer("robot").is_err());
        assert_eq!(h.session.index(), 0);
        assert!(h.storage.get::<QuizAnswers>(keys::QUIZ_ANSWERS).is_none());
    }

    #[test]
    fn back_on_first_step_stays_put() {
        let mut h = harness();
        assert_eq!(h.session.back().unwrap().id, "gender");
    }

    #[test]
    fn stored_gender_resolves_variants_from_the_start() {
        let storage = SafeStorage::in_memory();
        storage.set(keys::USER_GENDER, &Gender::Male);
        let analytics = AnalyticsClient::new(Arc::new(RecordingSink::new()), Duration::ZERO);
        let content = Arc::new(StaticContent::builtin().unwrap());

        let session = QuizSession::new(content, storage, analytics);

        assert_eq!(session.gender(), Some(Gender::Male));
    }
}
