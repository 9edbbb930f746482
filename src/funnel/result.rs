use std::time::Duration;

use serde::Serialize;

use crate::{
    quiz::{Gender, QuizAnswers},
    timing::{Countdown, RevealSchedule},
};

/// Sections of the result page, revealed one after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultStage {
    Diagnosis,
    Projection,
    Testimonials,
    Offer,
}

impl ResultStage {
    pub const ALL: [ResultStage; 4] = [
        ResultStage::Diagnosis,
        ResultStage::Projection,
        ResultStage::Testimonials,
        ResultStage::Offer,
    ];
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub answers: QuizAnswers,
    pub gender: Option<Gender>,
    pub headline: String,
    pub checkout_url: String,
    pub countdown_ms: u64,
    pub stage_offsets_ms: Vec<u64>,
}

impl ResultView {
    pub fn new(
        answers: QuizAnswers,
        gender: Option<Gender>,
        checkout_url: String,
        countdown: Duration,
        reveal_offsets_ms: &[u64],
    ) -> Self {
        let headline = match gender {
            Some(gender) => format!("We built a plan around {} goals", gender.possessive_pronoun()),
            None => "We built a plan around your goals".to_string(),
        };

        // Stages without a configured offset share the last one.
        let stage_offsets_ms = (0..ResultStage::ALL.len())
            .map(|i| {
                reveal_offsets_ms
                    .get(i)
                    .or(reveal_offsets_ms.last())
                    .copied()
                    .unwrap_or(0)
            })
            .collect();

        Self {
            answers,
            gender,
            headline,
            checkout_url,
            countdown_ms: countdown.as_millis() as u64,
            stage_offsets_ms,
        }
    }

    pub fn reveal_schedule(&self) -> RevealSchedule<ResultStage> {
        ResultStage::ALL
            .iter()
            .zip(&self.stage_offsets_ms)
            .fold(RevealSchedule::new(), |schedule, (stage, offset)| {
                schedule.at(Duration::from_millis(*offset), *stage)
            })
    }

    pub fn countdown(&self) -> Countdown {
        Countdown::new(Duration::from_millis(self.countdown_ms))
    }
}
