use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Selected option label per question id.
pub type QuizAnswers = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn possessive_pronoun(&self) -> &'static str {
        match self {
            Gender::Male => "his",
            Gender::Female => "her",
        }
    }
}

/// Text with optional per-gender overrides. In JSON either a plain string or
/// `{ "text": .., "male": .., "female": .. }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "VariantsRepr")]
pub struct Variants {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub male: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub female: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VariantsRepr {
    Plain(String),
    Gendered {
        text: String,
        #[serde(default)]
        male: Option<String>,
        #[serde(default)]
        female: Option<String>,
    },
}

impl From<VariantsRepr> for Variants {
    fn from(repr: VariantsRepr) -> Self {
        match repr {
            VariantsRepr::Plain(text) => Self {
                text,
                male: None,
                female: None,
            },
            VariantsRepr::Gendered { text, male, female } => Self { text, male, female },
        }
    }
}

impl From<&str> for Variants {
    fn from(text: &str) -> Self {
        Self {
            text: text.to_string(),
            male: None,
            female: None,
        }
    }
}

impl Variants {
    pub fn resolve(&self, gender: Option<Gender>) -> &str {
        let variant = match gender {
            Some(Gender::Male) => self.male.as_deref(),
            Some(Gender::Female) => self.female.as_deref(),
            None => None,
        };
        variant.unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: String,
    pub label: Variants,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets_gender: Option<Gender>,
}

/// Shows a step only when an earlier question was answered with `equals`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShowIf {
    pub question_id: String,
    pub equals: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizStep {
    pub id: String,
    pub prompt: Variants,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Variants>,
    /// Empty for informational steps.
    #[serde(default)]
    pub options: Vec<QuizOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<ShowIf>,
}

impl QuizStep {
    pub fn is_question(&self) -> bool {
        !self.options.is_empty()
    }

    pub fn is_visible(&self, answers: &QuizAnswers) -> bool {
        match &self.show_if {
            None => true,
            Some(condition) => answers
                .get(&condition.question_id)
                .is_some_and(|answer| *answer == condition.equals),
        }
    }
}

/// Source of the quiz step table handed to the pages.
pub trait ContentProvider: Send + Sync {
    fn steps(&self) -> &[QuizStep];
}

#[derive(Debug, Clone)]
pub struct StaticContent {
    steps: Vec<QuizStep>,
}

impl StaticContent {
    pub fn new(steps: Vec<QuizStep>) -> Result<Self> {
        validate(&steps)?;
        Ok(Self { steps })
    }

    /// The table shipped with the app.
    pub fn builtin() -> Result<Self> {
        Self::from_json(include_str!("../../assets/quiz.json"))
            .context("built-in quiz table is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let steps: Vec<QuizStep> = serde_json::from_str(json).context("failed to parse quiz table")?;
        Self::new(steps)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read quiz table from {}", path.display()))?;
        Self::from_json(&contents)
    }
}

impl ContentProvider for StaticContent {
    fn steps(&self) -> &[QuizStep] {
        &self.steps
    }
}

fn validate(steps: &[QuizStep]) -> Result<()> {
    if steps.is_empty() {
        bail!("quiz table has no steps");
    }

    let mut seen = HashSet::new();
    for step in steps {
        if let Some(condition) = &step.show_if {
            if !seen.contains(condition.question_id.as_str()) {
                bail!(
                    "step '{}' depends on '{}', which does not precede it",
                    step.id,
                    condition.question_id
                );
            }
        }

        if !seen.insert(step.id.as_str()) {
            bail!("duplicate step id '{}'", step.id);
        }

        let mut option_ids = HashSet::new();
        for option in &step.options {
            if !option_ids.insert(option.id.as_str()) {
                bail!("duplicate option id '{}' in step '{}'", option.id, step.id);
            }
        }
    }

    Ok(())
}
