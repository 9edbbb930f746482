pub mod content;
pub mod progress;

#[cfg(feature = "desktop")]
pub mod commands;

pub use content::{ContentProvider, Gender, QuizAnswers, QuizOption, QuizStep, ShowIf, StaticContent, Variants};
pub use progress::{QuizSession, RenderedOption, RenderedStep};
