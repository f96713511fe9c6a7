use thiserror::Error;

use super::shift::{ShiftId, ShiftStatus};

/// Failures reported by a [`ShiftRepository`](super::repository::ShiftRepository).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("document {collection}/{id} does not exist")]
    NotFound { collection: &'static str, id: String },

    /// Expected under contention: another worker got there first.
    #[error("shift {shift_id} is {actual}, expected it to be {expected}")]
    PreconditionFailed {
        shift_id: ShiftId,
        expected: ShiftStatus,
        actual: ShiftStatus,
    },

    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("no authenticated user")]
    Unauthenticated,
}

impl RepositoryError {
    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn is_contention(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    /// Text shown to the worker when an intent fails.
    pub fn notice_text(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Deze shift bestaat niet meer.",
            Self::PreconditionFailed { .. } => "Deze shift is niet meer beschikbaar.",
            Self::Transport(_) => "Kan de server niet bereiken. Probeer het later opnieuw.",
            Self::Unauthenticated => "Je bent niet ingelogd.",
        }
    }
}
