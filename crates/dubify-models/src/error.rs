//! Model error types.

use thiserror::Error;

use crate::job::JobState;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Illegal transition {transition} from state {from}")]
    IllegalTransition {
        from: JobState,
        transition: &'static str,
    },

    #[error("Field {0} is already set and cannot be reassigned")]
    AlreadySet(&'static str),
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn illegal(from: JobState, transition: &'static str) -> Self {
        Self::IllegalTransition { from, transition }
    }
}
