use crate::job::JobState;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Illegal job transition: {from:?} -> {to:?}")]
    IllegalTransition { from: JobState, to: JobState },

    #[error("Internal error: {0}")]
    Internal(String),
}
