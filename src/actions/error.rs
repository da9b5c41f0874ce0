use thiserror::Error;

/// Failures that abort a flow run.
///
/// Template problems never show up here; the evaluator absorbs those and
/// yields an empty string instead.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error("unknown action kind: {0}")]
    UnknownAction(String),

    #[error("handler for '{kind}' received an incompatible step")]
    InvalidStep { kind: String },

    #[error("action '{kind}' failed: {message}")]
    Handler { kind: String, message: String },

    #[error("api call rejected: {0}")]
    ApiRejected(String),
}

impl FlowError {
    pub fn handler(kind: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Handler {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
