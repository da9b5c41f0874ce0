//! Expression evaluation errors

use thiserror::Error;

/// Failure raised while evaluating an expression.
///
/// The template evaluator turns every one of these into a diagnostic and an
/// empty-string result, so none of them abort a running flow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot read property '{property}' of {base}")]
    PropertyOfNullish { property: String, base: &'static str },

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error("{name}: {message}")]
    Native { name: String, message: String },
}

impl EvalError {
    pub fn native(name: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Native {
            name: name.into(),
            message: message.into(),
        }
    }
}
