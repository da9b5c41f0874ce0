//! # Expression Interpreter
//!
//! Evaluates the expression language embedded in templates.
//!
//! ## Core Principles
//!
//! 1. **Explicit scope**: identifiers resolve only against the bindings handed
//!    in by the caller, never against process globals
//! 2. **Host callables only**: the only things that can be called are
//!    [`NativeFunc`] values placed in scope by the host (`$`, `$val`,
//!    `$api.*`, component methods)
//! 3. **Pure and synchronous**: asynchronous host calls return a [`Promise`]
//!    value which the action runner awaits

pub mod errors;
pub mod expressions;
pub mod types;

#[cfg(test)]
mod tests;

pub use errors::EvalError;
pub use expressions::{eval_expr, EvalResult};
pub use types::{Bindings, Expr, NativeFunc, Promise, PromiseResult, Span, Val};
