//! Validation Rules
//!
//! Each file in this module contains one validation rule:
//!
//! - `undefined_identifier.rs` - Identifiers not bound in the evaluation scope
//! - `non_callable_call.rs` - Calls whose callee is a literal

mod non_callable_call;
mod undefined_identifier;

pub use non_callable_call::NonCallableCallRule;
pub use undefined_identifier::UndefinedIdentifierRule;
