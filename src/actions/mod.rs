//! Action flows
//!
//! A flow is an ordered list of [`Step`]s. The [`ActionRunner`] dispatches
//! each step to the handler registered for its kind in the
//! [`ActionRegistry`] and folds the result into the run's `outputVar` map.

pub mod api;
pub mod call;
pub mod condition;
pub mod declare;
pub mod error;
pub mod registry;
pub mod runner;
pub mod step;

#[cfg(test)]
mod tests;

pub use api::{ApiCatalog, ApiConfig, ApiEntry, ApiFn, API_BINDING};
pub use error::FlowError;
pub use registry::{ActionHandler, ActionRegistry, FnHandler};
pub use runner::{ActionRunner, RunOutcome, DEFAULT_OUTPUT_VAR};
pub use step::{
    Action, ActionFlow, CallApiStep, CallStep, ConditionStep, DeclareField, DeclareStep, Step,
    TemplateString,
};
