//! Sequential flow execution
//!
//! `run` clones the caller's context, then for each step: dispatch, await the
//! result (settling it if it is a pending API call), and store it under the
//! step's `outputVar` so later steps can reference it.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info};
use uuid::Uuid;

use super::api::ApiCatalog;
use super::error::FlowError;
use super::registry::ActionRegistry;
use super::step::Step;
use crate::context::Context;
use crate::interpreter::{Bindings, Val};

/// `outputVar` key used for steps that don't name one
pub const DEFAULT_OUTPUT_VAR: &str = "temp";

/// Result of a run together with the outputs it accumulated
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub result: Val,
    pub output_var: Bindings,
}

/// Executes action flows against a frozen registry and a shared API catalog.
///
/// Cheap to clone; clones share the registry and catalog.
#[derive(Clone)]
pub struct ActionRunner {
    registry: Arc<ActionRegistry>,
    api: ApiCatalog,
    default_output_var: String,
}

impl ActionRunner {
    pub fn new(registry: ActionRegistry, api: ApiCatalog) -> Self {
        Self {
            registry: Arc::new(registry),
            api,
            default_output_var: DEFAULT_OUTPUT_VAR.to_string(),
        }
    }

    /// Runner with the built-in actions and an empty API catalog
    pub fn with_builtins() -> Self {
        Self::new(ActionRegistry::with_builtins(), ApiCatalog::new())
    }

    pub fn with_default_output_var(mut self, name: impl Into<String>) -> Self {
        self.default_output_var = name.into();
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn api(&self) -> &ApiCatalog {
        &self.api
    }

    /// Run `flow` and return the last step's result (`null` for an empty flow)
    pub async fn run(&self, flow: &[Step], context: &Context) -> Result<Val, FlowError> {
        self.execute(flow, context).await.map(|outcome| outcome.result)
    }

    /// Run `flow` and return the result along with the final `outputVar`
    pub fn execute<'a>(
        &'a self,
        flow: &'a [Step],
        context: &'a Context,
    ) -> BoxFuture<'a, Result<RunOutcome, FlowError>> {
        Box::pin(async move {
            let run_id = Uuid::new_v4();
            info!(run_id = %run_id, steps = flow.len(), "flow run started");

            let mut working = context.clone();
            let mut result = Val::Null;

            for (index, step) in flow.iter().enumerate() {
                debug!(run_id = %run_id, index, kind = step.kind(), "dispatching step");

                let value = self.registry.dispatch(step, &working, self).await?;
                let value = settle(value).await?;

                let key = step
                    .output_var
                    .clone()
                    .unwrap_or_else(|| self.default_output_var.clone());
                working.output_var.insert(key, value.clone());
                result = value;
            }

            info!(run_id = %run_id, "flow run finished");
            Ok(RunOutcome {
                run_id,
                result,
                output_var: working.output_var,
            })
        })
    }
}

/// Await a pending API result; other values pass through
async fn settle(mut value: Val) -> Result<Val, FlowError> {
    while let Val::Promise(promise) = value {
        value = promise.settle().await.map_err(FlowError::ApiRejected)?;
    }
    Ok(value)
}
