//! Action registry: action kind → handler
//!
//! The registry is built up front (built-ins plus any host handlers) and then
//! handed to an [`ActionRunner`], which shares it read-only between runs.
//! Registering after the runner exists is not possible, which is what keeps
//! concurrent runs free of locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::error::FlowError;
use super::runner::ActionRunner;
use super::step::Step;
use crate::context::Context;
use crate::interpreter::Val;

/// Executes one kind of step.
///
/// `context` is the runner's working context at the time of the step;
/// `runner` gives access to nested flow execution and the API catalog.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(
        &self,
        step: &Step,
        context: &Context,
        runner: &ActionRunner,
    ) -> Result<Val, FlowError>;
}

/// Adapter that lets a plain function act as a handler
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&Step, &Context) -> Result<Val, FlowError> + Send + Sync,
{
    async fn handle(
        &self,
        step: &Step,
        context: &Context,
        _runner: &ActionRunner,
    ) -> Result<Val, FlowError> {
        (self.0)(step, context)
    }
}

#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Empty registry, not even the built-ins
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `condition`, `call`, `callApi`, `declare` and `initApi`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        super::condition::register(&mut registry);
        super::call::register(&mut registry);
        super::declare::register(&mut registry);
        super::api::register(&mut registry);
        registry
    }

    /// Register `handler` for `kind`.
    ///
    /// Replacing an existing handler without `allow_override` logs a warning
    /// but still replaces it.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
        allow_override: bool,
    ) {
        let kind = kind.into();
        if self.handlers.contains_key(&kind) && !allow_override {
            warn!(kind = %kind, "action already registered, replacing handler");
        }
        self.handlers.insert(kind, handler);
    }

    /// Register a synchronous function as the handler for `kind`
    pub fn register_fn<F>(&mut self, kind: impl Into<String>, f: F, allow_override: bool)
    where
        F: Fn(&Step, &Context) -> Result<Val, FlowError> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(FnHandler(f)), allow_override);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Run the handler registered for `step`'s kind
    pub async fn dispatch(
        &self,
        step: &Step,
        context: &Context,
        runner: &ActionRunner,
    ) -> Result<Val, FlowError> {
        let handler = self
            .handlers
            .get(step.kind())
            .ok_or_else(|| FlowError::UnknownAction(step.kind().to_string()))?;
        handler.handle(step, context, runner).await
    }
}
