//! Evaluation context shared by templates and action flows
//!
//! A [`Context`] bundles the host's component resolvers (bound as `$` and
//! `$val` inside templates) with the `outputVar` map that accumulates step
//! results during a run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::interpreter::{Bindings, EvalError, NativeFunc, Val};

/// Name `resolveComponent` is bound to inside templates
pub const COMPONENT_BINDING: &str = "$";
/// Name `resolveValue` is bound to inside templates
pub const VALUE_BINDING: &str = "$val";

/// Host-side component registry.
///
/// `component` returns a handle for `$('id')`, usually an object whose
/// methods are [`NativeFunc`] values. `value` returns the current value of
/// another component for `$val('id')`.
pub trait ComponentResolver: Send + Sync {
    fn component(&self, id: &str) -> Option<Val>;

    fn value(&self, id: &str) -> Val;
}

/// Resolver with nothing registered: `$` yields `undefined`, `$val` yields `undefined`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoComponents;

impl ComponentResolver for NoComponents {
    fn component(&self, _id: &str) -> Option<Val> {
        None
    }

    fn value(&self, _id: &str) -> Val {
        Val::Undefined
    }
}

/// Resolver backed by fixed maps of component handles and values.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    components: HashMap<String, Val>,
    values: HashMap<String, Val>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, id: impl Into<String>, handle: Val) -> Self {
        self.components.insert(id.into(), handle);
        self
    }

    pub fn with_value(mut self, id: impl Into<String>, value: Val) -> Self {
        self.values.insert(id.into(), value);
        self
    }
}

impl ComponentResolver for StaticResolver {
    fn component(&self, id: &str) -> Option<Val> {
        self.components.get(id).cloned()
    }

    fn value(&self, id: &str) -> Val {
        self.values.get(id).cloned().unwrap_or(Val::Undefined)
    }
}

/// Per-run evaluation environment.
///
/// Cloning shares the resolver and copies every binding, so a clone can be
/// mutated without affecting the original.
#[derive(Clone)]
pub struct Context {
    resolver: Arc<dyn ComponentResolver>,
    globals: Bindings,
    /// Results of earlier steps, keyed by their `outputVar` name
    pub output_var: Bindings,
}

impl Context {
    pub fn new(resolver: Arc<dyn ComponentResolver>) -> Self {
        Self {
            resolver,
            globals: HashMap::new(),
            output_var: HashMap::new(),
        }
    }

    /// Context without components, globals or outputs
    pub fn empty() -> Self {
        Self::new(Arc::new(NoComponents))
    }

    /// Add a host binding visible to every template evaluated in this context
    pub fn with_binding(mut self, name: impl Into<String>, value: Val) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    pub fn with_output_var(mut self, output_var: Bindings) -> Self {
        self.output_var = output_var;
        self
    }

    /// Bindings contributed by the context itself: host globals plus the
    /// `$` and `$val` resolvers. `outputVar` entries are not included.
    pub fn base_bindings(&self) -> Bindings {
        let mut bindings = self.globals.clone();

        let resolver = Arc::clone(&self.resolver);
        bindings.insert(
            COMPONENT_BINDING.to_string(),
            Val::Func(NativeFunc::new(COMPONENT_BINDING, move |args| {
                let id = component_id(COMPONENT_BINDING, &args)?;
                Ok(resolver.component(&id).unwrap_or(Val::Undefined))
            })),
        );

        let resolver = Arc::clone(&self.resolver);
        bindings.insert(
            VALUE_BINDING.to_string(),
            Val::Func(NativeFunc::new(VALUE_BINDING, move |args| {
                let id = component_id(VALUE_BINDING, &args)?;
                Ok(resolver.value(&id))
            })),
        );

        bindings
    }
}

fn component_id(binding: &str, args: &[Val]) -> Result<String, EvalError> {
    match args.first() {
        Some(Val::Str(id)) => Ok(id.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(EvalError::native(binding, "expected a component id")),
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .field("output_var", &self.output_var)
            .finish()
    }
}
