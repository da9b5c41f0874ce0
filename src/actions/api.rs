//! API catalog and the `callApi` / `initApi` actions
//!
//! Registered APIs are exposed to templates as methods of the `$api` object.
//! Calling a method starts the API right away and returns a [`Promise`] for
//! its outcome. The runner awaits a step's top-level promise before the next
//! step starts; calls nested elsewhere in the expression still run.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::FlowError;
use super::registry::{ActionHandler, ActionRegistry};
use super::runner::ActionRunner;
use super::step::{Action, Step, CALL_API, INIT_API};
use crate::context::Context;
use crate::interpreter::{Bindings, NativeFunc, Promise, PromiseResult, Val};
use crate::template::{self, as_expression_arg};

/// Name the catalog is bound to inside templates
pub const API_BINDING: &str = "$api";
/// `$api` key holding the configured base URL
pub const BASE_URL_KEY: &str = "_baseURL";
/// `$api` key holding the configured default params
pub const DEFAULT_PARAMS_KEY: &str = "_defaultParams";

/// Options accepted by `initApi`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "baseURL", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(rename = "defaultParams", default, skip_serializing_if = "Option::is_none")]
    pub default_params: Option<Map<String, JsonValue>>,
}

/// Asynchronous API implementation. Receives the positional arguments,
/// followed by the default params once the catalog is initialized.
pub type ApiFn = Arc<dyn Fn(Vec<Val>) -> BoxFuture<'static, PromiseResult> + Send + Sync>;

/// One registrable API
#[derive(Clone)]
pub struct ApiEntry {
    pub name: String,
    /// Key the API is exposed under in `$api`
    pub value: String,
    pub description: String,
    pub func: ApiFn,
}

impl ApiEntry {
    pub fn new<F, Fut>(value: impl Into<String>, func: F) -> Self
    where
        F: Fn(Vec<Val>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PromiseResult> + Send + 'static,
    {
        let value = value.into();
        Self {
            name: value.clone(),
            value,
            description: String::new(),
            func: Arc::new(move |args| func(args).boxed()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for ApiEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiEntry")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("description", &self.description)
            .finish()
    }
}

#[derive(Debug, Default)]
struct ApiSettings {
    base_url: Option<String>,
    default_params: Option<Val>,
    initialized: bool,
}

/// Shared API catalog.
///
/// Clones share the same entries and settings. Entries are expected to be
/// registered before flows start running.
#[derive(Clone, Default)]
pub struct ApiCatalog {
    entries: Arc<RwLock<HashMap<String, ApiEntry>>>,
    settings: Arc<RwLock<ApiSettings>>,
}

impl ApiCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry`, replacing any API already registered under its key
    pub async fn register(&self, entry: ApiEntry) {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.value) {
            debug!(api = %entry.value, "replacing registered api");
        }
        entries.insert(entry.value.clone(), entry);
    }

    pub async fn register_fn<F, Fut>(&self, value: impl Into<String>, func: F)
    where
        F: Fn(Vec<Val>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PromiseResult> + Send + 'static,
    {
        self.register(ApiEntry::new(value, func)).await;
    }

    /// Registered entries, sorted by key
    pub async fn entries(&self) -> Vec<ApiEntry> {
        let entries = self.entries.read().await;
        let mut list: Vec<ApiEntry> = entries.values().cloned().collect();
        list.sort_by(|a, b| a.value.cmp(&b.value));
        list
    }

    /// Record `config` and start appending default params to every call.
    ///
    /// Options left out keep their previous value.
    pub async fn initialize(&self, config: &ApiConfig) {
        let mut settings = self.settings.write().await;
        if let Some(base_url) = &config.base_url {
            settings.base_url = Some(base_url.clone());
        }
        if let Some(params) = &config.default_params {
            settings.default_params = Some(Val::from(JsonValue::Object(params.clone())));
        }
        settings.initialized = true;
        info!(
            base_url = settings.base_url.as_deref().unwrap_or(""),
            default_params = settings.default_params.is_some(),
            "api catalog initialized"
        );
    }

    /// The `$api` object: one method per entry, plus `_baseURL` and
    /// `_defaultParams` when configured.
    ///
    /// Settings are read once here, so every call made through this object
    /// sees the default params current when it was built. A method call
    /// invokes the API immediately and spawns its future; the returned
    /// promise only observes the outcome.
    pub async fn binding(&self) -> Val {
        let mut object = HashMap::new();
        let settings = self.settings.read().await;
        let trailing = settings
            .initialized
            .then(|| settings.default_params.clone().unwrap_or_default());

        for entry in self.entries.read().await.values() {
            let func = Arc::clone(&entry.func);
            let trailing = trailing.clone();
            let method = NativeFunc::new(entry.value.clone(), move |mut args| {
                if let Some(params) = &trailing {
                    args.push(params.clone());
                }
                Ok(Val::Promise(Promise::spawn(func(args))))
            });
            object.insert(entry.value.clone(), Val::Func(method));
        }

        if let Some(base_url) = &settings.base_url {
            object.insert(BASE_URL_KEY.to_string(), Val::Str(base_url.clone()));
        }
        if let Some(params) = &settings.default_params {
            object.insert(DEFAULT_PARAMS_KEY.to_string(), params.clone());
        }

        Val::Obj(object)
    }
}

impl fmt::Debug for ApiCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCatalog").finish_non_exhaustive()
    }
}

/// Template that invokes `$api.<method>` with the given action arguments
pub fn call_api_template(method_name: &str, args: &[String]) -> String {
    let args: Vec<String> = args.iter().map(|arg| as_expression_arg(arg)).collect();
    format!("{{{{ {}.{}({}) }}}}", API_BINDING, method_name, args.join(", "))
}

/// Template producing the `initApi` acknowledgement object
fn init_api_template(config: &ApiConfig) -> String {
    let params = config.default_params.clone().unwrap_or_default();
    format!(
        "{{{{ {{ status: 'success', message: 'API initialized', params: {} }} }}}}",
        JsonValue::Object(params)
    )
}

pub struct CallApiAction;

#[async_trait]
impl ActionHandler for CallApiAction {
    async fn handle(
        &self,
        step: &Step,
        context: &Context,
        runner: &ActionRunner,
    ) -> Result<Val, FlowError> {
        let Action::CallApi(call) = &step.action else {
            return Err(FlowError::InvalidStep {
                kind: step.kind().to_string(),
            });
        };

        let template = call_api_template(&call.method_name, &call.args);
        debug!(template = %template, "calling api");

        let mut extra = Bindings::new();
        extra.insert(API_BINDING.to_string(), runner.api().binding().await);
        Ok(template::evaluate(&template, context, Some(&extra)))
    }
}

pub struct InitApiAction;

#[async_trait]
impl ActionHandler for InitApiAction {
    async fn handle(
        &self,
        step: &Step,
        _context: &Context,
        runner: &ActionRunner,
    ) -> Result<Val, FlowError> {
        let Action::InitApi(config) = &step.action else {
            return Err(FlowError::InvalidStep {
                kind: step.kind().to_string(),
            });
        };

        runner.api().initialize(config).await;
        Ok(template::evaluate(
            &init_api_template(config),
            &Context::empty(),
            None,
        ))
    }
}

pub fn register(registry: &mut ActionRegistry) {
    registry.register(CALL_API, Arc::new(CallApiAction), false);
    registry.register(INIT_API, Arc::new(InitApiAction), false);
}
