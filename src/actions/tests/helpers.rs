//! Test helpers for action tests

use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;

use crate::actions::{ActionFlow, ActionRegistry, ActionRunner, ApiCatalog};
use crate::interpreter::Val;

/// Deserialize a flow from its JSON form
pub fn flow(json: JsonValue) -> ActionFlow {
    serde_json::from_value(json).expect("Flow should deserialize")
}

/// Runner with the built-in actions and an empty API catalog
pub fn builtin_runner() -> ActionRunner {
    ActionRunner::with_builtins()
}

/// Argument lists an API received, one entry per call
pub type CallLog = Arc<Mutex<Vec<Vec<Val>>>>;

/// Runner whose catalog has an API `f` that records its arguments and
/// resolves to `"ok"`
pub async fn recording_runner() -> (ActionRunner, CallLog) {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let api = ApiCatalog::new();

    let calls = Arc::clone(&log);
    api.register_fn("f", move |args| {
        calls.lock().unwrap().push(args);
        async { Ok(Val::from("ok")) }
    })
    .await;

    let runner = ActionRunner::new(ActionRegistry::with_builtins(), api);
    (runner, log)
}
