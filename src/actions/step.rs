//! Step and flow definitions
//!
//! Steps arrive as JSON objects tagged by their `action` field:
//!
//! ```json
//! { "action": "declare", "value": "{{ 1 + 1 }}", "outputVar": "n" }
//! { "action": "call", "compId": "table1", "methodName": "reload", "args": [] }
//! ```
//!
//! Built-in kinds deserialize into typed payloads; every other kind is kept
//! as a [`Action::Custom`] payload for externally registered handlers.

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use super::api::ApiConfig;

/// A template string: templated iff wrapped in `{{ }}`
pub type TemplateString = String;

/// Ordered list of steps, executed front to back
pub type ActionFlow = Vec<Step>;

pub const CONDITION: &str = "condition";
pub const CALL: &str = "call";
pub const CALL_API: &str = "callApi";
pub const DECLARE: &str = "declare";
pub const INIT_API: &str = "initApi";

/// `condition`: run `then` when the condition is truthy, `els` otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionStep {
    pub condition: TemplateString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<ActionFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub els: Option<ActionFlow>,
}

/// `call`: invoke `$('<compId>')?.<methodName>(<args>)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStep {
    pub comp_id: String,
    pub method_name: String,
    #[serde(default)]
    pub args: Vec<TemplateString>,
}

/// `callApi`: invoke `$api.<methodName>(<args>)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallApiStep {
    pub method_name: String,
    #[serde(default)]
    pub args: Vec<TemplateString>,
}

/// One named value of a multi-field `declare`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclareField {
    /// Component the value reads from, kept for editor tooling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comp_id: Option<String>,
    pub name: String,
    pub value: TemplateString,
}

/// `declare`: a single value, or a map of named fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclareStep {
    Fields {
        fields: Vec<DeclareField>,
    },
    Value {
        #[serde(rename = "compId", default, skip_serializing_if = "Option::is_none")]
        comp_id: Option<String>,
        value: TemplateString,
    },
}

/// Payload of a step, one variant per built-in kind
#[derive(Debug, Clone)]
pub enum Action {
    Condition(ConditionStep),
    Call(CallStep),
    CallApi(CallApiStep),
    Declare(DeclareStep),
    InitApi(ApiConfig),
    /// Any kind not built in; handled by an externally registered handler
    Custom {
        kind: String,
        payload: Map<String, JsonValue>,
    },
}

impl Action {
    /// Registry key for this action
    pub fn kind(&self) -> &str {
        match self {
            Action::Condition(_) => CONDITION,
            Action::Call(_) => CALL,
            Action::CallApi(_) => CALL_API,
            Action::Declare(_) => DECLARE,
            Action::InitApi(_) => INIT_API,
            Action::Custom { kind, .. } => kind,
        }
    }
}

/// One step of a flow
#[derive(Debug, Clone)]
pub struct Step {
    pub action: Action,
    /// Key the step's result is stored under; `None` uses the runner default
    pub output_var: Option<String>,
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            output_var: None,
        }
    }

    pub fn with_output_var(mut self, name: impl Into<String>) -> Self {
        self.output_var = Some(name.into());
        self
    }

    pub fn custom(kind: impl Into<String>, payload: Map<String, JsonValue>) -> Self {
        Self::new(Action::Custom {
            kind: kind.into(),
            payload,
        })
    }

    pub fn kind(&self) -> &str {
        self.action.kind()
    }

    /// Payload of a custom step; `None` for built-in kinds
    pub fn payload(&self) -> Option<&Map<String, JsonValue>> {
        match &self.action {
            Action::Custom { payload, .. } => Some(payload),
            _ => None,
        }
    }

    fn payload_json(&self) -> Result<Map<String, JsonValue>, serde_json::Error> {
        let value = match &self.action {
            Action::Condition(step) => serde_json::to_value(step)?,
            Action::Call(step) => serde_json::to_value(step)?,
            Action::CallApi(step) => serde_json::to_value(step)?,
            Action::Declare(step) => serde_json::to_value(step)?,
            Action::InitApi(config) => serde_json::to_value(config)?,
            Action::Custom { payload, .. } => return Ok(payload.clone()),
        };
        match value {
            JsonValue::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = self.payload_json().map_err(S::Error::custom)?;
        map.insert("action".to_string(), JsonValue::String(self.kind().to_string()));
        if let Some(name) = &self.output_var {
            map.insert("outputVar".to_string(), JsonValue::String(name.clone()));
        }
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::deserialize(deserializer)?;

        let kind = match map.remove("action") {
            Some(JsonValue::String(kind)) => kind,
            Some(other) => {
                return Err(D::Error::custom(format!(
                    "step `action` must be a string, got {}",
                    other
                )))
            }
            None => return Err(D::Error::missing_field("action")),
        };

        let output_var = match map.remove("outputVar") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(name)) => Some(name),
            Some(other) => {
                return Err(D::Error::custom(format!(
                    "step `outputVar` must be a string, got {}",
                    other
                )))
            }
        };

        let action = match kind.as_str() {
            CONDITION => Action::Condition(from_payload::<_, D::Error>(map)?),
            CALL => Action::Call(from_payload::<_, D::Error>(map)?),
            CALL_API => Action::CallApi(from_payload::<_, D::Error>(map)?),
            DECLARE => Action::Declare(from_payload::<_, D::Error>(map)?),
            INIT_API => Action::InitApi(from_payload::<_, D::Error>(map)?),
            _ => Action::Custom { kind, payload: map },
        };

        Ok(Step { action, output_var })
    }
}

fn from_payload<T, E>(map: Map<String, JsonValue>) -> Result<T, E>
where
    T: serde::de::DeserializeOwned,
    E: serde::de::Error,
{
    serde_json::from_value(JsonValue::Object(map)).map_err(E::custom)
}
