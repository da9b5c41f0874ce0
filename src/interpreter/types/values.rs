//! Runtime value types

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use super::super::errors::EvalError;

/// Named bindings visible to an expression
pub type Bindings = HashMap<String, Val>;

pub type NativeResult = Result<Val, EvalError>;

/// A host-provided callable (component resolvers, component methods, APIs)
#[derive(Clone)]
pub struct NativeFunc {
    name: Arc<str>,
    f: Arc<dyn Fn(Vec<Val>) -> NativeResult + Send + Sync>,
}

impl NativeFunc {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Val>) -> NativeResult + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: Vec<Val>) -> NativeResult {
        (self.f)(args)
    }

    pub fn ptr_eq(&self, other: &NativeFunc) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

/// Outcome of an asynchronous host call. Rejections carry a message.
pub type PromiseResult = Result<Val, String>;

/// Pending result of an asynchronous host call.
///
/// Cloning shares the same underlying future; it is polled at most once.
#[derive(Clone)]
pub struct Promise(Shared<BoxFuture<'static, PromiseResult>>);

impl Promise {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = PromiseResult> + Send + 'static,
    {
        Promise(fut.boxed().shared())
    }

    /// Start `fut` on the current tokio runtime right away.
    ///
    /// The work runs to completion even if the returned promise is dropped
    /// unsettled. Outside a runtime the future stays lazy.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = PromiseResult> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(fut);
                Promise::new(async move {
                    task.await
                        .unwrap_or_else(|err| Err(format!("api task failed: {}", err)))
                })
            }
            Err(_) => Promise::new(fut),
        }
    }

    pub fn resolved(value: Val) -> Self {
        Promise::new(async move { Ok(value) })
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Promise::new(async move { Err(message) })
    }

    /// Wait for the underlying call to finish.
    pub async fn settle(self) -> PromiseResult {
        self.0.await
    }
}

/// Runtime value type
#[derive(Clone, Default)]
pub enum Val {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(HashMap<String, Val>),
    Func(NativeFunc),
    Promise(Promise),
}

impl Val {
    /// The empty string, returned by the template evaluator on any failure
    pub fn empty_str() -> Val {
        Val::Str(String::new())
    }

    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `null` or `undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Val::Undefined | Val::Null)
    }

    /// Numeric conversion used by arithmetic and relational operators
    pub fn to_number(&self) -> f64 {
        match self {
            Val::Undefined => f64::NAN,
            Val::Null => 0.0,
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Val::Num(n) => *n,
            Val::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Val::List(items) if items.is_empty() => 0.0,
            Val::List(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    /// `===`: primitives by value, lists and objects structurally,
    /// callables by identity. Promises are never equal.
    pub fn strict_eq(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Undefined, Val::Undefined) | (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Val::Obj(a), Val::Obj(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.strict_eq(other)))
            }
            (Val::Func(a), Val::Func(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==`: like `===`, plus `null == undefined` and numeric coercion
    /// between numbers, strings and booleans.
    pub fn loose_eq(&self, other: &Val) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Val::Num(_), Val::Str(_))
            | (Val::Str(_), Val::Num(_))
            | (Val::Bool(_), _)
            | (_, Val::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    /// Convert to JSON. Callables, promises and `undefined` become `null`,
    /// as do non-finite numbers.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Val::Undefined | Val::Null | Val::Func(_) | Val::Promise(_) => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Num(n) => number_to_json(*n),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) => JsonValue::Array(items.iter().map(Val::to_json).collect()),
            Val::Obj(map) => {
                let mut obj = Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(obj)
            }
        }
    }
}

fn number_to_json(n: f64) -> JsonValue {
    // Integral values are emitted without a fractional part.
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

/// Render a number the way string concatenation does
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Undefined => write!(f, "undefined"),
            Val::Null => write!(f, "null"),
            Val::Bool(b) => write!(f, "{}", b),
            Val::Num(n) => write!(f, "{}", format_number(*n)),
            Val::Str(s) => write!(f, "{}", s),
            Val::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Val::Obj(_) => write!(f, "[object Object]"),
            Val::Func(func) => write!(f, "function {}() {{ [native code] }}", func.name()),
            Val::Promise(_) => write!(f, "[object Promise]"),
        }
    }
}

impl fmt::Debug for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Undefined => write!(f, "Undefined"),
            Val::Null => write!(f, "Null"),
            Val::Bool(b) => write!(f, "Bool({})", b),
            Val::Num(n) => write!(f, "Num({})", n),
            Val::Str(s) => write!(f, "Str({:?})", s),
            Val::List(items) => f.debug_tuple("List").field(items).finish(),
            Val::Obj(map) => f.debug_tuple("Obj").field(map).finish(),
            Val::Func(func) => write!(f, "Func({})", func.name()),
            Val::Promise(_) => write!(f, "Promise(..)"),
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Val) -> bool {
        self.strict_eq(other)
    }
}

impl From<JsonValue> for Val {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(b),
            JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Val::Str(s),
            JsonValue::Array(items) => Val::List(items.into_iter().map(Val::from).collect()),
            JsonValue::Object(map) => {
                Val::Obj(map.into_iter().map(|(k, v)| (k, Val::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl From<Vec<Val>> for Val {
    fn from(items: Vec<Val>) -> Self {
        Val::List(items)
    }
}

impl From<HashMap<String, Val>> for Val {
    fn from(map: HashMap<String, Val>) -> Self {
        Val::Obj(map)
    }
}

impl From<NativeFunc> for Val {
    fn from(func: NativeFunc) -> Self {
        Val::Func(func)
    }
}

impl Serialize for Val {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Val {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Val::from)
    }
}
