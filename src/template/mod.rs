//! Template evaluation
//!
//! A template string is a string whose whole content is wrapped in `{{ }}`.
//! Anything else is a literal and is returned unchanged. The wrapped
//! expression is parsed, checked against the identifiers bound in the merged
//! scope, and only then evaluated.
//!
//! Evaluation never fails from the caller's point of view: unknown
//! identifiers, syntax errors and runtime errors are logged and produce an
//! empty string.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::context::Context;
use crate::interpreter::{eval_expr, Bindings, Val};
use crate::parser::parse_expression;
use crate::parser::semantic_validator::{unknown_identifiers, validate_expression, Whitelist};


static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\{\{(.*)\}\}$").expect("template pattern is valid"));

static COMPONENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:val)?\('(.*?)'\)").expect("component id pattern is valid")
});

/// The merged bindings one template is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: Bindings,
}

impl Scope {
    /// Merge in increasing priority: `base`, then `output_var` entries, then
    /// `extra`. Later sources shadow earlier ones.
    pub fn merge(base: Bindings, output_var: &Bindings, extra: Option<&Bindings>) -> Self {
        let mut bindings = base;
        for (name, value) in output_var {
            bindings.insert(name.clone(), value.clone());
        }
        if let Some(extra) = extra {
            for (name, value) in extra {
                bindings.insert(name.clone(), value.clone());
            }
        }
        Self { bindings }
    }

    pub fn from_context(context: &Context, extra: Option<&Bindings>) -> Self {
        Self::merge(context.base_bindings(), &context.output_var, extra)
    }

    pub fn from_bindings(bindings: Bindings) -> Self {
        Self { bindings }
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Identifiers an expression evaluated in this scope may reference
    pub fn whitelist(&self) -> Whitelist {
        Whitelist::from_keys(self.bindings.keys().cloned())
    }
}

/// Expression text of a template, or `None` if `s` is a plain literal
pub fn template_expression(s: &str) -> Option<&str> {
    TEMPLATE_RE
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn is_template(s: &str) -> bool {
    TEMPLATE_RE.is_match(s)
}

/// Evaluate `template` against a context, with optional step-local bindings
/// that shadow everything else.
pub fn evaluate(template: &str, context: &Context, extra: Option<&Bindings>) -> Val {
    if !is_template(template) {
        return Val::Str(template.to_string());
    }
    evaluate_in_scope(template, &Scope::from_context(context, extra))
}

/// Evaluate `template` against an already merged scope
pub fn evaluate_in_scope(template: &str, scope: &Scope) -> Val {
    let Some(expression) = template_expression(template) else {
        return Val::Str(template.to_string());
    };

    let expr = match parse_expression(expression) {
        Ok(expr) => expr,
        Err(err) => {
            warn!(expression = %expression.trim(), error = %err.message(), "template parse failed");
            return Val::empty_str();
        }
    };

    let errors = validate_expression(&expr, &scope.whitelist());
    let unknown = unknown_identifiers(&errors);
    if !unknown.is_empty() {
        warn!(
            expression = %expression.trim(),
            unknown = ?unknown,
            "template references unknown identifiers"
        );
        return Val::empty_str();
    }
    if let Some(error) = errors.first() {
        warn!(expression = %expression.trim(), error = %error, "template rejected");
        return Val::empty_str();
    }

    match eval_expr(&expr, scope.bindings()) {
        Ok(value) => value,
        Err(err) => {
            warn!(expression = %expression.trim(), error = %err, "template evaluation failed");
            Val::empty_str()
        }
    }
}

/// Id passed to the first `$('id')` or `$val('id')` call in `template`,
/// or an empty string when there is none.
pub fn get_id_by_template(template: &str) -> String {
    COMPONENT_ID_RE
        .captures(template)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Turn an action argument into expression source: a template contributes
/// its inner expression, anything else becomes a quoted string literal.
pub fn as_expression_arg(arg: &str) -> String {
    match arg.strip_prefix("{{").and_then(|rest| rest.strip_suffix("}}")) {
        Some(inner) => inner.to_string(),
        None => format!("'{}'", arg.replace('\\', "\\\\").replace('\'', "\\'")),
    }
}
