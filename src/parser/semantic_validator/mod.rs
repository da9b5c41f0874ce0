//! Semantic Validation for Template Expressions
//!
//! Runs after parsing and before evaluation to catch problems the grammar
//! can't enforce. Its main job is the whitelist gate: every root identifier
//! an expression references must be bound in the evaluation scope, so an
//! expression can never reach anything the host did not hand in.
//!
//! # Usage
//!
//! ```ignore
//! use actionflow_core::parser::{parse_expression, semantic_validator::{validate_expression, Whitelist}};
//!
//! let expr = parse_expression("a + b")?;
//! let errors = validate_expression(&expr, &Whitelist::from_keys(["a", "b"]));
//! assert!(errors.is_empty());
//! ```
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `semantic_validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod rules;

use std::collections::HashSet;

use crate::interpreter::types::{Expr, Span};

// ============================================================================
// Validation Error Types
// ============================================================================

/// A validation error produced by semantic analysis.
///
/// Every error blocks evaluation of the expression it was found in.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The source location of the issue
    pub span: Span,
    /// Human-readable message
    pub message: String,
    /// Which rule produced this error
    pub rule_id: &'static str,
    /// The offending name, when the issue is about an identifier
    pub identifier: Option<String>,
}

impl ValidationError {
    /// Create a new error
    pub fn error(span: Span, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            span,
            message: message.into(),
            rule_id,
            identifier: None,
        }
    }

    /// Attach the identifier this error is about
    pub fn with_identifier(mut self, name: impl Into<String>) -> Self {
        self.identifier = Some(name.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "error at col {}: {} [{}]",
            self.span.start_col + 1,
            self.message,
            self.rule_id
        )
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// Whitelist
// ============================================================================

/// The identifiers bound in one evaluation scope.
///
/// Built fresh for every evaluation from the merged scope's keys.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    names: HashSet<String>,
}

impl Whitelist {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules must implement.
///
/// Each rule checks one aspect of an expression and should be independent
/// of the other rules' results.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "undefined-identifier")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the validation and return any errors found.
    fn validate(&self, expr: &Expr, whitelist: &Whitelist) -> Vec<ValidationError>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

/// The main validator that orchestrates all validation rules.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::UndefinedIdentifierRule),
                Box::new(rules::NonCallableCallRule),
            ],
        }
    }

    /// Run all validation rules and collect errors.
    pub fn validate(&self, expr: &Expr, whitelist: &Whitelist) -> Vec<ValidationError> {
        self.rules
            .iter()
            .flat_map(|rule| rule.validate(expr, whitelist))
            .collect()
    }

    /// Get a list of all registered rules
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Validate an expression against a whitelist and return all errors found.
pub fn validate_expression(expr: &Expr, whitelist: &Whitelist) -> Vec<ValidationError> {
    Validator::new().validate(expr, whitelist)
}

/// Identifiers referenced by `expr` that the whitelist does not bind,
/// de-duplicated, in order of first appearance.
pub fn unknown_identifiers(errors: &[ValidationError]) -> Vec<String> {
    let mut seen = HashSet::new();
    errors
        .iter()
        .filter(|e| e.rule_id == rules::UndefinedIdentifierRule::ID)
        .filter_map(|e| e.identifier.clone())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
