//! Rule: Undefined Identifier
//!
//! Reports an error for every root identifier that is not bound in the
//! evaluation scope. Property names (`a.b`, `a?.b`) and object literal keys
//! are not roots and are never checked; string contents are literals, not
//! identifiers.
//!
//! # Examples
//!
//! ```text
//! // scope: { a, b }
//! a + b            // OK
//! a.missing        // OK: 'missing' is a property
//! { c: a }         // OK: 'c' is a key
//! a + c            // Error: 'c' is not bound
//! { c }            // Error: shorthand reads 'c'
//! ```

use crate::interpreter::types::Expr;

use super::super::{ValidationError, ValidationRule, Whitelist};

/// Rule that checks every referenced identifier against the whitelist.
pub struct UndefinedIdentifierRule;

impl UndefinedIdentifierRule {
    pub const ID: &'static str = "undefined-identifier";
}

impl ValidationRule for UndefinedIdentifierRule {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn description(&self) -> &'static str {
        "Identifiers must be bound in the evaluation scope"
    }

    fn validate(&self, expr: &Expr, whitelist: &Whitelist) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_expr(expr, whitelist, &mut errors, self.id());
        errors
    }
}

// ============================================================================
// AST Traversal
// ============================================================================

/// Check an expression for unbound identifiers
fn check_expr(
    expr: &Expr,
    whitelist: &Whitelist,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    match expr {
        Expr::Ident { name, span } => {
            if !whitelist.contains(name) {
                errors.push(
                    ValidationError::error(*span, format!("Unknown identifier '{}'", name), rule_id)
                        .with_identifier(name.clone()),
                );
            }
        }

        Expr::Member { object, .. } => {
            // Only check the object, not the property
            check_expr(object, whitelist, errors, rule_id);
        }

        Expr::Index { object, index, .. } => {
            check_expr(object, whitelist, errors, rule_id);
            check_expr(index, whitelist, errors, rule_id);
        }

        Expr::Call { callee, args, .. } => {
            check_expr(callee, whitelist, errors, rule_id);
            for arg in args {
                check_expr(arg, whitelist, errors, rule_id);
            }
        }

        Expr::Unary { operand, .. } => {
            check_expr(operand, whitelist, errors, rule_id);
        }

        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            check_expr(left, whitelist, errors, rule_id);
            check_expr(right, whitelist, errors, rule_id);
        }

        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            check_expr(condition, whitelist, errors, rule_id);
            check_expr(consequent, whitelist, errors, rule_id);
            check_expr(alternate, whitelist, errors, rule_id);
        }

        Expr::LitList { elements, .. } => {
            for element in elements {
                check_expr(element, whitelist, errors, rule_id);
            }
        }

        Expr::LitObj { properties, .. } => {
            for (_, _, value) in properties {
                check_expr(value, whitelist, errors, rule_id);
            }
        }

        // Literals don't contain identifier references
        Expr::LitBool { .. }
        | Expr::LitNum { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. }
        | Expr::LitUndefined { .. } => {}
    }
}
