//! Rule: Non-Callable Call
//!
//! Reports an error when a literal is used as the callee of a call, e.g.
//! `1()`, `'x'()` or `{}()`. Such a call can only ever fail at runtime.

use crate::interpreter::types::Expr;

use super::super::{ValidationError, ValidationRule, Whitelist};

pub struct NonCallableCallRule;

impl ValidationRule for NonCallableCallRule {
    fn id(&self) -> &'static str {
        "non-callable-call"
    }

    fn description(&self) -> &'static str {
        "Literals cannot be called"
    }

    fn validate(&self, expr: &Expr, _whitelist: &Whitelist) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        visit(expr, &mut |e| {
            if let Expr::Call { callee, span, .. } = e {
                if is_literal(callee) {
                    errors.push(ValidationError::error(
                        *span,
                        "Literal value is not callable",
                        self.id(),
                    ));
                }
            }
        });
        errors
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::LitBool { .. }
            | Expr::LitNum { .. }
            | Expr::LitStr { .. }
            | Expr::LitNull { .. }
            | Expr::LitUndefined { .. }
            | Expr::LitList { .. }
            | Expr::LitObj { .. }
    )
}

/// Pre-order walk over every sub-expression
fn visit(expr: &Expr, f: &mut dyn FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Member { object, .. } => visit(object, f),
        Expr::Index { object, index, .. } => {
            visit(object, f);
            visit(index, f);
        }
        Expr::Call { callee, args, .. } => {
            visit(callee, f);
            for arg in args {
                visit(arg, f);
            }
        }
        Expr::Unary { operand, .. } => visit(operand, f),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            visit(left, f);
            visit(right, f);
        }
        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            visit(condition, f);
            visit(consequent, f);
            visit(alternate, f);
        }
        Expr::LitList { elements, .. } => {
            for element in elements {
                visit(element, f);
            }
        }
        Expr::LitObj { properties, .. } => {
            for (_, _, value) in properties {
                visit(value, f);
            }
        }
        Expr::Ident { .. }
        | Expr::LitBool { .. }
        | Expr::LitNum { .. }
        | Expr::LitStr { .. }
        | Expr::LitNull { .. }
        | Expr::LitUndefined { .. } => {}
    }
}
