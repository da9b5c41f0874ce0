//! Test helpers for interpreter tests

use crate::interpreter::{eval_expr, Bindings, EvalError, Val};
use crate::parser::parse_expression;

/// Parse `source` and evaluate it against `bindings`
pub fn eval_with(source: &str, bindings: &Bindings) -> Result<Val, EvalError> {
    let expr = parse_expression(source).expect("Parse failed");
    eval_expr(&expr, bindings)
}

/// Evaluate with no bindings, expecting success
pub fn eval(source: &str) -> Val {
    eval_with(source, &Bindings::new()).expect("Evaluation failed")
}

pub fn num(n: f64) -> Val {
    Val::Num(n)
}

pub fn s(v: &str) -> Val {
    Val::Str(v.to_string())
}
