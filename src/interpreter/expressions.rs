//! Expression evaluation
//!
//! Tree-walking evaluator over [`Expr`]. Identifiers resolve only against the
//! supplied bindings; there is no ambient global scope. Callers are expected
//! to have run the undefined-identifier check first, but an unbound
//! identifier still evaluates to an error rather than a panic.

use std::collections::HashMap;

use super::errors::EvalError;
use super::types::{format_number, BinaryOp, Bindings, Expr, LogicalOp, UnaryOp, Val};

pub type EvalResult = Result<Val, EvalError>;

/// Evaluate an expression against a set of bindings
pub fn eval_expr(expr: &Expr, bindings: &Bindings) -> EvalResult {
    Ok(eval_chain(expr, bindings)?.unwrap_or(Val::Undefined))
}

/// Evaluate, reporting `None` when an optional link (`?.`) short-circuited
/// the member/call chain this expression belongs to.
fn eval_chain(expr: &Expr, bindings: &Bindings) -> Result<Option<Val>, EvalError> {
    match expr {
        Expr::Member {
            object,
            property,
            optional,
            ..
        } => {
            let Some(base) = eval_chain(object, bindings)? else {
                return Ok(None);
            };
            if *optional && base.is_nullish() {
                return Ok(None);
            }
            get_property(&base, property).map(Some)
        }

        Expr::Index {
            object,
            index,
            optional,
            ..
        } => {
            let Some(base) = eval_chain(object, bindings)? else {
                return Ok(None);
            };
            if *optional && base.is_nullish() {
                return Ok(None);
            }
            let key = eval_expr(index, bindings)?;
            get_index(&base, &key).map(Some)
        }

        Expr::Call {
            callee,
            args,
            optional,
            ..
        } => {
            let Some(target) = eval_chain(callee, bindings)? else {
                return Ok(None);
            };
            if *optional && target.is_nullish() {
                return Ok(None);
            }
            let values = args
                .iter()
                .map(|arg| eval_expr(arg, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            match target {
                Val::Func(func) => func.call(values).map(Some),
                _ => Err(EvalError::NotCallable(describe_callee(callee))),
            }
        }

        _ => eval_plain(expr, bindings).map(Some),
    }
}

fn eval_plain(expr: &Expr, bindings: &Bindings) -> EvalResult {
    match expr {
        Expr::LitBool { v, .. } => Ok(Val::Bool(*v)),

        Expr::LitNum { v, .. } => Ok(Val::Num(*v)),

        Expr::LitStr { v, .. } => Ok(Val::Str(v.clone())),

        Expr::LitNull { .. } => Ok(Val::Null),

        Expr::LitUndefined { .. } => Ok(Val::Undefined),

        Expr::LitList { elements, .. } => elements
            .iter()
            .map(|e| eval_expr(e, bindings))
            .collect::<Result<Vec<_>, _>>()
            .map(Val::List),

        Expr::LitObj { properties, .. } => {
            let mut map = HashMap::with_capacity(properties.len());
            for (key, _, value) in properties {
                map.insert(key.clone(), eval_expr(value, bindings)?);
            }
            Ok(Val::Obj(map))
        }

        Expr::Ident { name, .. } => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::native(name.clone(), "is not defined")),

        Expr::Unary { op, operand, .. } => {
            let value = eval_expr(operand, bindings)?;
            Ok(match op {
                UnaryOp::Not => Val::Bool(!value.is_truthy()),
                UnaryOp::Neg => Val::Num(-value.to_number()),
                UnaryOp::Pos => Val::Num(value.to_number()),
            })
        }

        Expr::Binary {
            op, left, right, ..
        } => {
            let l = eval_expr(left, bindings)?;
            let r = eval_expr(right, bindings)?;
            Ok(apply_binary(*op, &l, &r))
        }

        Expr::Logical {
            op, left, right, ..
        } => {
            let l = eval_expr(left, bindings)?;
            let short_circuit = match op {
                LogicalOp::And => !l.is_truthy(),
                LogicalOp::Or => l.is_truthy(),
                LogicalOp::Nullish => !l.is_nullish(),
            };
            if short_circuit {
                Ok(l)
            } else {
                eval_expr(right, bindings)
            }
        }

        Expr::Ternary {
            condition,
            consequent,
            alternate,
            ..
        } => {
            if eval_expr(condition, bindings)?.is_truthy() {
                eval_expr(consequent, bindings)
            } else {
                eval_expr(alternate, bindings)
            }
        }

        Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => eval_expr(expr, bindings),
    }
}

/// Apply an eagerly evaluated binary operator
pub fn apply_binary(op: BinaryOp, l: &Val, r: &Val) -> Val {
    match op {
        BinaryOp::Add => {
            if is_stringish(l) || is_stringish(r) {
                Val::Str(format!("{}{}", l, r))
            } else {
                Val::Num(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => Val::Num(l.to_number() - r.to_number()),
        BinaryOp::Mul => Val::Num(l.to_number() * r.to_number()),
        BinaryOp::Div => Val::Num(l.to_number() / r.to_number()),
        BinaryOp::Mod => Val::Num(l.to_number() % r.to_number()),
        BinaryOp::Eq => Val::Bool(l.loose_eq(r)),
        BinaryOp::Ne => Val::Bool(!l.loose_eq(r)),
        BinaryOp::StrictEq => Val::Bool(l.strict_eq(r)),
        BinaryOp::StrictNe => Val::Bool(!l.strict_eq(r)),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            Val::Bool(compare(op, l, r))
        }
    }
}

/// Operands that turn `+` into concatenation
fn is_stringish(v: &Val) -> bool {
    matches!(v, Val::Str(_) | Val::List(_) | Val::Obj(_) | Val::Func(_) | Val::Promise(_))
}

fn compare(op: BinaryOp, l: &Val, r: &Val) -> bool {
    if let (Val::Str(a), Val::Str(b)) = (l, r) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Lte => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    // NaN compares false in every direction
    let (a, b) = (l.to_number(), r.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Lte => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

/// Read `base.property`
pub fn get_property(base: &Val, property: &str) -> EvalResult {
    match base {
        Val::Undefined => Err(EvalError::PropertyOfNullish {
            property: property.to_string(),
            base: "undefined",
        }),
        Val::Null => Err(EvalError::PropertyOfNullish {
            property: property.to_string(),
            base: "null",
        }),
        Val::Obj(map) => Ok(map.get(property).cloned().unwrap_or(Val::Undefined)),
        Val::List(items) => {
            if property == "length" {
                Ok(Val::Num(items.len() as f64))
            } else {
                Ok(property
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Val::Undefined))
            }
        }
        Val::Str(s) => {
            if property == "length" {
                Ok(Val::Num(s.encode_utf16().count() as f64))
            } else {
                Ok(property
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Val::Str(c.to_string()))
                    .unwrap_or(Val::Undefined))
            }
        }
        _ => Ok(Val::Undefined),
    }
}

/// Read `base[key]`
pub fn get_index(base: &Val, key: &Val) -> EvalResult {
    let property = match key {
        Val::Num(n) => format_number(*n),
        other => other.to_string(),
    };
    get_property(base, &property)
}

/// Name used in "is not a function" errors
fn describe_callee(callee: &Expr) -> String {
    match callee {
        Expr::Ident { name, .. } => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{}", describe_callee(object), property),
        Expr::Index { object, .. } => format!("{}[...]", describe_callee(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe_callee(callee)),
        _ => "expression".to_string(),
    }
}
