//! Type definitions for the interpreter
//!
//! - AST nodes (Expr and its operators)
//! - Runtime values (Val, NativeFunc, Promise)

pub mod ast;
pub mod values;

pub use ast::{BinaryOp, Expr, LogicalOp, Span, UnaryOp};
pub use values::{format_number, Bindings, NativeFunc, NativeResult, Promise, PromiseResult, Val};
