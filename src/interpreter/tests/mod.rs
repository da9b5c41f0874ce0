//! Tests for the expression interpreter
//!
//! Organized by feature area

mod helpers;
