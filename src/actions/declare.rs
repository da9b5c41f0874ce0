use std::collections::HashMap;

use super::error::FlowError;
use super::registry::ActionRegistry;
use super::step::{Action, DeclareStep, Step, DECLARE};
use crate::context::Context;
use crate::interpreter::Val;
use crate::template;

/// `declare`: a single evaluated value, or an object of evaluated fields.
/// Each field is evaluated on its own against the same context.
fn declare(step: &Step, context: &Context) -> Result<Val, FlowError> {
    let Action::Declare(declare) = &step.action else {
        return Err(FlowError::InvalidStep {
            kind: step.kind().to_string(),
        });
    };

    match declare {
        DeclareStep::Value { value, .. } => Ok(template::evaluate(value, context, None)),
        DeclareStep::Fields { fields } => {
            let mut result = HashMap::with_capacity(fields.len());
            for field in fields {
                result.insert(
                    field.name.clone(),
                    template::evaluate(&field.value, context, None),
                );
            }
            Ok(Val::Obj(result))
        }
    }
}

pub fn register(registry: &mut ActionRegistry) {
    registry.register_fn(DECLARE, declare, false);
}
