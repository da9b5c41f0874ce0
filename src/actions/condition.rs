use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error::FlowError;
use super::registry::{ActionHandler, ActionRegistry};
use super::runner::ActionRunner;
use super::step::{Action, Step, CONDITION};
use crate::context::Context;
use crate::interpreter::Val;
use crate::template;

/// `condition`: evaluates the condition template and runs one branch as a
/// nested flow. The branch's outputs stay inside the branch; only its result
/// is returned.
pub struct ConditionAction;

#[async_trait]
impl ActionHandler for ConditionAction {
    async fn handle(
        &self,
        step: &Step,
        context: &Context,
        runner: &ActionRunner,
    ) -> Result<Val, FlowError> {
        let Action::Condition(condition) = &step.action else {
            return Err(FlowError::InvalidStep {
                kind: step.kind().to_string(),
            });
        };

        let taken = template::evaluate(&condition.condition, context, None).is_truthy();
        debug!(condition = %condition.condition, taken, "condition evaluated");

        let branch = if taken {
            condition.then.as_deref()
        } else {
            condition.els.as_deref()
        };
        runner.run(branch.unwrap_or_default(), context).await
    }
}

pub fn register(registry: &mut ActionRegistry) {
    registry.register(CONDITION, Arc::new(ConditionAction), false);
}
