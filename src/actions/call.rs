use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error::FlowError;
use super::registry::{ActionHandler, ActionRegistry};
use super::runner::ActionRunner;
use super::step::{Action, Step, CALL};
use crate::context::{Context, COMPONENT_BINDING};
use crate::interpreter::Val;
use crate::template::{self, as_expression_arg};

/// Template that invokes `<method>` on component `comp_id`, if it exists
pub fn call_template(comp_id: &str, method_name: &str, args: &[String]) -> String {
    let args: Vec<String> = args.iter().map(|arg| as_expression_arg(arg)).collect();
    format!(
        "{{{{ {}('{}')?.{}({}) }}}}",
        COMPONENT_BINDING,
        comp_id,
        method_name,
        args.join(", ")
    )
}

/// `call`: invokes a method on a host component through `$`
pub struct CallAction;

#[async_trait]
impl ActionHandler for CallAction {
    async fn handle(
        &self,
        step: &Step,
        context: &Context,
        _runner: &ActionRunner,
    ) -> Result<Val, FlowError> {
        let Action::Call(call) = &step.action else {
            return Err(FlowError::InvalidStep {
                kind: step.kind().to_string(),
            });
        };

        let template = call_template(&call.comp_id, &call.method_name, &call.args);
        debug!(template = %template, "calling component");
        Ok(template::evaluate(&template, context, None))
    }
}

pub fn register(registry: &mut ActionRegistry) {
    registry.register(CALL, Arc::new(CallAction), false);
}
