use std::time::Duration;

use maplit::hashmap;
use serde_json::json;

use super::helpers::{builtin_runner, flow};
use crate::actions::{ActionRegistry, ActionRunner, ApiCatalog, FlowError};
use crate::context::Context;
use crate::interpreter::Val;

#[tokio::test]
async fn test_empty_flow_resolves_to_null() {
    let result = builtin_runner().run(&[], &Context::empty()).await.unwrap();
    assert_eq!(result, Val::Null);
}

#[tokio::test]
async fn test_later_steps_see_earlier_outputs() {
    let steps = flow(json!([
        { "action": "declare", "value": "{{ 1+1 }}", "outputVar": "n" },
        { "action": "declare", "value": "{{ n * 10 }}" }
    ]));
    let result = builtin_runner().run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::Num(20.0));
}

#[tokio::test]
async fn test_default_output_var_is_temp() {
    let steps = flow(json!([
        { "action": "declare", "value": "{{ 5 }}" },
        { "action": "declare", "value": "{{ temp + 1 }}" }
    ]));
    let outcome = builtin_runner().execute(&steps, &Context::empty()).await.unwrap();
    assert_eq!(outcome.result, Val::Num(6.0));
    assert_eq!(outcome.output_var, hashmap! { "temp".to_string() => Val::Num(6.0) });
}

#[tokio::test]
async fn test_configured_default_output_var() {
    let runner = builtin_runner().with_default_output_var("last");
    let steps = flow(json!([
        { "action": "declare", "value": "{{ 'a' }}" },
        { "action": "declare", "value": "{{ last + 'b' }}" }
    ]));
    let outcome = runner.execute(&steps, &Context::empty()).await.unwrap();
    assert_eq!(outcome.result, Val::from("ab"));
    assert!(outcome.output_var.contains_key("last"));
    assert!(!outcome.output_var.contains_key("temp"));
}

#[tokio::test]
async fn test_caller_context_is_not_mutated() {
    let context = Context::empty().with_output_var(hashmap! { "seed".to_string() => Val::Num(1.0) });
    let steps = flow(json!([
        { "action": "declare", "value": "{{ seed + 1 }}", "outputVar": "seed" }
    ]));
    let outcome = builtin_runner().execute(&steps, &context).await.unwrap();
    assert_eq!(outcome.output_var["seed"], Val::Num(2.0));
    assert_eq!(context.output_var["seed"], Val::Num(1.0));
}

#[tokio::test]
async fn test_unknown_identifier_does_not_abort_run() {
    let steps = flow(json!([
        { "action": "declare", "value": "{{ missing + 1 }}", "outputVar": "a" },
        { "action": "declare", "value": "{{ a === '' ? 'empty' : 'set' }}" }
    ]));
    let result = builtin_runner().run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::from("empty"));
}

#[tokio::test]
async fn test_unknown_action_aborts_run() {
    let mut registry = ActionRegistry::with_builtins();
    registry.register_fn(
        "mark",
        |_, _| -> Result<Val, FlowError> { panic!("steps after a failure must not run") },
        false,
    );
    let runner = ActionRunner::new(registry, ApiCatalog::new());
    let steps = flow(json!([
        { "action": "declare", "value": "{{ 1 }}" },
        { "action": "nope" },
        { "action": "mark" }
    ]));
    let err = runner.run(&steps, &Context::empty()).await.unwrap_err();
    assert!(matches!(err, FlowError::UnknownAction(ref kind) if kind == "nope"));
}

#[tokio::test]
async fn test_handler_error_propagates() {
    let mut registry = ActionRegistry::with_builtins();
    registry.register_fn(
        "fail",
        |step, _| Err(FlowError::handler(step.kind(), "bad input")),
        false,
    );
    let runner = ActionRunner::new(registry, ApiCatalog::new());
    let err = runner
        .run(&flow(json!([{ "action": "fail" }])), &Context::empty())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "action 'fail' failed: bad input");
}

#[tokio::test]
async fn test_condition_false_without_els_is_null() {
    let steps = flow(json!([
        { "action": "condition", "condition": "{{ 1 > 2 }}", "then": [
            { "action": "declare", "value": "{{ 'then' }}" }
        ]}
    ]));
    let result = builtin_runner().run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::Null);
}

#[tokio::test]
async fn test_condition_runs_matching_branch() {
    let steps = flow(json!([
        { "action": "declare", "value": "{{ 3 }}", "outputVar": "n" },
        {
            "action": "condition",
            "condition": "{{ n > 2 }}",
            "then": [
                { "action": "declare", "value": "{{ n * 2 }}", "outputVar": "inner" },
                { "action": "declare", "value": "{{ inner + 1 }}" }
            ],
            "els": [{ "action": "declare", "value": "{{ 'small' }}" }],
            "outputVar": "branch"
        }
    ]));
    let outcome = builtin_runner().execute(&steps, &Context::empty()).await.unwrap();
    assert_eq!(outcome.result, Val::Num(7.0));
    assert_eq!(outcome.output_var["branch"], Val::Num(7.0));
    // Outputs of the branch stay inside the branch
    assert!(!outcome.output_var.contains_key("inner"));
}

#[tokio::test]
async fn test_condition_takes_els_branch() {
    let steps = flow(json!([
        {
            "action": "condition",
            "condition": "{{ missing }}",
            "then": [{ "action": "declare", "value": "{{ 'then' }}" }],
            "els": [{ "action": "declare", "value": "{{ 'els' }}" }]
        }
    ]));
    let result = builtin_runner().run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::from("els"));
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let api = ApiCatalog::new();
    api.register_fn("wait", |args| async move {
        let ms = args.first().map(Val::to_number).unwrap_or(0.0);
        tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        Ok(Val::Null)
    })
    .await;
    let runner = ActionRunner::new(ActionRegistry::with_builtins(), api);
    let context = Context::empty();

    let first = flow(json!([
        { "action": "declare", "value": "{{ 'first' }}", "outputVar": "mine" },
        { "action": "callApi", "methodName": "wait", "args": ["{{ 20 }}"] },
        { "action": "declare", "value": "{{ [mine, typeof_other] }}" }
    ]));
    let second = flow(json!([
        { "action": "declare", "value": "{{ 'second' }}", "outputVar": "typeof_other" },
        { "action": "callApi", "methodName": "wait", "args": ["{{ 5 }}"] },
        { "action": "declare", "value": "{{ mine }}" }
    ]));

    let (a, b) = tokio::join!(
        runner.execute(&first, &context),
        runner.execute(&second, &context)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    // Each run only sees its own outputs; the other's names are unknown
    assert_eq!(a.result, Val::empty_str());
    assert_eq!(b.result, Val::empty_str());
    assert!(!a.output_var.contains_key("typeof_other"));
    assert!(!b.output_var.contains_key("mine"));
    assert_eq!(a.output_var["mine"], Val::from("first"));
    assert_eq!(b.output_var["typeof_other"], Val::from("second"));
    assert_ne!(a.run_id, b.run_id);
}
