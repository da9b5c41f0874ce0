use std::time::Duration;

use maplit::hashmap;
use serde_json::json;
use tokio::sync::mpsc;

use super::helpers::{flow, recording_runner};
use crate::actions::{ActionRegistry, ActionRunner, ApiCatalog, ApiConfig, ApiEntry, FlowError};
use crate::context::Context;
use crate::interpreter::Val;

#[tokio::test]
async fn test_call_api_before_init_passes_only_explicit_args() {
    let (runner, log) = recording_runner().await;
    let steps = flow(json!([
        { "action": "callApi", "methodName": "f", "args": ["x", "{{ 1 + 1 }}"] }
    ]));

    let result = runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::from("ok"));
    assert_eq!(
        log.lock().unwrap().clone(),
        vec![vec![Val::from("x"), Val::Num(2.0)]]
    );
}

#[tokio::test]
async fn test_default_params_are_appended_after_init() {
    let (runner, log) = recording_runner().await;
    let steps = flow(json!([
        { "action": "initApi", "defaultParams": { "tenant": "A" } },
        { "action": "callApi", "methodName": "f", "args": ["x"] }
    ]));

    runner.run(&steps, &Context::empty()).await.unwrap();
    let tenant = Val::Obj(hashmap! { "tenant".to_string() => Val::from("A") });
    assert_eq!(log.lock().unwrap().clone(), vec![vec![Val::from("x"), tenant]]);
}

#[tokio::test]
async fn test_init_without_default_params_appends_undefined() {
    let (runner, log) = recording_runner().await;
    let steps = flow(json!([
        { "action": "initApi", "baseURL": "https://example.test" },
        { "action": "callApi", "methodName": "f", "args": [] }
    ]));

    runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(log.lock().unwrap().clone(), vec![vec![Val::Undefined]]);
    match runner.api().binding().await {
        Val::Obj(map) => assert_eq!(map["_baseURL"], Val::from("https://example.test")),
        other => panic!("Expected object, got {:?}", other),
    }
}

#[tokio::test]
async fn test_default_params_are_read_at_call_time() {
    let (runner, log) = recording_runner().await;
    runner
        .api()
        .initialize(&ApiConfig {
            base_url: None,
            default_params: Some(json!({ "v": 1 }).as_object().unwrap().clone()),
        })
        .await;
    let call = flow(json!([{ "action": "callApi", "methodName": "f", "args": [] }]));
    runner.run(&call, &Context::empty()).await.unwrap();

    runner
        .api()
        .initialize(&ApiConfig {
            base_url: None,
            default_params: Some(json!({ "v": 2 }).as_object().unwrap().clone()),
        })
        .await;
    runner.run(&call, &Context::empty()).await.unwrap();

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls[0], vec![Val::Obj(hashmap! { "v".to_string() => Val::Num(1.0) })]);
    assert_eq!(calls[1], vec![Val::Obj(hashmap! { "v".to_string() => Val::Num(2.0) })]);
}

#[tokio::test]
async fn test_init_api_result() {
    let (runner, _) = recording_runner().await;
    let steps = flow(json!([
        { "action": "initApi", "defaultParams": { "tenant": "A" } }
    ]));

    let result = runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(
        result.to_json(),
        json!({
            "status": "success",
            "message": "API initialized",
            "params": { "tenant": "A" }
        })
    );
}

#[tokio::test]
async fn test_init_api_result_without_params() {
    let (runner, _) = recording_runner().await;
    let result = runner
        .run(&flow(json!([{ "action": "initApi" }])), &Context::empty())
        .await
        .unwrap();
    assert_eq!(result.to_json()["params"], json!({}));
}

#[tokio::test]
async fn test_api_args_see_output_var() {
    let (runner, log) = recording_runner().await;
    let steps = flow(json!([
        { "action": "declare", "fields": [{ "name": "id", "value": "{{ 7 }}" }], "outputVar": "form" },
        { "action": "callApi", "methodName": "f", "args": ["{{ form }}", "{{ form.id }}"] }
    ]));

    runner.run(&steps, &Context::empty()).await.unwrap();
    let form = Val::Obj(hashmap! { "id".to_string() => Val::Num(7.0) });
    assert_eq!(log.lock().unwrap()[0], vec![form, Val::Num(7.0)]);
}

#[tokio::test]
async fn test_literal_args_are_quoted() {
    let (runner, log) = recording_runner().await;
    let steps = flow(json!([
        { "action": "callApi", "methodName": "f", "args": ["it's", "a + b"] }
    ]));

    runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(
        log.lock().unwrap()[0],
        vec![Val::from("it's"), Val::from("a + b")]
    );
}

#[tokio::test]
async fn test_unknown_api_yields_empty_string() {
    let (runner, log) = recording_runner().await;
    let steps = flow(json!([
        { "action": "callApi", "methodName": "nope", "args": [] }
    ]));

    let result = runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::empty_str());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_api_call_aborts_run() {
    let api = ApiCatalog::new();
    api.register_fn("broken", |_| async { Err("status 500".to_string()) })
        .await;
    let runner = ActionRunner::new(ActionRegistry::with_builtins(), api);

    let err = runner
        .run(
            &flow(json!([{ "action": "callApi", "methodName": "broken", "args": [] }])),
            &Context::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::ApiRejected(ref msg) if msg == "status 500"));
}

#[tokio::test]
async fn test_registration_is_last_writer_wins() {
    let api = ApiCatalog::new();
    api.register(
        ApiEntry::new("save", |_| async { Ok(Val::from("v1")) })
            .with_name("Save form")
            .with_description("Saves the form"),
    )
    .await;
    api.register(ApiEntry::new("save", |_| async { Ok(Val::from("v2")) }))
        .await;

    let entries = api.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, "save");

    let runner = ActionRunner::new(ActionRegistry::with_builtins(), api);
    let result = runner
        .run(
            &flow(json!([{ "action": "callApi", "methodName": "save", "args": [] }])),
            &Context::empty(),
        )
        .await
        .unwrap();
    assert_eq!(result, Val::from("v2"));
}

#[tokio::test]
async fn test_binding_exposes_settings() {
    let api = ApiCatalog::new();
    api.register_fn("f", |_| async { Ok(Val::Null) }).await;

    match api.binding().await {
        Val::Obj(map) => {
            assert!(matches!(map.get("f"), Some(Val::Func(_))));
            assert!(!map.contains_key("_baseURL"));
        }
        other => panic!("Expected object, got {:?}", other),
    }

    api.initialize(&ApiConfig {
        base_url: Some("https://example.test".to_string()),
        default_params: Some(json!({ "tenant": "A" }).as_object().unwrap().clone()),
    })
    .await;

    match api.binding().await {
        Val::Obj(map) => {
            assert_eq!(map["_baseURL"], Val::from("https://example.test"));
            assert_eq!(
                map["_defaultParams"],
                Val::Obj(hashmap! { "tenant".to_string() => Val::from("A") })
            );
        }
        other => panic!("Expected object, got {:?}", other),
    }
}

#[tokio::test]
async fn test_api_binding_is_only_visible_to_call_api() {
    let (runner, log) = recording_runner().await;
    let steps = flow(json!([
        { "action": "declare", "value": "{{ $api.f() }}" }
    ]));

    let result = runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::empty_str());
    assert!(log.lock().unwrap().is_empty());
}

/// Catalog with `outer`, resolving to "outer", and `inner`, which reports its
/// arguments on `tx` after yielding once
async fn nested_runner(tx: mpsc::UnboundedSender<Vec<Val>>) -> ActionRunner {
    let api = ApiCatalog::new();
    api.register_fn("outer", |_| async { Ok(Val::from("outer")) })
        .await;
    api.register_fn("inner", move |args| {
        let tx = tx.clone();
        async move {
            tokio::task::yield_now().await;
            let _ = tx.send(args);
            Ok(Val::from("inner"))
        }
    })
    .await;
    ActionRunner::new(ActionRegistry::with_builtins(), api)
}

#[tokio::test]
async fn test_api_call_in_argument_runs() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = nested_runner(tx).await;
    let steps = flow(json!([
        { "action": "callApi", "methodName": "outer", "args": ["{{ $api.inner(1) }}"] }
    ]));

    let result = runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::from("outer"));

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("nested call should complete")
        .unwrap();
    assert_eq!(received, vec![Val::Num(1.0)]);
}

#[tokio::test]
async fn test_api_calls_in_logical_operands_run() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = nested_runner(tx).await;
    let steps = flow(json!([
        { "action": "callApi", "methodName": "outer", "args": ["{{ $api.inner(2) && $api.inner(3) }}"] }
    ]));

    runner.run(&steps, &Context::empty()).await.unwrap();

    let mut received = Vec::new();
    for _ in 0..2 {
        let args = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("both calls should complete")
            .unwrap();
        received.push(args);
    }
    received.sort_by(|a, b| a[0].to_number().total_cmp(&b[0].to_number()));
    assert_eq!(received, vec![vec![Val::Num(2.0)], vec![Val::Num(3.0)]]);
}

#[tokio::test]
async fn test_init_api_result_keeps_control_characters() {
    let (runner, _) = recording_runner().await;
    let steps = flow(json!([
        { "action": "initApi", "defaultParams": { "note": "a\u{1}b\u{e9}" } }
    ]));

    let result = runner.run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result.to_json()["params"]["note"], json!("a\u{1}b\u{e9}"));
}
