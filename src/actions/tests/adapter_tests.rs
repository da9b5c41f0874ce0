use std::sync::{Arc, Mutex};

use maplit::hashmap;
use serde_json::json;

use super::helpers::{builtin_runner, flow};
use crate::actions::api::call_api_template;
use crate::actions::call::call_template;
use crate::context::{Context, StaticResolver};
use crate::interpreter::{NativeFunc, Val};

/// Context with a `form1` component whose `submit` method records its
/// arguments, and an `input1` value
fn component_context() -> (Context, Arc<Mutex<Vec<Vec<Val>>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    let form = Val::Obj(hashmap! {
        "submit".to_string() => Val::Func(NativeFunc::new("submit", move |args| {
            recorded.lock().unwrap().push(args);
            Ok(Val::from("submitted"))
        })),
    });
    let resolver = StaticResolver::new()
        .with_component("form1", form)
        .with_value("input1", Val::from("hello"));
    (Context::new(Arc::new(resolver)), calls)
}

#[test]
fn test_call_template_shape() {
    assert_eq!(
        call_template("form1", "submit", &["a".to_string(), "{{ n }}".to_string()]),
        "{{ $('form1')?.submit('a',  n ) }}"
    );
    assert_eq!(call_template("t", "reload", &[]), "{{ $('t')?.reload() }}");
}

#[test]
fn test_call_api_template_shape() {
    assert_eq!(
        call_api_template("saveForm", &["{{ form }}".to_string()]),
        "{{ $api.saveForm( form ) }}"
    );
}

#[tokio::test]
async fn test_call_invokes_component_method() {
    let (context, calls) = component_context();
    let steps = flow(json!([
        { "action": "declare", "value": "{{ 41 + 1 }}", "outputVar": "n" },
        { "action": "call", "compId": "form1", "methodName": "submit", "args": ["draft", "{{ n }}", "{{ $val('input1') }}"] }
    ]));

    let result = builtin_runner().run(&steps, &context).await.unwrap();
    assert_eq!(result, Val::from("submitted"));
    assert_eq!(
        calls.lock().unwrap().clone(),
        vec![vec![Val::from("draft"), Val::Num(42.0), Val::from("hello")]]
    );
}

#[tokio::test]
async fn test_call_on_missing_component_is_undefined() {
    let (context, calls) = component_context();
    let steps = flow(json!([
        { "action": "call", "compId": "ghost", "methodName": "submit", "args": ["x"] },
        { "action": "declare", "value": "{{ temp === undefined }}" }
    ]));

    let result = builtin_runner().run(&steps, &context).await.unwrap();
    assert_eq!(result, Val::Bool(true));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_call_with_unknown_argument_is_skipped() {
    let (context, calls) = component_context();
    let steps = flow(json!([
        { "action": "call", "compId": "form1", "methodName": "submit", "args": ["{{ nope }}"] }
    ]));

    let result = builtin_runner().run(&steps, &context).await.unwrap();
    assert_eq!(result, Val::empty_str());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_declare_single_value() {
    let (context, _) = component_context();
    let steps = flow(json!([
        { "action": "declare", "compId": "input1", "value": "{{ $val('input1') + '!' }}" }
    ]));
    let result = builtin_runner().run(&steps, &context).await.unwrap();
    assert_eq!(result, Val::from("hello!"));
}

#[tokio::test]
async fn test_declare_literal_value() {
    let steps = flow(json!([{ "action": "declare", "value": "just text" }]));
    let result = builtin_runner().run(&steps, &Context::empty()).await.unwrap();
    assert_eq!(result, Val::from("just text"));
}

#[tokio::test]
async fn test_declare_fields_are_evaluated_independently() {
    let (context, _) = component_context();
    let steps = flow(json!([
        { "action": "declare", "value": "{{ 2 }}", "outputVar": "n" },
        {
            "action": "declare",
            "fields": [
                { "name": "double", "value": "{{ n * 2 }}" },
                { "name": "input", "value": "{{ $val('input1') }}", "compId": "input1" },
                { "name": "broken", "value": "{{ double }}" },
                { "name": "label", "value": "fixed" }
            ],
            "outputVar": "form"
        },
        { "action": "declare", "value": "{{ form.double + 1 }}" }
    ]));

    let outcome = builtin_runner().execute(&steps, &context).await.unwrap();
    assert_eq!(
        outcome.output_var["form"],
        Val::Obj(hashmap! {
            "double".to_string() => Val::Num(4.0),
            "input".to_string() => Val::from("hello"),
            "broken".to_string() => Val::empty_str(),
            "label".to_string() => Val::from("fixed"),
        })
    );
    assert_eq!(outcome.result, Val::Num(5.0));
}
