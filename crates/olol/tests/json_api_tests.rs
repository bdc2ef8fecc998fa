use std::sync::Arc;

use olol::{JsonApi, VmConfig};
use pretty_assertions::assert_eq;
use serde_json::{Value as JsonValue, json};

fn api() -> JsonApi {
    JsonApi::new(VmConfig::default()).unwrap()
}

fn request(api: &JsonApi, op: &str, args: &JsonValue) -> JsonValue {
    let reply = api.request(op, &args.to_string());
    serde_json::from_str(&reply).unwrap()
}

fn result_of(api: &JsonApi, op: &str, args: &JsonValue) -> JsonValue {
    let reply = request(api, op, args);
    assert_eq!(reply["error"], JsonValue::Null, "unexpected error: {reply}");
    reply["result"].clone()
}

#[test]
fn execute_returns_value_and_output() {
    let api = api();
    let result = result_of(
        &api,
        "execute",
        &json!(["I CAN HAS STDIO? HAI ME TEH FUNCSHUN MAIN TEH INTEGR SAYZ WIT \"hi\" GIVEZ 42 KTHXBAI"]),
    );
    assert_eq!(result["value"], json!(42));
    assert_eq!(result["output"], json!("hi\n"));
}

#[test]
fn call_and_variables_round_trip() {
    let api = api();
    result_of(
        &api,
        "execute",
        &json!(["HAI ME TEH FUNCSHUN ADD TEH INTEGR WIT X TEH INTEGR AN WIT Y TEH INTEGR GIVEZ X MOAR Y KTHXBAI"]),
    );
    assert_eq!(result_of(&api, "call", &json!(["ADD", 40, 2])), json!(42));

    result_of(&api, "define_variable", &json!(["NAME", "ada", false]));
    assert_eq!(result_of(&api, "get_variable", &json!(["NAME"])), json!("ada"));
    result_of(&api, "set_variable", &json!(["NAME", "lin"]));
    assert_eq!(result_of(&api, "get_variable", &json!(["NAME"])), json!("lin"));
}

#[test]
fn errors_come_back_in_the_error_field() {
    let api = api();
    let reply = request(&api, "call", &json!(["MISSING"]));
    assert_eq!(reply["result"], JsonValue::Null);
    let error = reply["error"].as_str().unwrap();
    assert!(error.contains("MISSING"), "error: {error}");

    let reply = request(&api, "no_such_op", &json!([]));
    assert!(reply["error"].as_str().unwrap().contains("no_such_op"));
}

#[test]
fn object_references_marshal_by_id() {
    let api = api();
    result_of(
        &api,
        "execute",
        &json!([
            "HAI ME TEH CLAS THING\n\
             DIS TEH FUNCSHUN PING TEH STRIN GIVEZ \"pong\" KTHXBAI\n\
             KTHXBAI\n\
             HAI ME TEH FUNCSHUN MAKE TEH THING GIVEZ NEW THING KTHXBAI"
        ]),
    );
    let obj = result_of(&api, "call", &json!(["MAKE"]));
    let handle = obj["__GoValue_id"].as_str().unwrap().to_owned();

    assert_eq!(
        result_of(&api, "call_method", &json!([handle, "PING"])),
        json!("pong")
    );
    let mro = result_of(&api, "object_mro", &json!([handle]));
    assert_eq!(mro, json!(["<main>::THING"]));

    result_of(&api, "object_add_variable", &json!([handle, "TAG", 7]));
    let vars = result_of(&api, "object_variables", &json!([handle]));
    assert!(vars.as_array().unwrap().contains(&json!("TAG")));
}

#[test]
fn define_function_dispatches_through_the_callback_bridge() {
    let api = api();
    api.set_dispatcher(Arc::new(|callback_id, json_args| {
        assert_eq!(callback_id, 7);
        let args: Vec<JsonValue> = serde_json::from_str(json_args).unwrap();
        let total: i64 = args.iter().map(|a| a.as_i64().unwrap()).sum();
        json!({ "result": total, "error": null }).to_string()
    }));
    result_of(&api, "define_function", &json!(["BRIDGE_SUM", 2, 7]));
    let result = result_of(
        &api,
        "execute",
        &json!(["HAI ME TEH FUNCSHUN MAIN TEH INTEGR GIVEZ BRIDGE_SUM WIT 40 AN WIT 2 KTHXBAI"]),
    );
    assert_eq!(result["value"], json!(42));
}

#[test]
fn callback_errors_become_catchable_exceptions() {
    let api = api();
    api.set_dispatcher(Arc::new(|_, _| {
        json!({ "result": null, "error": "bridge broke" }).to_string()
    }));
    result_of(&api, "define_function", &json!(["BROKEN", 0, 1]));
    let result = result_of(
        &api,
        "execute",
        &json!([
            "HAI ME TEH FUNCSHUN MAIN TEH STRIN\n\
             MAYB\n\
             BROKEN\n\
             GIVEZ \"unreachable\"\n\
             OOPSIE E\n\
             GIVEZ E\n\
             KTHX\n\
             KTHXBAI"
        ]),
    );
    assert_eq!(result["value"], json!("bridge broke"));
}

#[test]
fn define_class_bridges_methods_and_accessors() {
    let api = api();
    api.set_dispatcher(Arc::new(|callback_id, json_args| {
        let args: Vec<JsonValue> = serde_json::from_str(json_args).unwrap();
        // every class callback gets the receiver reference first
        assert!(args[0]["__GoValue_id"].is_string(), "args: {args:?}");
        match callback_id {
            // DESCRIBE method: one converted argument after the receiver
            1 => json!({ "result": format!("seen {}", args[1]), "error": null }).to_string(),
            // SERIAL getter
            2 => json!({ "result": 99, "error": null }).to_string(),
            // unknown-method fallback: name comes second
            3 => json!({ "result": args[1], "error": null }).to_string(),
            other => json!({ "result": null, "error": format!("unexpected callback {other}") }).to_string(),
        }
    }));
    result_of(
        &api,
        "define_class",
        &json!([{
            "name": "GADGET",
            "variables": [{ "name": "SERIAL", "value": 0, "getter_id": 2 }],
            "methods": [{ "name": "DESCRIBE", "arity": 1, "callback_id": 1 }],
            "unknown_method_id": 3,
        }]),
    );
    let result = result_of(
        &api,
        "execute",
        &json!([
            "HAI ME TEH FUNCSHUN MAIN TEH STRIN\n\
             I HAS A VARIABLE G TEH GADGET ITZ NEW GADGET\n\
             GIVEZ (G DO DESCRIBE WIT 7) MOAR (G SERIAL AS STRIN) MOAR (G DO WAT)\n\
             KTHXBAI"
        ]),
    );
    assert_eq!(result["value"], json!("seen 799WAT"));
}

#[test]
fn reset_clears_state() {
    let api = api();
    result_of(&api, "define_variable", &json!(["X", 1, false]));
    result_of(&api, "reset", &json!([]));
    let reply = request(&api, "get_variable", &json!(["X"]));
    assert!(reply["error"].as_str().is_some());
}
