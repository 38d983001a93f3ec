//! End-to-end HTTP control-plane tests: each spins up the real axum router
//! on an OS-assigned port and drives it with `reqwest`.

use std::net::SocketAddr;
use std::sync::Arc;

use cideldill_codec::Cid;
use cideldill_manager::Manager;
use cideldill_server::{router, AppState};
use cideldill_store::SqliteStore;
use serde_json::json;

async fn spawn_server() -> (SocketAddr, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().expect("open in-memory store"));
    let manager = Arc::new(Manager::new());
    let state = AppState::new(manager, store.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (addr, store)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();
    let response = client.get(format!("http://{addr}/healthz")).send().await.expect("request");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn add_breakpoint_then_list_round_trips() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/breakpoints"))
        .json(&json!({"function_name": "pkg.mod.fn", "behavior": "stop"}))
        .send()
        .await
        .expect("add request");
    assert_eq!(response.status(), 200);

    let snapshot: serde_json::Value = client
        .get(format!("http://{addr}/api/breakpoints"))
        .send()
        .await
        .expect("list request")
        .json()
        .await
        .expect("json");
    assert_eq!(snapshot["breakpoints"], json!(["pkg.mod.fn"]));
    assert_eq!(snapshot["behaviors"]["pkg.mod.fn"], "stop");
}

#[tokio::test]
async fn call_start_rejects_unknown_cid_references() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();

    let unresolved_cid = Cid::of(b"never stored");
    let body = json!({
        "method_name": "pkg.mod.fn",
        "target": {"cid": unresolved_cid.as_str(), "data": null, "serialization_format": "dill"},
        "args": [],
        "kwargs": {},
        "call_site": {"timestamp": 99.0, "stack_trace": [{"filename": "pkg/mod.py", "lineno": 10, "function": "caller"}]},
        "signature": null,
        "process_identity": {"pid": 1234, "process_start_time": 100.0},
    });

    let response = client
        .post(format!("http://{addr}/api/call/start"))
        .json(&body)
        .send()
        .await
        .expect("start request");
    assert_eq!(response.status(), 400);
    let error_body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(error_body["error"], "cid_not_found");
    assert_eq!(error_body["missing_cids"], json!([unresolved_cid.as_str()]));
}

#[tokio::test]
async fn call_start_continue_then_complete_round_trips() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();

    let encoded = cideldill_codec::encode(&json!({"x": 1}));
    let body = json!({
        "method_name": "pkg.mod.fn",
        "target": {"cid": encoded.cid.as_str(), "data": base64_encode(&encoded.bytes), "serialization_format": "dill"},
        "args": [],
        "kwargs": {},
        "call_site": {"timestamp": 99.0, "stack_trace": [{"filename": "pkg/mod.py", "lineno": 10, "function": "caller"}]},
        "signature": null,
        "process_identity": {"pid": 1234, "process_start_time": 100.0},
    });

    let response = client
        .post(format!("http://{addr}/api/call/start"))
        .json(&body)
        .send()
        .await
        .expect("start request");
    assert_eq!(response.status(), 200);
    let start: serde_json::Value = response.json().await.expect("json");
    assert_eq!(start["action"], "continue");
    let call_id = start["call_id"].as_str().expect("call_id").to_string();

    let complete_body = json!({
        "call_id": call_id,
        "status": "success",
        "result": null,
        "exception": null,
        "process_identity": {"pid": 1234, "process_start_time": 100.0},
        "timestamp": 101.0,
    });
    let response = client
        .post(format!("http://{addr}/api/call/complete"))
        .json(&complete_body)
        .send()
        .await
        .expect("complete request");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn timeline_event_is_accepted() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/api/call/event"))
        .json(&json!({"kind": "debuggee_attached", "process_key": "100.0+42", "detail": null}))
        .send()
        .await
        .expect("event request");
    assert_eq!(response.status(), 200);
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn inline_item(value: serde_json::Value) -> serde_json::Value {
    let encoded = cideldill_codec::encode(&value);
    json!({
        "cid": encoded.cid.as_str(),
        "data": base64_encode(&encoded.bytes),
        "serialization_format": "dill",
    })
}

fn call_body(method_name: &str, args: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "method_name": method_name,
        "target": inline_item(json!(method_name)),
        "args": args,
        "kwargs": {},
        "call_site": {"timestamp": 99.0, "stack_trace": [{"filename": "pkg/mod.py", "lineno": 10, "function": "caller"}]},
        "signature": null,
        "process_identity": {"pid": 4242, "process_start_time": 100.0},
    })
}

fn pause_id_from_poll_url(poll_url: &str) -> uuid::Uuid {
    uuid::Uuid::parse_str(poll_url.rsplit('/').next().expect("poll_url has a trailing segment")).expect("valid uuid")
}

// Scenario 2 (SPEC_FULL.md §8): stop, then resume-continue.
#[tokio::test]
async fn scenario_stop_then_resume_continue() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    client
        .post(format!("{base}/api/breakpoints"))
        .json(&json!({"function_name": "add", "behavior": "stop"}))
        .send()
        .await
        .expect("add breakpoint")
        .error_for_status()
        .expect("add breakpoint ok");

    let start: serde_json::Value = client
        .post(format!("{base}/api/call/start"))
        .json(&call_body("add", vec![inline_item(json!(2)), inline_item(json!(3))]))
        .send()
        .await
        .expect("start request")
        .json()
        .await
        .expect("json");
    assert_eq!(start["action"], "poll");
    let call_id = start["call_id"].as_str().expect("call_id").to_string();
    let pause_id = pause_id_from_poll_url(start["poll_url"].as_str().expect("poll_url"));

    let paused: Vec<serde_json::Value> =
        client.get(format!("{base}/api/paused")).send().await.expect("paused").json().await.expect("json");
    assert_eq!(paused.len(), 1);

    client
        .post(format!("{base}/api/paused/{pause_id}/continue"))
        .json(&json!({"action": "continue"}))
        .send()
        .await
        .expect("resume request")
        .error_for_status()
        .expect("resume ok");

    let polled: serde_json::Value =
        client.get(format!("{base}/api/poll/{pause_id}")).send().await.expect("poll").json().await.expect("json");
    assert_eq!(polled["status"], "ready");
    assert_eq!(polled["action"]["action"], "continue");

    client
        .post(format!("{base}/api/call/complete"))
        .json(&json!({
            "call_id": call_id,
            "status": "success",
            "result": inline_item(json!(5)),
            "exception": null,
            "process_identity": {"pid": 4242, "process_start_time": 100.0},
            "timestamp": 101.0,
        }))
        .send()
        .await
        .expect("complete request")
        .error_for_status()
        .expect("complete ok");

    let history: Vec<serde_json::Value> = client
        .get(format!("{base}/api/breakpoints/add/history"))
        .send()
        .await
        .expect("history request")
        .json()
        .await
        .expect("json");
    assert_eq!(history.len(), 1);
    let paused_at = history[0]["paused_at"].as_f64().expect("paused_at recorded");
    let completed_at = history[0]["completed_at"].as_f64().expect("completed_at recorded");
    assert!(completed_at >= paused_at);
}

// Scenario 3 (SPEC_FULL.md §8): skip with a fake result.
#[tokio::test]
async fn scenario_skip_with_fake_result() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    client
        .post(format!("{base}/api/breakpoints"))
        .json(&json!({"function_name": "add", "behavior": "stop"}))
        .send()
        .await
        .expect("add breakpoint")
        .error_for_status()
        .expect("add breakpoint ok");

    let start: serde_json::Value = client
        .post(format!("{base}/api/call/start"))
        .json(&call_body("add", vec![inline_item(json!(2)), inline_item(json!(3))]))
        .send()
        .await
        .expect("start request")
        .json()
        .await
        .expect("json");
    let call_id = start["call_id"].as_str().expect("call_id").to_string();
    let pause_id = pause_id_from_poll_url(start["poll_url"].as_str().expect("poll_url"));

    client
        .post(format!("{base}/api/paused/{pause_id}/continue"))
        .json(&json!({"action": "skip", "fake_result": 42}))
        .send()
        .await
        .expect("resume request")
        .error_for_status()
        .expect("resume ok");

    let polled: serde_json::Value =
        client.get(format!("{base}/api/poll/{pause_id}")).send().await.expect("poll").json().await.expect("json");
    assert_eq!(polled["action"]["action"], "skip");
    assert_eq!(polled["action"]["fake_result"], 42);

    // The debuggee never invokes the original `add`; it completes with the
    // fake result instead.
    client
        .post(format!("{base}/api/call/complete"))
        .json(&json!({
            "call_id": call_id,
            "status": "success",
            "result": inline_item(json!(42)),
            "exception": null,
            "process_identity": {"pid": 4242, "process_start_time": 100.0},
            "timestamp": 101.0,
        }))
        .send()
        .await
        .expect("complete request")
        .error_for_status()
        .expect("complete ok");
}

// Scenario 4 (SPEC_FULL.md §8): modify args before the call runs.
#[tokio::test]
async fn scenario_modify_args() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    client
        .post(format!("{base}/api/breakpoints"))
        .json(&json!({"function_name": "double", "behavior": "stop"}))
        .send()
        .await
        .expect("add breakpoint")
        .error_for_status()
        .expect("add breakpoint ok");

    let start: serde_json::Value = client
        .post(format!("{base}/api/call/start"))
        .json(&call_body("double", vec![inline_item(json!(5))]))
        .send()
        .await
        .expect("start request")
        .json()
        .await
        .expect("json");
    let pause_id = pause_id_from_poll_url(start["poll_url"].as_str().expect("poll_url"));

    client
        .post(format!("{base}/api/paused/{pause_id}/continue"))
        .json(&json!({"action": "modify", "modified_args": [inline_item(json!(10))]}))
        .send()
        .await
        .expect("resume request")
        .error_for_status()
        .expect("resume ok");

    let polled: serde_json::Value =
        client.get(format!("{base}/api/poll/{pause_id}")).send().await.expect("poll").json().await.expect("json");
    assert_eq!(polled["action"]["action"], "modify");
    assert_eq!(polled["action"]["modified_args"][0]["data"].is_string(), true);
}

// Scenario 5 (SPEC_FULL.md §8): replace, no stop.
#[tokio::test]
async fn scenario_replace() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    client
        .post(format!("{base}/api/functions"))
        .json(&json!({"name": "add", "signature": "(a, b)"}))
        .send()
        .await
        .expect("register add")
        .error_for_status()
        .expect("register add ok");
    client
        .post(format!("{base}/api/functions"))
        .json(&json!({"name": "add_alt", "signature": "(a, b)"}))
        .send()
        .await
        .expect("register add_alt")
        .error_for_status()
        .expect("register add_alt ok");
    client
        .post(format!("{base}/api/breakpoints"))
        .json(&json!({"function_name": "add"}))
        .send()
        .await
        .expect("add breakpoint")
        .error_for_status()
        .expect("add breakpoint ok");
    client
        .post(format!("{base}/api/breakpoints/add/replacement"))
        .json(&json!({"replacement_function": "add_alt"}))
        .send()
        .await
        .expect("set replacement")
        .error_for_status()
        .expect("set replacement ok");

    let start: serde_json::Value = client
        .post(format!("{base}/api/call/start"))
        .json(&call_body("add", vec![inline_item(json!(2)), inline_item(json!(3))]))
        .send()
        .await
        .expect("start request")
        .json()
        .await
        .expect("json");
    assert_eq!(start["action"], "replace");
    assert_eq!(start["function_name"], "add_alt");

    // The debuggee invokes `add_alt` locally and reports its result.
    let call_id = start["call_id"].as_str().expect("call_id").to_string();
    client
        .post(format!("{base}/api/call/complete"))
        .json(&json!({
            "call_id": call_id,
            "status": "success",
            "result": inline_item(json!(5)),
            "exception": null,
            "process_identity": {"pid": 4242, "process_start_time": 100.0},
            "timestamp": 101.0,
        }))
        .send()
        .await
        .expect("complete request")
        .error_for_status()
        .expect("complete ok");
}

// Scenario 6 (SPEC_FULL.md §8): raise.
#[tokio::test]
async fn scenario_raise() {
    let (addr, _store) = spawn_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    client
        .post(format!("{base}/api/breakpoints"))
        .json(&json!({"function_name": "read_file", "behavior": "stop"}))
        .send()
        .await
        .expect("add breakpoint")
        .error_for_status()
        .expect("add breakpoint ok");

    let start: serde_json::Value = client
        .post(format!("{base}/api/call/start"))
        .json(&call_body("read_file", vec![inline_item(json!("missing.txt"))]))
        .send()
        .await
        .expect("start request")
        .json()
        .await
        .expect("json");
    let call_id = start["call_id"].as_str().expect("call_id").to_string();
    let pause_id = pause_id_from_poll_url(start["poll_url"].as_str().expect("poll_url"));

    client
        .post(format!("{base}/api/paused/{pause_id}/continue"))
        .json(&json!({
            "action": "raise",
            "exception_type": "FileNotFoundError",
            "exception_message": "nope",
        }))
        .send()
        .await
        .expect("resume request")
        .error_for_status()
        .expect("resume ok");

    let polled: serde_json::Value =
        client.get(format!("{base}/api/poll/{pause_id}")).send().await.expect("poll").json().await.expect("json");
    assert_eq!(polled["action"]["action"], "raise");
    assert_eq!(polled["action"]["exception_type"], "FileNotFoundError");

    client
        .post(format!("{base}/api/call/complete"))
        .json(&json!({
            "call_id": call_id,
            "status": "exception",
            "result": null,
            "exception": {"exception_type": "FileNotFoundError", "exception_message": "nope", "traceback": null},
            "process_identity": {"pid": 4242, "process_start_time": 100.0},
            "timestamp": 101.0,
        }))
        .send()
        .await
        .expect("complete request")
        .error_for_status()
        .expect("complete ok");

    let history: Vec<serde_json::Value> = client
        .get(format!("{base}/api/breakpoints/read_file/history"))
        .send()
        .await
        .expect("history request")
        .json()
        .await
        .expect("json");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "exception");
}

// Scenario 7 (SPEC_FULL.md §8): CID deduplication, and the retry after a
// "wipe" (modeled here as a second server with a fresh, empty store, since
// the store has no HTTP-exposed wipe operation of its own).
#[tokio::test]
async fn scenario_cid_dedup_after_wipe() {
    let (first_addr, _first_store) = spawn_server().await;
    let client = reqwest::Client::new();

    let encoded = cideldill_codec::encode(&json!("large payload"));
    let reference_only = json!({"cid": encoded.cid.as_str(), "data": null, "serialization_format": "dill"});
    let inline = json!({
        "cid": encoded.cid.as_str(),
        "data": base64_encode(&encoded.bytes),
        "serialization_format": "dill",
    });

    let first_body = json!({
        "method_name": "echo",
        "target": inline_item(json!("echo")),
        "args": [inline],
        "kwargs": {},
        "call_site": {"timestamp": 99.0, "stack_trace": []},
        "signature": null,
        "process_identity": {"pid": 4242, "process_start_time": 100.0},
    });
    let response = client
        .post(format!("http://{first_addr}/api/call/start"))
        .json(&first_body)
        .send()
        .await
        .expect("first start request");
    assert_eq!(response.status(), 200);

    // A fresh server stands in for the same one after its store was wiped:
    // the reference-only call for the same CID is now unresolvable.
    let (second_addr, _second_store) = spawn_server().await;
    let second_body = json!({
        "method_name": "echo",
        "target": inline_item(json!("echo")),
        "args": [reference_only],
        "kwargs": {},
        "call_site": {"timestamp": 99.0, "stack_trace": []},
        "signature": null,
        "process_identity": {"pid": 4242, "process_start_time": 100.0},
    });
    let response = client
        .post(format!("http://{second_addr}/api/call/start"))
        .json(&second_body)
        .send()
        .await
        .expect("second start request (reference-only)");
    assert_eq!(response.status(), 400);
    let error_body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(error_body["error"], "cid_not_found");

    // The client retries with the data inlined, and the call proceeds.
    let retry_body = json!({
        "method_name": "echo",
        "target": inline_item(json!("echo")),
        "args": [inline],
        "kwargs": {},
        "call_site": {"timestamp": 99.0, "stack_trace": []},
        "signature": null,
        "process_identity": {"pid": 4242, "process_start_time": 100.0},
    });
    let response = client
        .post(format!("http://{second_addr}/api/call/start"))
        .json(&retry_body)
        .send()
        .await
        .expect("retry start request");
    assert_eq!(response.status(), 200);
}
