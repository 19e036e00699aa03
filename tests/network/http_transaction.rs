use microprobe::compiler::Compiler;
use microprobe::engine::{Context, Runtime};
use microprobe::report::evaluate;
use serde_json::json;

use crate::loopback;

fn fetch_program(port: u16, arguments: serde_json::Value) -> String {
    json!({"func": "compose", "children": [
        {"func": "domain_name", "arguments": {"domain": "localhost"}},
        {"func": "dns_lookup_static", "arguments": {"addresses": ["127.0.0.1"]}},
        {"func": "make_endpoints_for_port", "arguments": {"port": port}},
        {"func": "new_endpoint_pipeline", "children": [
            {"func": "tcp_connect"},
            {"func": "http_transaction", "arguments": arguments},
            {"func": "discard"}
        ]}
    ]})
    .to_string()
}

#[tokio::test]
async fn compiled_program_fetches_over_tcp() {
    let address = loopback::http_server("it works").await;
    let func = Compiler::new()
        .compile_json(&fetch_program(address.port(), json!({})))
        .unwrap();

    let rtx = Runtime::default();
    let report = evaluate(func.as_ref(), &Context::new(), &rtx).await;
    assert!(report.is_ok(), "{:?}", report.exception);

    let observations = &report.observations;
    assert_eq!(observations.queries.len(), 1);
    assert_eq!(observations.tcp_connect.len(), 1);
    assert_eq!(observations.tcp_connect[0].port, address.port());
    assert!(observations.tcp_connect[0].status.success);

    assert_eq!(observations.requests.len(), 1);
    let request = &observations.requests[0];
    assert_eq!(request.network, "tcp");
    assert_eq!(request.address, address.to_string());
    assert!(request.failure.is_none());
    assert_eq!(request.request.method, "GET");
    assert!(request.request.url.starts_with("http://localhost"));
    let response = request.response.as_ref().unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(response.body, "it works");
    assert!(!response.body_is_truncated);

    // The request reuses the connect trace.
    assert_eq!(request.transaction_id, observations.tcp_connect[0].transaction_id);

    let operations: Vec<&str> = observations
        .network_events
        .iter()
        .map(|ev| ev.operation.as_str())
        .collect();
    assert!(operations.contains(&"http_transaction_start"));
    assert!(operations.contains(&"http_transaction_done"));

    assert_eq!(rtx.tracked_closers(), 0);
}

#[tokio::test]
async fn arguments_shape_the_request() {
    let address = loopback::http_server("0123456789").await;
    let arguments = json!({
        "url_path": "/robots.txt",
        "user_agent": "microprobe-test",
        "response_body_snapshot_size": 4
    });
    let func = Compiler::new()
        .compile_json(&fetch_program(address.port(), arguments))
        .unwrap();
    let report = evaluate(func.as_ref(), &Context::new(), &Runtime::default()).await;
    assert!(report.is_ok(), "{:?}", report.exception);

    let request = &report.observations.requests[0];
    assert_eq!(request.request.method, "GET");
    assert!(request.request.url.ends_with("/robots.txt"));
    let response = request.response.as_ref().unwrap();
    assert_eq!(response.body, "0123");
    assert!(response.body_is_truncated);
    assert!(
        request
            .request
            .headers
            .iter()
            .any(|(name, value)| {
                name.eq_ignore_ascii_case("user-agent") && value == "microprobe-test"
            })
    );
}

fn https_program(port: u16, handshake: serde_json::Value) -> String {
    json!({"func": "compose", "children": [
        {"func": "domain_name", "arguments": {"domain": "localhost"}},
        {"func": "dns_lookup_static", "arguments": {"addresses": ["127.0.0.1"]}},
        {"func": "make_endpoints_for_port", "arguments": {"port": port}},
        {"func": "new_endpoint_pipeline", "children": [
            {"func": "tcp_connect"},
            {"func": "tls_handshake", "arguments": handshake},
            {"func": "http_transaction"},
            {"func": "discard"}
        ]}
    ]})
    .to_string()
}

#[tokio::test]
async fn default_alpn_fetches_from_h2_capable_server() {
    let (address, mut received) = loopback::https_server(&["h2", "http/1.1"], "secure").await;
    let func = Compiler::new()
        .compile_json(&https_program(address.port(), json!({"skip_verify": true})))
        .unwrap();
    let report = evaluate(func.as_ref(), &Context::new(), &Runtime::default()).await;
    assert!(report.is_ok(), "{:?}", report.exception);

    let handshake = &report.observations.tls_handshakes[0];
    assert!(handshake.failure.is_none(), "{:?}", handshake.failure);
    assert_eq!(handshake.negotiated_protocol, "http/1.1");

    let request = &report.observations.requests[0];
    assert!(request.failure.is_none(), "{:?}", request.failure);
    assert_eq!(request.alpn, "http/1.1");
    assert!(request.request.url.starts_with("https://localhost"));
    let response = request.response.as_ref().unwrap();
    assert_eq!(response.code, 200);
    assert_eq!(response.body, "secure");

    let (protocol, head) = received.recv().await.unwrap();
    assert_eq!(protocol, "http/1.1");
    assert!(head.starts_with(b"GET / HTTP/1.1\r\nHost: localhost\r\n"));
}

#[tokio::test]
async fn negotiated_h2_is_an_error_without_writing() {
    let (address, mut received) = loopback::https_server(&["h2", "http/1.1"], "secure").await;
    let handshake = json!({"alpn": ["h2"], "skip_verify": true});
    let func = Compiler::new()
        .compile_json(&https_program(address.port(), handshake))
        .unwrap();
    let rtx = Runtime::default();
    let report = evaluate(func.as_ref(), &Context::new(), &rtx).await;

    // The failure stays inside its branch.
    assert!(report.is_ok(), "{:?}", report.exception);
    assert_eq!(report.observations.tls_handshakes[0].negotiated_protocol, "h2");

    let request = &report.observations.requests[0];
    assert_eq!(request.alpn, "h2");
    let failure = request.failure.as_deref().unwrap();
    assert!(failure.contains("unsupported negotiated protocol"), "{failure}");
    assert!(request.response.is_none());

    // The connection closed without a single HTTP/1.1 byte on it.
    let (protocol, bytes) = received.recv().await.unwrap();
    assert_eq!(protocol, "h2");
    assert!(bytes.is_empty(), "{}", String::from_utf8_lossy(&bytes));
    assert_eq!(rtx.tracked_closers(), 0);
}

#[tokio::test]
async fn refused_connection_skips_the_request() {
    let port = loopback::closed_tcp_port().await;
    let func = Compiler::new()
        .compile_json(&fetch_program(port, json!({})))
        .unwrap();
    let report = evaluate(func.as_ref(), &Context::new(), &Runtime::default()).await;

    // Errors stay inside their branch.
    assert!(report.is_ok());
    assert_eq!(
        report.observations.tcp_connect[0].status.failure.as_deref(),
        Some("connection_refused")
    );
    assert!(report.observations.requests.is_empty());
}

#[test]
fn invalid_arguments_are_rejected_at_compile_time() {
    let err = Compiler::new()
        .compile_json(&fetch_program(80, json!({"url_scheme": "gopher"})))
        .err()
        .expect("invalid scheme");
    assert!(err.to_string().contains("http_transaction"));
}
