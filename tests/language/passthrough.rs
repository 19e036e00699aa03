use microprobe::compiler::Compiler;
use microprobe::engine::{Context, Exception, Failure, Func, FuncRef, Runtime, Value};
use serde_json::json;

fn compile(program: &serde_json::Value) -> FuncRef {
    Compiler::new()
        .compile_json(&program.to_string())
        .expect("program compiles")
}

fn programs() -> Vec<serde_json::Value> {
    vec![
        json!({"func": "compose"}),
        json!({"func": "discard"}),
        json!({"func": "tcp_connect"}),
        json!({"func": "compose", "children": [
            {"func": "tcp_connect"},
            {"func": "tls_handshake", "arguments": {"sni": "example.com"}},
            {"func": "http_transaction"},
            {"func": "discard"}
        ]}),
        json!({"func": "compose", "children": [
            {"func": "domain_name", "arguments": {"domain": "example.com"}},
            {"func": "dns_lookup_parallel", "children": [
                {"func": "dns_lookup_static", "arguments": {"addresses": ["192.0.2.1"]}}
            ]},
            {"func": "measure_multiple_endpoints", "children": [
                {"func": "compose", "children": [
                    {"func": "make_endpoints_for_port", "arguments": {"port": 443}},
                    {"func": "new_endpoint_pipeline", "children": [
                        {"func": "quic_handshake"},
                        {"func": "discard"}
                    ]}
                ]}
            ]}
        ]}),
        json!({"func": "measure_multiple_domains", "children": [{"func": "discard"}]}),
        json!({"func": "if_func_exists", "children": [{"func": "nonexistent_op"}]}),
    ]
}

#[tokio::test]
async fn sentinels_pass_through_every_sequence() {
    let ctx = Context::new();
    let rtx = Runtime::default();
    let failure = Failure::new("tcp_connect", "connection_refused");
    let exception = Exception::new("tls_handshake: bad roots");

    for program in programs() {
        let f = compile(&program);

        let out = f.apply(&ctx, &rtx, Value::Error(failure.clone())).await;
        assert_eq!(out.as_error(), Some(&failure), "error through {program}");

        let out = f.apply(&ctx, &rtx, Value::Exception(exception.clone())).await;
        assert_eq!(out.as_exception(), Some(&exception), "exception through {program}");

        let out = f.apply(&ctx, &rtx, Value::Skip).await;
        assert!(matches!(out, Value::Skip), "skip through {program}");
    }

    // Nothing ran, so nothing was observed or opened.
    assert!(rtx.extract_observations().is_empty());
    assert_eq!(rtx.tracked_closers(), 0);
}

#[tokio::test]
async fn empty_composition_is_identity() {
    let ctx = Context::new();
    let rtx = Runtime::default();
    let f = compile(&json!({"func": "compose", "children": []}));

    assert!(matches!(f.apply(&ctx, &rtx, Value::Void).await, Value::Void));
    let Value::Endpoints(endpoints) = f.apply(&ctx, &rtx, Value::Endpoints(vec![])).await else {
        panic!("expected endpoints");
    };
    assert!(endpoints.is_empty());
}

#[tokio::test]
async fn discard_turns_values_into_void() {
    let ctx = Context::new();
    let rtx = Runtime::default();
    let f = compile(&json!({"func": "compose", "children": [
        {"func": "domain_name", "arguments": {"domain": "example.com"}},
        {"func": "discard"}
    ]}));
    assert!(matches!(f.apply(&ctx, &rtx, Value::Void).await, Value::Void));
}

#[tokio::test]
async fn unexpected_category_is_an_exception() {
    let ctx = Context::new();
    let rtx = Runtime::default();
    let f = compile(&json!({"func": "tls_handshake"}));
    let out = f.apply(&ctx, &rtx, Value::Void).await;
    assert_eq!(
        out.as_exception().map(|e| e.reason.as_str()),
        Some("tls_handshake: unexpected *Void type")
    );
}
