use microprobe::compiler::Compiler;
use microprobe::dsl::{self, FuncNode};
use microprobe::engine::{Context, Func, Runtime, Value};
use microprobe::types::{DNS_LOOKUP_OUTPUT, LIST_OF_ENDPOINT, TCP_CONNECTION};

fn pipeline_with(filter: FuncNode) -> FuncNode {
    dsl::compose(vec![
        dsl::dns_lookup_static(&["8.8.8.8"]).unwrap(),
        dsl::make_endpoints_for_port(443),
        dsl::new_endpoint_pipeline(vec![
            dsl::tcp_connect(),
            filter,
            dsl::discard(TCP_CONNECTION.into()),
        ])
        .unwrap(),
    ])
    .unwrap()
}

fn analysis() -> FuncNode {
    // A filter that newer probes implement and this one does not.
    FuncNode::new(
        "nonexistent_analysis",
        TCP_CONNECTION.into(),
        TCP_CONNECTION.into(),
    )
}

#[test]
fn unknown_wrapped_operation_compiles() {
    let wrapped = pipeline_with(dsl::if_func_exists(analysis()).unwrap());
    let raw = dsl::export_ast_node(&wrapped).to_json();
    assert!(raw.contains("nonexistent_analysis"));
    assert!(Compiler::new().compile_json(&raw).is_ok());
}

#[test]
fn unknown_bare_operation_is_rejected() {
    let bare = pipeline_with(analysis());
    let err = Compiler::new()
        .compile(&dsl::export_ast_node(&bare))
        .err()
        .expect("unknown operation");
    assert!(err.to_string().contains("nonexistent_analysis"));
}

#[tokio::test]
async fn known_wrapped_operation_behaves_like_itself() {
    let compiler = Compiler::new();
    let wrapped = dsl::if_func_exists(FuncNode::new(
        "discard",
        LIST_OF_ENDPOINT.into(),
        LIST_OF_ENDPOINT.into(),
    ))
    .unwrap();
    let f = compiler.compile(&dsl::export_ast_node(&wrapped)).unwrap();
    let out = f
        .apply(&Context::new(), &Runtime::default(), Value::Endpoints(vec![]))
        .await;
    // `discard` ran, so the endpoints became Void.
    assert!(matches!(out, Value::Void));
}

#[tokio::test]
async fn unknown_wrapped_operation_is_identity() {
    let wrapped = dsl::if_func_exists(FuncNode::new(
        "nonexistent_op",
        DNS_LOOKUP_OUTPUT.into(),
        DNS_LOOKUP_OUTPUT.into(),
    ))
    .unwrap();
    let f = Compiler::new()
        .compile(&dsl::export_ast_node(&wrapped))
        .unwrap();
    let ctx = Context::new();
    let rtx = Runtime::default();
    for input in [Value::Void, Value::Endpoints(vec![]), Value::Skip] {
        let category = input.simple_type();
        let out = f.apply(&ctx, &rtx, input).await;
        assert_eq!(out.simple_type(), category);
    }
}
