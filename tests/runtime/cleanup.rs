use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use microprobe::compiler::Compiler;
use microprobe::engine::{
    Context, DnsLookupInput, Exception, Func, FuncError, Runtime, TypedFunc, Value, adapt,
};
use microprobe::probes::TcpConnection;
use microprobe::report::evaluate;
use serde_json::json;

use crate::loopback;

/// Keeps a handle on every connection it sees, then aborts the branch.
struct Explode {
    seen: Arc<Mutex<Vec<TcpConnection>>>,
}

#[async_trait]
impl TypedFunc for Explode {
    type Input = TcpConnection;
    type Output = TcpConnection;

    fn name(&self) -> &'static str {
        "explode"
    }

    async fn call(
        &self,
        _ctx: &Context,
        _rtx: &Runtime,
        input: TcpConnection,
    ) -> Result<TcpConnection, FuncError> {
        self.seen.lock().unwrap().push(input);
        Err(Exception::new("explode: on purpose").into())
    }
}

fn compiler_with_explode(seen: &Arc<Mutex<Vec<TcpConnection>>>) -> Compiler {
    let mut compiler = Compiler::new();
    let seen = seen.clone();
    compiler.register_fn("explode", move |_, _| {
        Ok(adapt(Explode { seen: seen.clone() }))
    });
    compiler
}

#[tokio::test]
async fn connections_outlive_exceptions_until_close() {
    let (address, mut eof) = loopback::sink_server().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let program = json!({"func": "compose", "children": [
        {"func": "dns_lookup_static", "arguments": {"addresses": ["127.0.0.1"]}},
        {"func": "make_endpoints_for_port", "arguments": {"port": address.port()}},
        {"func": "new_endpoint_pipeline", "children": [
            {"func": "tcp_connect"},
            {"func": "explode"},
            {"func": "discard"}
        ]}
    ]});
    let func = compiler_with_explode(&seen)
        .compile_json(&program.to_string())
        .unwrap();

    let ctx = Context::new();
    let rtx = Runtime::default();
    let input = Value::DnsLookupInput(DnsLookupInput {
        domain: "localhost".into(),
    });
    let out = func.apply(&ctx, &rtx, input).await;
    assert_eq!(
        out.as_exception().map(|e| e.reason.as_str()),
        Some("explode: on purpose")
    );

    let conns = seen.lock().unwrap().clone();
    assert_eq!(conns.len(), 1);
    assert!(conns[0].is_open());
    assert_eq!(rtx.tracked_closers(), 1);
    assert!(eof.try_recv().is_err(), "server saw EOF before close");

    rtx.close();
    assert!(!conns[0].is_open());
    assert_eq!(rtx.tracked_closers(), 0);
    rtx.close();

    let read = tokio::time::timeout(Duration::from_secs(5), eof.recv())
        .await
        .unwrap();
    assert_eq!(read, Some(0));
}

#[tokio::test]
async fn evaluate_reports_the_exception_and_closes() {
    let (address, mut eof) = loopback::sink_server().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let program = json!({"func": "compose", "children": [
        {"func": "domain_name", "arguments": {"domain": "localhost"}},
        {"func": "dns_lookup_static", "arguments": {"addresses": ["127.0.0.1"]}},
        {"func": "make_endpoints_for_port", "arguments": {"port": address.port()}},
        {"func": "new_endpoint_pipeline", "children": [
            {"func": "tcp_connect"},
            {"func": "explode"},
            {"func": "discard"}
        ]}
    ]});
    let func = compiler_with_explode(&seen)
        .compile_json(&program.to_string())
        .unwrap();

    let rtx = Runtime::default();
    let report = evaluate(func.as_ref(), &Context::new(), &rtx).await;
    assert!(!report.is_ok());
    assert_eq!(report.exception.as_deref(), Some("explode: on purpose"));
    assert_eq!(report.observations.tcp_connect.len(), 1);

    assert!(!seen.lock().unwrap()[0].is_open());
    let read = tokio::time::timeout(Duration::from_secs(5), eof.recv())
        .await
        .unwrap();
    assert_eq!(read, Some(0));
}
