use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use microprobe::ast::AstNode;
use microprobe::compiler::{Compiler, FuncTemplate};
use microprobe::engine::{Context, Endpoint, Func, FuncRef, Runtime, Value};
use microprobe::error::CompileError;
use microprobe::report::evaluate;
use serde_json::json;

use crate::loopback;

/// Counts failed connects and swallows them.
struct CountErrors {
    errors: Arc<AtomicUsize>,
}

#[async_trait]
impl Func for CountErrors {
    async fn apply(&self, _ctx: &Context, _rtx: &Runtime, input: Value) -> Value {
        match input {
            Value::Error(_) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                Value::Skip
            }
            other => other,
        }
    }
}

struct CountErrorsTemplate {
    errors: Arc<AtomicUsize>,
}

impl FuncTemplate for CountErrorsTemplate {
    fn name(&self) -> &str {
        "count_errors"
    }

    fn compile(&self, _compiler: &Compiler, node: &AstNode) -> Result<FuncRef, CompileError> {
        node.require_children(0)?;
        Ok(Arc::new(CountErrors {
            errors: self.errors.clone(),
        }))
    }
}

fn count_errors_template(errors: &Arc<AtomicUsize>) -> Box<dyn FuncTemplate> {
    Box::new(CountErrorsTemplate {
        errors: errors.clone(),
    })
}

#[tokio::test]
async fn custom_operation_consumes_errors() {
    let port = loopback::closed_tcp_port().await;
    let errors = Arc::new(AtomicUsize::new(0));

    let mut compiler = Compiler::new();
    let counter = errors.clone();
    compiler.register_fn("count_errors", move |_, node| {
        node.require_children(0)?;
        let func: Arc<dyn Func> = Arc::new(CountErrors {
            errors: counter.clone(),
        });
        Ok(func)
    });
    assert!(compiler.template_exists("count_errors"));

    let program = json!({"func": "compose", "children": [
        {"func": "domain_name", "arguments": {"domain": "localhost"}},
        {"func": "dns_lookup_static", "arguments": {"addresses": ["127.0.0.1"]}},
        {"func": "make_endpoints_for_port", "arguments": {"port": port}},
        {"func": "new_endpoint_pipeline", "children": [
            {"func": "tcp_connect"},
            {"func": "count_errors"},
            {"func": "discard"}
        ]}
    ]});
    let func = compiler.compile_json(&program.to_string()).unwrap();
    let rtx = Runtime::default();
    let report = evaluate(func.as_ref(), &Context::new(), &rtx).await;

    assert!(report.is_ok());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    let connect = &report.observations.tcp_connect[0];
    assert!(!connect.status.success);
    assert_eq!(connect.status.failure.as_deref(), Some("connection_refused"));
}

#[tokio::test]
async fn skip_is_a_valid_final_value() {
    let port = loopback::closed_tcp_port().await;
    let errors = Arc::new(AtomicUsize::new(0));
    let mut compiler = Compiler::new();
    compiler.register(count_errors_template(&errors));

    let program = json!({"func": "compose", "children": [
        {"func": "tcp_connect"},
        {"func": "count_errors"}
    ]});
    let func = compiler.compile_json(&program.to_string()).unwrap();
    let endpoint = Value::Endpoint(Endpoint {
        address: SocketAddr::from(([127, 0, 0, 1], port)),
        domain: "localhost".into(),
    });
    let out = func.apply(&Context::new(), &Runtime::default(), endpoint).await;
    assert!(matches!(out, Value::Skip));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_compiler_only_knows_registered_operations() {
    let errors = Arc::new(AtomicUsize::new(0));
    let mut compiler = Compiler::empty();
    compiler.register(count_errors_template(&errors));
    assert_eq!(compiler.template_names(), vec!["count_errors"]);
    assert!(compiler.compile_json(r#"{"func": "tcp_connect"}"#).is_err());
}
