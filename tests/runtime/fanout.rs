use std::net::IpAddr;

use async_trait::async_trait;
use microprobe::compiler::Compiler;
use microprobe::engine::{
    Context, DnsLookupInput, DnsLookupOutput, Endpoint, Exception, Failure, Func, FuncError,
    Runtime, TypedFunc, Value, Void, adapt,
};
use serde_json::json;

fn lookup(domain: &str) -> Value {
    Value::DnsLookupInput(DnsLookupInput {
        domain: domain.into(),
    })
}

/// A resolver that always fails with `dns_nxdomain_error`.
struct Nxdomain;

#[async_trait]
impl TypedFunc for Nxdomain {
    type Input = DnsLookupInput;
    type Output = DnsLookupOutput;

    fn name(&self) -> &'static str {
        "nxdomain"
    }

    async fn call(
        &self,
        _ctx: &Context,
        _rtx: &Runtime,
        _input: DnsLookupInput,
    ) -> Result<DnsLookupOutput, FuncError> {
        Err(Failure::new(self.name(), "dns_nxdomain_error").into())
    }
}

/// Aborts the branch for one port and lets every other port through.
struct RejectPort(u16);

#[async_trait]
impl TypedFunc for RejectPort {
    type Input = Endpoint;
    type Output = Void;

    fn name(&self) -> &'static str {
        "reject_port"
    }

    async fn call(
        &self,
        _ctx: &Context,
        _rtx: &Runtime,
        input: Endpoint,
    ) -> Result<Void, FuncError> {
        if input.address.port() == self.0 {
            return Err(Exception::new(format!("reject_port: {}", input.address)).into());
        }
        Ok(Void)
    }
}

fn compiler() -> Compiler {
    let mut compiler = Compiler::new();
    compiler.register_fn("nxdomain", |_, _| Ok(adapt(Nxdomain)));
    compiler.register_fn("reject_port", |_, node| {
        let port = node.arguments["port"].as_u64().unwrap_or(0);
        Ok(adapt(RejectPort(u16::try_from(port).unwrap_or(0))))
    });
    compiler
}

#[tokio::test]
async fn parallel_lookup_merges_addresses() {
    let program = json!({"func": "dns_lookup_parallel", "children": [
        {"func": "dns_lookup_static", "arguments": {"addresses": ["1.2.3.4"]}},
        {"func": "dns_lookup_static", "arguments": {"addresses": ["5.6.7.8", "1.2.3.4"]}},
        {"func": "nxdomain"}
    ]});
    let func = compiler().compile_json(&program.to_string()).unwrap();
    let rtx = Runtime::default();
    let out = func.apply(&Context::new(), &rtx, lookup("example.com")).await;

    let Value::DnsLookupOutput(output) = out else {
        panic!("expected a lookup output, got {out:?}");
    };
    assert_eq!(output.domain, "example.com");
    let mut addresses = output.addresses;
    addresses.sort();
    let expected: Vec<IpAddr> = vec!["1.2.3.4".parse().unwrap(), "5.6.7.8".parse().unwrap()];
    assert_eq!(addresses, expected);

    let queries: usize = rtx
        .extract_observations()
        .iter()
        .map(|obs| obs.queries.len())
        .sum();
    assert_eq!(queries, 2);
}

#[tokio::test]
async fn parallel_lookup_with_only_failures_is_empty_success() {
    let program = json!({"func": "dns_lookup_parallel", "children": [
        {"func": "nxdomain"},
        {"func": "nxdomain"}
    ]});
    let func = compiler().compile_json(&program.to_string()).unwrap();
    let out = func
        .apply(&Context::new(), &Runtime::default(), lookup("nx.example"))
        .await;
    let Value::DnsLookupOutput(output) = out else {
        panic!("expected a lookup output, got {out:?}");
    };
    assert!(output.addresses.is_empty());
}

#[tokio::test]
async fn one_failing_branch_fails_the_pipeline() {
    let program = json!({"func": "compose", "children": [
        {"func": "dns_lookup_static", "arguments": {"addresses": ["192.0.2.1"]}},
        {"func": "measure_multiple_endpoints", "children": [
            {"func": "compose", "children": [
                {"func": "make_endpoints_for_port", "arguments": {"port": 80}},
                {"func": "new_endpoint_pipeline", "children": [
                    {"func": "reject_port", "arguments": {"port": 443}}
                ]}
            ]},
            {"func": "compose", "children": [
                {"func": "make_endpoints_for_port", "arguments": {"port": 443}},
                {"func": "new_endpoint_pipeline", "children": [
                    {"func": "reject_port", "arguments": {"port": 443}}
                ]}
            ]}
        ]}
    ]});
    let func = compiler().compile_json(&program.to_string()).unwrap();
    let rtx = Runtime::default();
    let out = func.apply(&Context::new(), &rtx, lookup("example.com")).await;
    assert_eq!(
        out.as_exception().map(|e| e.reason.as_str()),
        Some("reject_port: 192.0.2.1:443")
    );

    // Observations stay available after the exception, once.
    assert_eq!(rtx.extract_observations().len(), 1);
    assert!(rtx.extract_observations().is_empty());
}

#[tokio::test]
async fn branches_without_exceptions_reduce_to_void() {
    let program = json!({"func": "measure_multiple_domains", "children": [
        {"func": "compose", "children": [
            {"func": "domain_name", "arguments": {"domain": "a.example"}},
            {"func": "nxdomain"},
            {"func": "discard"}
        ]},
        {"func": "compose", "children": [
            {"func": "domain_name", "arguments": {"domain": "b.example"}},
            {"func": "dns_lookup_static", "arguments": {"addresses": ["192.0.2.2"]}},
            {"func": "discard"}
        ]}
    ]});
    let func = compiler().compile_json(&program.to_string()).unwrap();
    let rtx = Runtime::default();
    let out = func.apply(&Context::new(), &rtx, Value::Void).await;
    assert!(matches!(out, Value::Void));
}
