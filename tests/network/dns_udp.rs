use std::net::IpAddr;

use microprobe::compiler::Compiler;
use microprobe::engine::{Context, DnsLookupInput, Func, Observations, Runtime, Value};
use serde_json::json;

use crate::loopback;

fn lookup(domain: &str) -> Value {
    Value::DnsLookupInput(DnsLookupInput {
        domain: domain.into(),
    })
}

fn udp_resolver(endpoint: std::net::SocketAddr) -> microprobe::engine::FuncRef {
    let arguments = json!({"endpoint": endpoint.to_string()});
    let program = json!({"func": "dns_lookup_udp", "arguments": arguments});
    Compiler::new().compile_json(&program.to_string()).unwrap()
}

#[tokio::test]
async fn resolves_a_and_aaaa() {
    let v4: IpAddr = "192.0.2.10".parse().unwrap();
    let v6: IpAddr = "2001:db8::10".parse().unwrap();
    let (endpoint, server) = loopback::dns_server(vec![v4], vec![v6]).await;

    let rtx = Runtime::default();
    let out = udp_resolver(endpoint)
        .apply(&Context::new(), &rtx, lookup("www.example.com"))
        .await;
    let Value::DnsLookupOutput(output) = out else {
        panic!("expected a lookup output, got {out:?}");
    };
    assert_eq!(output.domain, "www.example.com");
    assert!(output.addresses.contains(&v4));
    assert!(output.addresses.contains(&v6));

    let observations = Observations::reduce(rtx.extract_observations());
    assert_eq!(observations.queries.len(), 2);
    let mut types: Vec<&str> = observations
        .queries
        .iter()
        .map(|q| q.query_type.as_str())
        .collect();
    types.sort_unstable();
    assert_eq!(types, ["A", "AAAA"]);
    for query in &observations.queries {
        assert_eq!(query.engine, "udp");
        assert_eq!(query.resolver_address, endpoint.to_string());
        assert_eq!(query.hostname, "www.example.com");
        assert!(query.failure.is_none());
        assert_eq!(query.answers.len(), 1);
        assert_eq!(query.answers[0].ttl, Some(300));
    }
    // Both queries belong to the same lookup.
    assert_eq!(
        observations.queries[0].transaction_id,
        observations.queries[1].transaction_id
    );
    server.abort();
}

#[tokio::test]
async fn missing_aaaa_is_recorded_but_not_fatal() {
    let v4: IpAddr = "192.0.2.11".parse().unwrap();
    let (endpoint, server) = loopback::dns_server(vec![v4], vec![]).await;

    let rtx = Runtime::default();
    let out = udp_resolver(endpoint)
        .apply(&Context::new(), &rtx, lookup("v4only.example"))
        .await;
    let Value::DnsLookupOutput(output) = out else {
        panic!("expected a lookup output, got {out:?}");
    };
    assert_eq!(output.addresses, vec![v4]);

    let observations = Observations::reduce(rtx.extract_observations());
    let aaaa = observations
        .queries
        .iter()
        .find(|q| q.query_type == "AAAA")
        .unwrap();
    assert_eq!(aaaa.failure.as_deref(), Some("dns_no_answer"));
    server.abort();
}

#[tokio::test]
async fn no_addresses_is_an_error() {
    let (endpoint, server) = loopback::dns_server(vec![], vec![]).await;
    let out = udp_resolver(endpoint)
        .apply(&Context::new(), &Runtime::default(), lookup("empty.example"))
        .await;
    let failure = out.as_error().expect("lookup error");
    assert_eq!(failure.operation, "dns_lookup_udp");
    assert_eq!(failure.failure, "dns_no_answer");
    server.abort();
}
