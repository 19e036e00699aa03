//! Constructors for the built-in operations.

use super::{FuncNode, type_check_funcs};
use crate::compiler::arguments::{
    DnsLookupStaticArguments, DnsLookupUdpArguments, DomainNameArguments, HandshakeArguments,
    HttpTransactionArguments,
};
use crate::engine::validate::{parse_domain, parse_endpoint, parse_ip_addrs};
use crate::error::BuildError;
use crate::types::{
    DNS_LOOKUP_INPUT, DNS_LOOKUP_OUTPUT, ENDPOINT, HTTP_RESPONSE, LIST_OF_ENDPOINT,
    QUIC_CONNECTION, SimpleType, TCP_CONNECTION, TLS_CONNECTION, Type, VOID,
};

// ── composition ──────────────────────────────────────────────────

/// Applies `funcs` in sequence. Each node's main output type must equal the
/// next node's main input type.
pub fn compose(funcs: Vec<FuncNode>) -> Result<FuncNode, BuildError> {
    let (Some(first), Some(last)) = (funcs.first(), funcs.last()) else {
        return Err(BuildError::EmptyComposition("compose"));
    };
    for pair in funcs.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.output_type.main() != next.input_type.main() {
            return Err(BuildError::TypeMismatch {
                context: format!("compose: {} after {}", next.name, prev.name),
                expected: prev.output_type.main().to_string(),
                found: next.input_type.main().to_string(),
            });
        }
    }
    let (input_type, output_type) = (first.input_type.clone(), last.output_type.clone());
    Ok(FuncNode::new("compose", input_type, output_type).with_children(funcs))
}

/// Converts any value of type `t` into `Void`.
pub fn discard(t: Type) -> FuncNode {
    FuncNode {
        arguments: serde_json::json!({}),
        ..FuncNode::new("discard", t, VOID.into())
    }
}

/// Wraps an operation that older probes may not know. The compiler replaces
/// it with a pass-through when the operation is missing, so it must be a
/// filter: same main input and output type.
pub fn if_func_exists(f: FuncNode) -> Result<FuncNode, BuildError> {
    if f.input_type.main() != f.output_type.main() {
        return Err(BuildError::NotAFilter {
            name: f.name,
            input: f.input_type.main().to_string(),
            output: f.output_type.main().to_string(),
        });
    }
    let (input_type, output_type) = (f.input_type.clone(), f.output_type.clone());
    Ok(FuncNode::new("if_func_exists", input_type, output_type).with_children(vec![f]))
}

// ── DNS ──────────────────────────────────────────────────────────

/// `Void -> DNSLookupInput` for `domain`.
pub fn domain_name(domain: &str) -> Result<FuncNode, BuildError> {
    let domain = parse_domain(domain).map_err(BuildError::InvalidArgument)?;
    FuncNode::new("domain_name", VOID.into(), DNS_LOOKUP_INPUT.into())
        .with_arguments(&DomainNameArguments { domain })
}

/// Resolves with the system resolver.
pub fn dns_lookup_getaddrinfo() -> FuncNode {
    FuncNode::new(
        "dns_lookup_getaddrinfo",
        DNS_LOOKUP_INPUT.into(),
        DNS_LOOKUP_OUTPUT.into(),
    )
}

/// Resolves every domain to the given IP addresses.
pub fn dns_lookup_static(addresses: &[&str]) -> Result<FuncNode, BuildError> {
    parse_ip_addrs(addresses).map_err(BuildError::InvalidArgument)?;
    FuncNode::new(
        "dns_lookup_static",
        DNS_LOOKUP_INPUT.into(),
        DNS_LOOKUP_OUTPUT.into(),
    )
    .with_arguments(&DnsLookupStaticArguments {
        addresses: addresses.iter().map(ToString::to_string).collect(),
    })
}

/// Resolves through the UDP resolver at `endpoint` (`ADDR:PORT` or
/// `[ADDR]:PORT`).
pub fn dns_lookup_udp(endpoint: &str) -> Result<FuncNode, BuildError> {
    parse_endpoint(endpoint).map_err(BuildError::InvalidArgument)?;
    FuncNode::new(
        "dns_lookup_udp",
        DNS_LOOKUP_INPUT.into(),
        DNS_LOOKUP_OUTPUT.into(),
    )
    .with_arguments(&DnsLookupUdpArguments {
        endpoint: endpoint.to_string(),
    })
}

/// Runs several resolvers at once and merges their addresses.
pub fn dns_lookup_parallel(funcs: Vec<FuncNode>) -> Result<FuncNode, BuildError> {
    let (input, output): (Type, Type) = (DNS_LOOKUP_INPUT.into(), DNS_LOOKUP_OUTPUT.into());
    type_check_funcs("dns_lookup_parallel", &input, &output, &funcs)?;
    Ok(FuncNode::new("dns_lookup_parallel", input, output).with_children(funcs))
}

// ── endpoints ────────────────────────────────────────────────────

/// `DNSLookupOutput -> []Endpoint` on `port`.
pub fn make_endpoints_for_port(port: u16) -> FuncNode {
    FuncNode {
        arguments: serde_json::json!({ "port": port }),
        ..FuncNode::new(
            "make_endpoints_for_port",
            DNS_LOOKUP_OUTPUT.into(),
            LIST_OF_ENDPOINT.into(),
        )
    }
}

/// Composes `funcs` and runs the result over every endpoint of the input
/// list. The composition must be `Endpoint -> Void`.
pub fn new_endpoint_pipeline(funcs: Vec<FuncNode>) -> Result<FuncNode, BuildError> {
    let composed = compose(funcs)?;
    type_check_funcs(
        "new_endpoint_pipeline",
        &ENDPOINT.into(),
        &VOID.into(),
        std::slice::from_ref(&composed),
    )?;
    Ok(FuncNode {
        arguments: serde_json::json!({}),
        ..FuncNode::new(
            "new_endpoint_pipeline",
            LIST_OF_ENDPOINT.into(),
            VOID.into(),
        )
    }
    .with_children(composed.children))
}

// ── fan-out ──────────────────────────────────────────────────────

/// Runs `Void -> Void` measurements at once.
pub fn measure_multiple_domains(funcs: Vec<FuncNode>) -> Result<FuncNode, BuildError> {
    type_check_funcs(
        "measure_multiple_domains",
        &VOID.into(),
        &VOID.into(),
        &funcs,
    )?;
    Ok(FuncNode::new("measure_multiple_domains", VOID.into(), VOID.into()).with_children(funcs))
}

/// Runs `DNSLookupOutput -> Void` measurements at once over the same
/// lookup result.
pub fn measure_multiple_endpoints(funcs: Vec<FuncNode>) -> Result<FuncNode, BuildError> {
    let input: Type = DNS_LOOKUP_OUTPUT.into();
    type_check_funcs("measure_multiple_endpoints", &input, &VOID.into(), &funcs)?;
    Ok(FuncNode::new("measure_multiple_endpoints", input, VOID.into()).with_children(funcs))
}

// ── transports ───────────────────────────────────────────────────

/// `Endpoint -> TCPConnection`.
pub fn tcp_connect() -> FuncNode {
    FuncNode::new("tcp_connect", ENDPOINT.into(), TCP_CONNECTION.into())
}

/// `TCPConnection -> TLSConnection`.
pub fn tls_handshake(arguments: HandshakeArguments) -> Result<FuncNode, BuildError> {
    FuncNode::new("tls_handshake", TCP_CONNECTION.into(), TLS_CONNECTION.into())
        .with_arguments(&arguments)
}

/// `Endpoint -> QUICConnection`.
pub fn quic_handshake(arguments: HandshakeArguments) -> Result<FuncNode, BuildError> {
    FuncNode::new("quic_handshake", ENDPOINT.into(), QUIC_CONNECTION.into())
        .with_arguments(&arguments)
}

/// `connection -> HTTPResponse`, where `connection` is the connection type
/// produced by the previous step.
pub fn http_transaction(
    connection: SimpleType,
    arguments: HttpTransactionArguments,
) -> Result<FuncNode, BuildError> {
    if ![TCP_CONNECTION, TLS_CONNECTION, QUIC_CONNECTION].contains(&connection) {
        return Err(BuildError::InvalidArgument(format!(
            "http_transaction: cannot run over {connection}"
        )));
    }
    arguments
        .clone()
        .validate("http_transaction")
        .map_err(|e| BuildError::InvalidArgument(e.to_string()))?;
    FuncNode::new("http_transaction", connection.into(), HTTP_RESPONSE.into())
        .with_arguments(&arguments)
}
