use microprobe::ast::AstNode;
use microprobe::compiler::arguments::{HandshakeArguments, HttpTransactionArguments};
use microprobe::dsl;
use microprobe::error::BuildError;
use microprobe::types::{HTTP_RESPONSE, QUIC_CONNECTION, TCP_CONNECTION, TLS_CONNECTION};

/// Resolves `domain` with getaddrinfo and 8.8.8.8, then fetches `/` over
/// HTTP, HTTPS and HTTP/3 from every address.
pub fn example_program(domain: &str) -> Result<AstNode, BuildError> {
    let program = dsl::compose(vec![
        dsl::domain_name(domain)?,
        dsl::dns_lookup_parallel(vec![
            dsl::dns_lookup_getaddrinfo(),
            dsl::dns_lookup_udp("8.8.8.8:53")?,
        ])?,
        dsl::measure_multiple_endpoints(vec![
            dsl::compose(vec![
                dsl::make_endpoints_for_port(80),
                dsl::new_endpoint_pipeline(vec![
                    dsl::tcp_connect(),
                    dsl::http_transaction(TCP_CONNECTION, HttpTransactionArguments::default())?,
                    dsl::discard(HTTP_RESPONSE.into()),
                ])?,
            ])?,
            dsl::compose(vec![
                dsl::make_endpoints_for_port(443),
                dsl::new_endpoint_pipeline(vec![
                    dsl::tcp_connect(),
                    dsl::tls_handshake(HandshakeArguments::default())?,
                    dsl::http_transaction(TLS_CONNECTION, HttpTransactionArguments::default())?,
                    dsl::discard(HTTP_RESPONSE.into()),
                ])?,
            ])?,
            dsl::compose(vec![
                dsl::make_endpoints_for_port(443),
                dsl::new_endpoint_pipeline(vec![
                    dsl::quic_handshake(HandshakeArguments::default())?,
                    dsl::http_transaction(QUIC_CONNECTION, HttpTransactionArguments::default())?,
                    dsl::discard(HTTP_RESPONSE.into()),
                ])?,
            ])?,
        ])?,
    ])?;
    Ok(dsl::export_ast_node(&program))
}
