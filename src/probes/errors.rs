//! Maps low-level errors to the failure strings used in observations.

use std::io;

use crate::engine::ContextError;

pub const CONNECTION_REFUSED: &str = "connection_refused";
pub const CONNECTION_RESET: &str = "connection_reset";
pub const GENERIC_TIMEOUT: &str = "generic_timeout_error";
pub const HOST_UNREACHABLE: &str = "host_unreachable";
pub const NETWORK_UNREACHABLE: &str = "network_unreachable";
pub const EOF_ERROR: &str = "eof_error";
pub const INTERRUPTED: &str = "interrupted";
pub const SSL_INVALID_HOSTNAME: &str = "ssl_invalid_hostname";
pub const SSL_UNKNOWN_AUTHORITY: &str = "ssl_unknown_authority";
pub const SSL_INVALID_CERTIFICATE: &str = "ssl_invalid_certificate";
pub const SSL_FAILED_HANDSHAKE: &str = "ssl_failed_handshake";
pub const DNS_NXDOMAIN: &str = "dns_nxdomain_error";
pub const DNS_SERVER_FAILURE: &str = "dns_server_failure";
pub const DNS_NO_ANSWER: &str = "dns_no_answer";

pub fn unknown_failure(message: impl std::fmt::Display) -> String {
    format!("unknown_failure: {message}")
}

pub fn classify_context_error(err: ContextError) -> String {
    err.to_string()
}

/// Classifies an I/O error, looking through wrapped TLS errors.
pub fn classify_io_error(err: &io::Error) -> String {
    if let Some(tls) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return classify_tls_error(tls);
    }
    let failure = match err.kind() {
        io::ErrorKind::ConnectionRefused => CONNECTION_REFUSED,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => CONNECTION_RESET,
        io::ErrorKind::TimedOut => GENERIC_TIMEOUT,
        io::ErrorKind::HostUnreachable => HOST_UNREACHABLE,
        io::ErrorKind::NetworkUnreachable => NETWORK_UNREACHABLE,
        io::ErrorKind::UnexpectedEof => EOF_ERROR,
        io::ErrorKind::Interrupted => INTERRUPTED,
        _ => return unknown_failure(err),
    };
    failure.to_string()
}

/// Classifies a TLS error raised during a handshake.
pub fn classify_tls_error(err: &rustls::Error) -> String {
    use rustls::CertificateError;

    let failure = match err {
        rustls::Error::InvalidCertificate(cert) => match cert {
            CertificateError::NotValidForName => SSL_INVALID_HOSTNAME,
            CertificateError::UnknownIssuer => SSL_UNKNOWN_AUTHORITY,
            other if format!("{other:?}").starts_with("NotValidForName") => SSL_INVALID_HOSTNAME,
            _ => SSL_INVALID_CERTIFICATE,
        },
        _ => SSL_FAILED_HANDSHAKE,
    };
    failure.to_string()
}

/// Classifies a getaddrinfo failure from its message.
pub fn classify_resolver_error(err: &io::Error) -> String {
    let message = err.to_string();
    let nxdomain = [
        "not known",
        "No address associated",
        "nodename nor servname",
        "No such host",
    ];
    if nxdomain.iter().any(|needle| message.contains(needle)) {
        return DNS_NXDOMAIN.to_string();
    }
    if message.contains("Temporary failure") || message.contains("try again") {
        return DNS_SERVER_FAILURE.to_string();
    }
    classify_io_error(err)
}

/// Classifies an error establishing a QUIC connection.
pub fn classify_quic_error(err: &quinn::ConnectionError) -> String {
    use quinn::ConnectionError;

    match err {
        ConnectionError::TimedOut => GENERIC_TIMEOUT.to_string(),
        ConnectionError::Reset => CONNECTION_RESET.to_string(),
        ConnectionError::TransportError(transport) => {
            // 0x100..0x200 carries a TLS alert.
            if (0x100..0x200).contains(&u64::from(transport.code)) {
                SSL_FAILED_HANDSHAKE.to_string()
            } else {
                unknown_failure(transport)
            }
        }
        other => unknown_failure(other),
    }
}
