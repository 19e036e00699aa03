//! Observation records collected by leaf probes.
//!
//! Field names follow the measurement archival data format so that drained
//! observations can be embedded into a report without conversion.

use serde::Serialize;

/// One I/O event or annotation (e.g. `http_transaction_start`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_bytes: Option<u64>,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    pub t0: f64,
    pub t: f64,
    pub transaction_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsAnswer {
    pub answer_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    pub ttl: Option<u32>,
}

/// One DNS lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsLookupResult {
    pub answers: Vec<DnsAnswer>,
    pub engine: String,
    pub failure: Option<String>,
    pub hostname: String,
    pub query_type: String,
    pub resolver_address: String,
    pub t0: f64,
    pub t: f64,
    pub transaction_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcpConnectStatus {
    pub blocked: Option<bool>,
    pub failure: Option<String>,
    pub success: bool,
}

/// One TCP connect attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcpConnectResult {
    pub ip: String,
    pub port: u16,
    pub status: TcpConnectStatus,
    pub t0: f64,
    pub t: f64,
    pub transaction_id: i64,
}

/// One TLS or QUIC handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandshakeResult {
    pub network: String,
    pub address: String,
    pub cipher_suite: String,
    pub failure: Option<String>,
    pub negotiated_protocol: String,
    pub no_tls_verify: bool,
    /// Base64-encoded DER certificates presented by the peer.
    pub peer_certificates: Vec<String>,
    pub server_name: String,
    pub t0: f64,
    pub t: f64,
    pub tls_version: String,
    pub transaction_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequestRecord {
    pub headers: Vec<(String, String)>,
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpResponseRecord {
    pub body: String,
    pub body_is_truncated: bool,
    pub code: u16,
    pub headers: Vec<(String, String)>,
}

/// One HTTP round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequestResult {
    pub network: String,
    pub address: String,
    pub alpn: String,
    pub failure: Option<String>,
    pub request: HttpRequestRecord,
    pub response: Option<HttpResponseRecord>,
    pub t0: f64,
    pub t: f64,
    pub transaction_id: i64,
}

/// Observations grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Observations {
    pub network_events: Vec<NetworkEvent>,
    pub queries: Vec<DnsLookupResult>,
    pub requests: Vec<HttpRequestResult>,
    pub tcp_connect: Vec<TcpConnectResult>,
    pub tls_handshakes: Vec<HandshakeResult>,
    pub quic_handshakes: Vec<HandshakeResult>,
}

impl Observations {
    pub fn is_empty(&self) -> bool {
        self.network_events.is_empty()
            && self.queries.is_empty()
            && self.requests.is_empty()
            && self.tcp_connect.is_empty()
            && self.tls_handshakes.is_empty()
            && self.quic_handshakes.is_empty()
    }

    /// Total number of records of any kind.
    pub fn len(&self) -> usize {
        self.network_events.len()
            + self.queries.len()
            + self.requests.len()
            + self.tcp_connect.len()
            + self.tls_handshakes.len()
            + self.quic_handshakes.len()
    }

    /// Merges several groups into one, preserving per-kind order.
    pub fn reduce<I>(inputs: I) -> Observations
    where
        I: IntoIterator<Item = Observations>,
    {
        let mut out = Observations::default();
        for input in inputs {
            out.network_events.extend(input.network_events);
            out.queries.extend(input.queries);
            out.requests.extend(input.requests);
            out.tcp_connect.extend(input.tcp_connect);
            out.tls_handshakes.extend(input.tls_handshakes);
            out.quic_handshakes.extend(input.quic_handshakes);
        }
        out
    }
}
