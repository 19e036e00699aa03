//! HTTP transaction probe: HTTP/1.1 over TCP and TLS, HTTP/3 over QUIC.

mod h1;
mod h3;

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::errors::{classify_context_error, unknown_failure};
use super::quic::QuicConnection;
use super::tcp::TcpConnection;
use super::tls::TlsConnection;
use crate::config::HttpConfig;
use crate::engine::observations::{
    HttpRequestRecord, HttpRequestResult, HttpResponseRecord, NetworkEvent, Observations,
};
use crate::engine::{
    Context, Exception, Failure, FromValue, FuncError, OperationLogger, Runtime, Trace, TypedFunc,
    Value,
};

/// Request overrides. `None` picks the configured or connection-derived
/// default; an empty header value omits the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpOptions {
    pub accept: Option<String>,
    pub accept_language: Option<String>,
    pub host: Option<String>,
    pub method: Option<String>,
    pub referer: Option<String>,
    pub response_body_snapshot_size: Option<usize>,
    pub url_host: Option<String>,
    pub url_path: Option<String>,
    pub url_scheme: Option<String>,
    pub user_agent: Option<String>,
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestPlan {
    pub(crate) method: String,
    pub(crate) url: Url,
    pub(crate) headers: Vec<(String, String)>,
}

impl RequestPlan {
    /// Path and query, as sent on the HTTP/1.1 request line.
    pub(crate) fn request_target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseParts {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) body_is_truncated: bool,
}

/// The connection an HTTP transaction runs over.
#[derive(Debug, Clone)]
pub enum HttpConnection {
    Tcp(TcpConnection),
    Tls(TlsConnection),
    Quic(QuicConnection),
}

impl FromValue for HttpConnection {
    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::TcpConnection(conn) => Ok(HttpConnection::Tcp(conn)),
            Value::TlsConnection(conn) => Ok(HttpConnection::Tls(conn)),
            Value::QuicConnection(conn) => Ok(HttpConnection::Quic(conn)),
            other => Err(other),
        }
    }
}

impl HttpConnection {
    fn address(&self) -> SocketAddr {
        match self {
            HttpConnection::Tcp(c) => c.address,
            HttpConnection::Tls(c) => c.address,
            HttpConnection::Quic(c) => c.address,
        }
    }

    fn domain(&self) -> &str {
        match self {
            HttpConnection::Tcp(c) => &c.domain,
            HttpConnection::Tls(c) => &c.domain,
            HttpConnection::Quic(c) => &c.domain,
        }
    }

    fn network(&self) -> &'static str {
        match self {
            HttpConnection::Tcp(_) | HttpConnection::Tls(_) => "tcp",
            HttpConnection::Quic(_) => "udp",
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            HttpConnection::Tcp(_) => "http",
            HttpConnection::Tls(_) | HttpConnection::Quic(_) => "https",
        }
    }

    fn negotiated_protocol(&self) -> &str {
        match self {
            HttpConnection::Tcp(_) => "",
            HttpConnection::Tls(c) => &c.negotiated_protocol,
            HttpConnection::Quic(c) => &c.negotiated_protocol,
        }
    }

    fn trace(&self) -> &Trace {
        match self {
            HttpConnection::Tcp(c) => &c.trace,
            HttpConnection::Tls(c) => &c.trace,
            HttpConnection::Quic(c) => &c.trace,
        }
    }
}

/// The outcome of an HTTP transaction.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub address: SocketAddr,
    pub domain: String,
    pub network: String,
    pub negotiated_protocol: String,
    pub url: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body_snapshot: Bytes,
    pub body_is_truncated: bool,
}

/// Sends one request over the input connection and reads the response.
#[derive(Debug, Default)]
pub struct HttpTransaction {
    options: HttpOptions,
}

fn header_value(field: &str, value: &str) -> Result<(), String> {
    if value.contains(['\r', '\n']) {
        return Err(format!("{field} contains a line break"));
    }
    Ok(())
}

/// Checks that a TLS connection speaks HTTP/1.1. An empty protocol means
/// the server ignored ALPN.
fn ensure_http1(negotiated_protocol: &str) -> Result<(), String> {
    match negotiated_protocol {
        "" | "http/1.1" => Ok(()),
        other => Err(unknown_failure(format!("unsupported negotiated protocol {other:?}"))),
    }
}

impl HttpTransaction {
    pub fn new(options: HttpOptions) -> Self {
        Self { options }
    }

    pub(crate) fn plan(
        &self,
        config: &HttpConfig,
        conn: &HttpConnection,
    ) -> Result<RequestPlan, String> {
        let o = &self.options;
        let method = o.method.clone().unwrap_or_else(|| "GET".into());
        http::Method::from_bytes(method.as_bytes())
            .map_err(|_| format!("invalid method {method:?}"))?;

        let scheme = o.url_scheme.as_deref().unwrap_or(conn.scheme());
        let url_host = o.url_host.as_deref().unwrap_or(conn.domain());
        let authority = match url_host.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{v6}]"),
            _ => url_host.to_string(),
        };
        let mut url = Url::parse(&format!("{scheme}://{authority}/"))
            .map_err(|e| format!("invalid URL {scheme}://{authority}/: {e}"))?;
        url.set_path(o.url_path.as_deref().unwrap_or("/"));

        let host = o.host.clone().unwrap_or_else(|| conn.domain().to_string());
        header_value("host", &host)?;
        let mut headers = vec![("Host".to_string(), host)];
        let optional = [
            ("Accept", o.accept.as_deref().unwrap_or(&config.accept)),
            (
                "Accept-Language",
                o.accept_language
                    .as_deref()
                    .unwrap_or(&config.accept_language),
            ),
            ("Referer", o.referer.as_deref().unwrap_or_default()),
            (
                "User-Agent",
                o.user_agent.as_deref().unwrap_or(&config.user_agent),
            ),
        ];
        for (name, value) in optional {
            if value.is_empty() {
                continue;
            }
            header_value(name, value)?;
            headers.push((name.to_string(), value.to_string()));
        }
        Ok(RequestPlan {
            method,
            url,
            headers,
        })
    }
}

fn annotation(trace: &Trace, t: f64, operation: &str) -> NetworkEvent {
    NetworkEvent {
        address: None,
        failure: None,
        num_bytes: None,
        operation: operation.to_string(),
        proto: None,
        t0: t,
        t,
        transaction_id: trace.index(),
    }
}

#[async_trait]
impl TypedFunc for HttpTransaction {
    type Input = HttpConnection;
    type Output = HttpResponse;

    fn name(&self) -> &'static str {
        "http_transaction"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: HttpConnection,
    ) -> Result<HttpResponse, FuncError> {
        let config = &rtx.config().http;
        let plan = self
            .plan(config, &input)
            .map_err(|e| Exception::new(format!("{}: {e}", self.name())))?;
        let limit = self
            .options
            .response_body_snapshot_size
            .unwrap_or(config.response_body_snapshot_size);
        let unavailable =
            || Exception::new(format!("{}: connection is no longer available", self.name()));

        let trace = input.trace().clone();
        let logger = OperationLogger::start(
            rtx.span(),
            &trace,
            format!(
                "HTTPTransaction {} {} with {}/{} host={}",
                plan.method,
                plan.url,
                input.address(),
                input.network(),
                plan.header("host").unwrap_or_default()
            ),
        );
        let t0 = trace.elapsed();

        let child = ctx.with_timeout(rtx.config().timeouts.http_transaction());
        let result = match &input {
            HttpConnection::Tcp(c) => {
                let mut stream = c.conn.take().ok_or_else(unavailable)?;
                let result = child.run(h1::round_trip(&mut stream, &plan, limit)).await;
                c.conn.restore(stream);
                result
            }
            HttpConnection::Tls(c) => match ensure_http1(&c.negotiated_protocol) {
                Ok(()) => {
                    let mut stream = c.conn.take().ok_or_else(unavailable)?;
                    let result = child.run(h1::round_trip(&mut stream, &plan, limit)).await;
                    c.conn.restore(stream);
                    result
                }
                Err(failure) => Ok(Err(failure)),
            },
            HttpConnection::Quic(c) => {
                let session = c.conn.take().ok_or_else(unavailable)?;
                let connection = session.connection.clone();
                c.conn.restore(session);
                child.run(h3::round_trip(connection, &plan, limit)).await
            }
        };
        let result = match result {
            Ok(result) => result,
            Err(err) => Err(classify_context_error(err)),
        };
        let t = trace.elapsed();

        let failure = result.as_ref().err().cloned();
        rtx.save_observations(Observations {
            network_events: vec![
                annotation(&trace, t0, "http_transaction_start"),
                annotation(&trace, t, "http_transaction_done"),
            ],
            requests: vec![HttpRequestResult {
                network: input.network().to_string(),
                address: input.address().to_string(),
                alpn: input.negotiated_protocol().to_string(),
                failure: failure.clone(),
                request: HttpRequestRecord {
                    headers: plan.headers.clone(),
                    method: plan.method.clone(),
                    url: plan.url.to_string(),
                },
                response: result.as_ref().ok().map(|parts| HttpResponseRecord {
                    body: String::from_utf8_lossy(&parts.body).into_owned(),
                    body_is_truncated: parts.body_is_truncated,
                    code: parts.status,
                    headers: parts.headers.clone(),
                }),
                t0,
                t,
                transaction_id: trace.index(),
            }],
            ..Observations::default()
        });
        logger.stop(failure.as_deref());

        let parts = result.map_err(|failure| Failure::new(self.name(), failure))?;
        Ok(HttpResponse {
            address: input.address(),
            domain: input.domain().to_string(),
            network: input.network().to_string(),
            negotiated_protocol: input.negotiated_protocol().to_string(),
            url: plan.url.to_string(),
            status_code: parts.status,
            headers: parts.headers,
            body_snapshot: Bytes::from(parts.body),
            body_is_truncated: parts.body_is_truncated,
        })
    }
}
