//! Network measurement primitives.
//!
//! Every probe is a [`TypedFunc`](crate::engine::TypedFunc): it records
//! observations on the runtime, reports network failures as
//! [`Value::Error`](crate::engine::Value::Error) and misconfiguration as
//! [`Value::Exception`](crate::engine::Value::Exception).

pub mod dns;
pub mod dnswire;
pub mod errors;
pub mod http;
pub mod quic;
pub mod tcp;
pub mod tls;

pub use dns::{DnsLookupGetaddrinfo, DnsLookupStatic, DnsLookupUdp};
pub use http::{HttpConnection, HttpOptions, HttpResponse, HttpTransaction};
pub use quic::{DEFAULT_QUIC_ALPN, QuicConnection, QuicHandshake};
pub use tcp::{TcpConnect, TcpConnection};
pub use tls::{DEFAULT_TLS_ALPN, TlsConnection, TlsHandshake, TlsOptions};
