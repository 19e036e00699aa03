use std::net::{IpAddr, SocketAddr};

use serde::Serialize;
use thiserror::Error;

use crate::probes::{HttpResponse, QuicConnection, TcpConnection, TlsConnection};
use crate::types::{self, SimpleType};

/// A recoverable measurement failure (connection refused, timeout, ...).
///
/// `failure` uses the classification strings of the archival format, for
/// example `connection_refused` or `generic_timeout_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{operation}: {failure}")]
pub struct Failure {
    pub operation: String,
    pub failure: String,
}

impl Failure {
    pub fn new(operation: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            failure: failure.into(),
        }
    }
}

/// A structural failure that aborts the branch that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("exception: {reason}")]
pub struct Exception {
    pub reason: String,
}

impl Exception {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The domain to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsLookupInput {
    pub domain: String,
}

/// The result of resolving a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsLookupOutput {
    pub domain: String,
    pub addresses: Vec<IpAddr>,
}

/// A transport endpoint plus the domain it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: SocketAddr,
    pub domain: String,
}

/// A value flowing through the graph: one domain category or one of the
/// three control-flow sentinels.
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    DnsLookupInput(DnsLookupInput),
    DnsLookupOutput(DnsLookupOutput),
    Endpoint(Endpoint),
    Endpoints(Vec<Endpoint>),
    TcpConnection(TcpConnection),
    TlsConnection(TlsConnection),
    QuicConnection(QuicConnection),
    HttpResponse(HttpResponse),
    Error(Failure),
    Exception(Exception),
    Skip,
}

impl Value {
    /// The [`SimpleType`] naming this value's category.
    pub fn simple_type(&self) -> SimpleType {
        match self {
            Value::Void => types::VOID,
            Value::DnsLookupInput(_) => types::DNS_LOOKUP_INPUT,
            Value::DnsLookupOutput(_) => types::DNS_LOOKUP_OUTPUT,
            Value::Endpoint(_) => types::ENDPOINT,
            Value::Endpoints(_) => types::LIST_OF_ENDPOINT,
            Value::TcpConnection(_) => types::TCP_CONNECTION,
            Value::TlsConnection(_) => types::TLS_CONNECTION,
            Value::QuicConnection(_) => types::QUIC_CONNECTION,
            Value::HttpResponse(_) => types::HTTP_RESPONSE,
            Value::Error(_) => types::ERROR,
            Value::Exception(_) => types::EXCEPTION,
            Value::Skip => types::SKIP,
        }
    }

    /// Whether this is `Error`, `Exception` or `Skip`.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Value::Error(_) | Value::Exception(_) | Value::Skip)
    }

    pub fn as_error(&self) -> Option<&Failure> {
        match self {
            Value::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn as_exception(&self) -> Option<&Exception> {
        match self {
            Value::Exception(exc) => Some(exc),
            _ => None,
        }
    }

    /// Creates an [`Exception`] reporting that `operation` received a value
    /// of a category it does not handle.
    pub fn unexpected(operation: &str, got: &Value) -> Value {
        Value::Exception(Exception::new(format!(
            "{operation}: unexpected {} type",
            got.simple_type()
        )))
    }
}

impl From<Failure> for Value {
    fn from(value: Failure) -> Self {
        Value::Error(value)
    }
}

impl From<Exception> for Value {
    fn from(value: Exception) -> Self {
        Value::Exception(value)
    }
}

/// Extraction of one main category out of a [`Value`], used by typed
/// operations. On mismatch the original value is handed back.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Value>;
}

/// The `Void` category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Void;

impl From<Void> for Value {
    fn from(_: Void) -> Self {
        Value::Void
    }
}

impl FromValue for Void {
    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Void => Ok(Void),
            other => Err(other),
        }
    }
}

macro_rules! value_category {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

value_category!(DnsLookupInput, DnsLookupInput);
value_category!(DnsLookupOutput, DnsLookupOutput);
value_category!(Endpoint, Endpoint);
value_category!(Vec<Endpoint>, Endpoints);
value_category!(TcpConnection, TcpConnection);
value_category!(TlsConnection, TlsConnection);
value_category!(QuicConnection, QuicConnection);
value_category!(HttpResponse, HttpResponse);
