//! Wire arguments of the built-in operations.
//!
//! Every struct decodes from an empty object (or a missing `arguments`
//! field) to its default and ignores fields it does not know, so programs
//! written for newer probes still compile here. Defaults always compile;
//! an empty domain or resolver endpoint fails when the operation runs.

use serde::{Deserialize, Serialize};

use crate::engine::validate::{parse_domain, parse_endpoint, parse_ip_addrs};
use crate::error::CompileError;
use crate::probes::{DnsLookupUdp, HttpOptions, TlsOptions};

fn invalid(func: &str, message: String) -> CompileError {
    CompileError::InvalidArgumentValue {
        func: func.to_string(),
        message,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainNameArguments {
    pub domain: String,
}

impl DomainNameArguments {
    pub fn validate(&self, func: &str) -> Result<String, CompileError> {
        if self.domain.is_empty() {
            return Ok(String::new());
        }
        parse_domain(&self.domain).map_err(|m| invalid(func, m))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsLookupStaticArguments {
    pub addresses: Vec<String>,
}

impl DnsLookupStaticArguments {
    pub fn validate(&self, func: &str) -> Result<Vec<std::net::IpAddr>, CompileError> {
        if self.addresses.is_empty() {
            return Ok(Vec::new());
        }
        parse_ip_addrs(&self.addresses).map_err(|m| invalid(func, m))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsLookupUdpArguments {
    pub endpoint: String,
}

impl DnsLookupUdpArguments {
    pub fn validate(&self, func: &str) -> Result<DnsLookupUdp, CompileError> {
        if self.endpoint.is_empty() {
            return Ok(DnsLookupUdp::parse(&self.endpoint));
        }
        let endpoint = parse_endpoint(&self.endpoint).map_err(|m| invalid(func, m))?;
        Ok(DnsLookupUdp::new(endpoint))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MakeEndpointsForPortArguments {
    pub port: u16,
}

/// Arguments of `tls_handshake` and `quic_handshake`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeArguments {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_verify: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub sni: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub x509_certs: Vec<String>,
}

impl HandshakeArguments {
    pub fn into_options(self) -> TlsOptions {
        TlsOptions {
            alpn: (!self.alpn.is_empty()).then_some(self.alpn),
            sni: (!self.sni.is_empty()).then_some(self.sni),
            skip_verify: self.skip_verify,
            x509_certs: self.x509_certs,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpTransactionArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body_snapshot_size: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_scheme: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl HttpTransactionArguments {
    pub fn validate(self, func: &str) -> Result<HttpOptions, CompileError> {
        if self.response_body_snapshot_size == Some(0) {
            return Err(invalid(func, "response_body_snapshot_size must be > 0".into()));
        }
        if let Some(scheme) = &self.url_scheme
            && !matches!(scheme.as_str(), "http" | "https")
        {
            return Err(invalid(func, format!("unsupported url_scheme: {scheme:?}")));
        }
        if let Some(path) = &self.url_path
            && !path.starts_with('/')
        {
            return Err(invalid(func, format!("url_path must start with '/': {path:?}")));
        }
        Ok(HttpOptions {
            accept: self.accept,
            accept_language: self.accept_language,
            host: self.host,
            method: self.method,
            referer: self.referer,
            response_body_snapshot_size: self.response_body_snapshot_size,
            url_host: self.url_host,
            url_path: self.url_path,
            url_scheme: self.url_scheme,
            user_agent: self.user_agent,
        })
    }
}
