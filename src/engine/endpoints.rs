use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;

use super::context::Context;
use super::func::{FuncError, TypedFunc};
use super::runtime::Runtime;
use super::value::{DnsLookupInput, DnsLookupOutput, Endpoint, Void};

/// Produces the domain to resolve.
pub struct DomainName {
    domain: String,
}

impl DomainName {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

#[async_trait]
impl TypedFunc for DomainName {
    type Input = Void;
    type Output = DnsLookupInput;

    fn name(&self) -> &'static str {
        "domain_name"
    }

    async fn call(
        &self,
        _ctx: &Context,
        _rtx: &Runtime,
        _input: Void,
    ) -> Result<DnsLookupInput, FuncError> {
        Ok(DnsLookupInput {
            domain: self.domain.clone(),
        })
    }
}

/// Turns resolved addresses into endpoints on a fixed port, one per
/// distinct address.
pub struct MakeEndpointsForPort {
    port: u16,
}

impl MakeEndpointsForPort {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl TypedFunc for MakeEndpointsForPort {
    type Input = DnsLookupOutput;
    type Output = Vec<Endpoint>;

    fn name(&self) -> &'static str {
        "make_endpoints_for_port"
    }

    async fn call(
        &self,
        _ctx: &Context,
        _rtx: &Runtime,
        input: DnsLookupOutput,
    ) -> Result<Vec<Endpoint>, FuncError> {
        let unique: BTreeSet<IpAddr> = input.addresses.into_iter().collect();
        Ok(unique
            .into_iter()
            .map(|ip| Endpoint {
                address: SocketAddr::new(ip, self.port),
                domain: input.domain.clone(),
            })
            .collect())
    }
}
