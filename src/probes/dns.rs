//! DNS lookup probes.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;

use super::dnswire::{self, AddressRecord, QTYPE_A, QTYPE_AAAA};
use super::errors::{
    DNS_NO_ANSWER, classify_context_error, classify_io_error, classify_resolver_error,
    unknown_failure,
};
use crate::engine::observations::{DnsAnswer, DnsLookupResult, Observations};
use crate::engine::{
    Context, DnsLookupInput, DnsLookupOutput, Failure, FuncError, OperationLogger, Runtime, Trace,
    TypedFunc,
};

const MAX_UDP_RESPONSE: usize = 4096;

fn answer_for(address: IpAddr, ttl: Option<u32>) -> DnsAnswer {
    match address {
        IpAddr::V4(v4) => DnsAnswer {
            answer_type: "A".into(),
            ipv4: Some(v4.to_string()),
            ipv6: None,
            ttl,
        },
        IpAddr::V6(v6) => DnsAnswer {
            answer_type: "AAAA".into(),
            ipv4: None,
            ipv6: Some(v6.to_string()),
            ttl,
        },
    }
}

struct QueryRecord<'a> {
    trace: &'a Trace,
    engine: &'a str,
    resolver_address: String,
    hostname: &'a str,
    query_type: &'a str,
    t0: f64,
}

impl QueryRecord<'_> {
    fn finish(&self, answers: Vec<DnsAnswer>, failure: Option<String>) -> DnsLookupResult {
        DnsLookupResult {
            answers,
            engine: self.engine.to_string(),
            failure,
            hostname: self.hostname.to_string(),
            query_type: self.query_type.to_string(),
            resolver_address: self.resolver_address.clone(),
            t0: self.t0,
            t: self.trace.elapsed(),
            transaction_id: self.trace.index(),
        }
    }
}

fn dedup(addresses: impl IntoIterator<Item = IpAddr>) -> Vec<IpAddr> {
    let mut out: Vec<IpAddr> = Vec::new();
    for address in addresses {
        if !out.contains(&address) {
            out.push(address);
        }
    }
    out
}

// ── getaddrinfo ──────────────────────────────────────────────────

/// Resolves the domain with the system resolver.
#[derive(Debug, Default)]
pub struct DnsLookupGetaddrinfo;

#[async_trait]
impl TypedFunc for DnsLookupGetaddrinfo {
    type Input = DnsLookupInput;
    type Output = DnsLookupOutput;

    fn name(&self) -> &'static str {
        "dns_lookup_getaddrinfo"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: DnsLookupInput,
    ) -> Result<DnsLookupOutput, FuncError> {
        let trace = rtx.new_trace();
        let logger = OperationLogger::start(
            rtx.span(),
            &trace,
            format!("DNSLookup[getaddrinfo] {}", input.domain),
        );
        let record = QueryRecord {
            trace: &trace,
            engine: "getaddrinfo",
            resolver_address: String::new(),
            hostname: &input.domain,
            query_type: "ANY",
            t0: trace.elapsed(),
        };

        let child = ctx.with_timeout(rtx.config().timeouts.dns_lookup());
        let result = if input.domain.is_empty() {
            Err(unknown_failure("empty domain"))
        } else {
            match child
                .run(tokio::net::lookup_host((input.domain.as_str(), 0)))
                .await
            {
                Ok(Ok(addrs)) => {
                    let addresses = dedup(addrs.map(|sa| sa.ip()));
                    if addresses.is_empty() {
                        Err(DNS_NO_ANSWER.to_string())
                    } else {
                        Ok(addresses)
                    }
                }
                Ok(Err(err)) => Err(classify_resolver_error(&err)),
                Err(err) => Err(classify_context_error(err)),
            }
        };

        let observation = match &result {
            Ok(addresses) => record.finish(
                addresses.iter().map(|a| answer_for(*a, None)).collect(),
                None,
            ),
            Err(failure) => record.finish(Vec::new(), Some(failure.clone())),
        };
        rtx.save_observations(Observations {
            queries: vec![observation],
            ..Observations::default()
        });
        logger.stop(result.as_ref().err().map(String::as_str));

        match result {
            Ok(addresses) => Ok(DnsLookupOutput {
                domain: input.domain,
                addresses,
            }),
            Err(failure) => Err(Failure::new(self.name(), failure).into()),
        }
    }
}

// ── UDP ──────────────────────────────────────────────────────────

/// Resolves the domain by sending A and AAAA queries to a resolver over UDP.
#[derive(Debug)]
pub struct DnsLookupUdp {
    /// The resolver, or the text that failed to parse as one.
    endpoint: Result<SocketAddr, String>,
}

impl DnsLookupUdp {
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint: Ok(endpoint),
        }
    }

    /// Accepts any text. Lookups through an endpoint that does not parse
    /// fail when they run.
    pub fn parse(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.parse().map_err(|_| endpoint.to_string()),
        }
    }

    fn resolver_address(&self) -> String {
        match &self.endpoint {
            Ok(address) => address.to_string(),
            Err(raw) => raw.clone(),
        }
    }
}

async fn exchange(
    endpoint: SocketAddr,
    query: &[u8],
    qtype: u16,
) -> Result<Vec<AddressRecord>, String> {
    let local: SocketAddr = match endpoint {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| classify_io_error(&e))?;
    socket
        .connect(endpoint)
        .await
        .map_err(|e| classify_io_error(&e))?;
    socket.send(query).await.map_err(|e| classify_io_error(&e))?;

    let id = dnswire::message_id(query);
    let mut buf = vec![0_u8; MAX_UDP_RESPONSE];
    loop {
        let n = socket.recv(&mut buf).await.map_err(|e| classify_io_error(&e))?;
        let reply = &buf[..n];
        // Late or spoofed replies with another id are ignored.
        if dnswire::message_id(reply) != id {
            continue;
        }
        return dnswire::decode_response(reply, qtype).map_err(|e| e.to_string());
    }
}

impl DnsLookupUdp {
    async fn query(
        &self,
        ctx: &Context,
        trace: &Trace,
        domain: &str,
        qtype: u16,
    ) -> (DnsLookupResult, Result<Vec<IpAddr>, String>) {
        let record = QueryRecord {
            trace,
            engine: "udp",
            resolver_address: self.resolver_address(),
            hostname: domain,
            query_type: dnswire::query_type_name(qtype),
            t0: trace.elapsed(),
        };
        let query = dnswire::encode_query(rand::random::<u16>(), domain, qtype);
        let result = match (&self.endpoint, query) {
            (Err(raw), _) => Err(unknown_failure(format!("invalid endpoint {raw:?}"))),
            (Ok(_), Err(err)) => Err(err.to_string()),
            (Ok(endpoint), Ok(query)) => match ctx.run(exchange(*endpoint, &query, qtype)).await {
                Ok(result) => result,
                Err(err) => Err(classify_context_error(err)),
            },
        };
        match result {
            Ok(records) => {
                let answers = records
                    .iter()
                    .map(|r| answer_for(r.address, Some(r.ttl)))
                    .collect();
                let addresses = records.into_iter().map(|r| r.address).collect();
                (record.finish(answers, None), Ok(addresses))
            }
            Err(failure) => (record.finish(Vec::new(), Some(failure.clone())), Err(failure)),
        }
    }
}

#[async_trait]
impl TypedFunc for DnsLookupUdp {
    type Input = DnsLookupInput;
    type Output = DnsLookupOutput;

    fn name(&self) -> &'static str {
        "dns_lookup_udp"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: DnsLookupInput,
    ) -> Result<DnsLookupOutput, FuncError> {
        let trace = rtx.new_trace();
        let logger = OperationLogger::start(
            rtx.span(),
            &trace,
            format!("DNSLookup[{}/udp] {}", self.resolver_address(), input.domain),
        );

        let child = ctx.with_timeout(rtx.config().timeouts.dns_lookup());
        let ((obs_a, res_a), (obs_aaaa, res_aaaa)) = tokio::join!(
            self.query(&child, &trace, &input.domain, QTYPE_A),
            self.query(&child, &trace, &input.domain, QTYPE_AAAA),
        );
        rtx.save_observations(Observations {
            queries: vec![obs_a, obs_aaaa],
            ..Observations::default()
        });

        let mut addresses = Vec::new();
        let mut failures = Vec::new();
        for result in [res_a, res_aaaa] {
            match result {
                Ok(found) => addresses.extend(found),
                Err(failure) => failures.push(failure),
            }
        }
        let addresses = dedup(addresses);
        if addresses.is_empty() {
            let failure = failures
                .iter()
                .find(|f| f.as_str() != DNS_NO_ANSWER)
                .cloned()
                .unwrap_or_else(|| DNS_NO_ANSWER.to_string());
            logger.stop(Some(&failure));
            return Err(Failure::new(self.name(), failure).into());
        }
        logger.stop(None);
        Ok(DnsLookupOutput {
            domain: input.domain,
            addresses,
        })
    }
}

// ── static ───────────────────────────────────────────────────────

/// Returns a fixed set of addresses, as if they had been resolved.
#[derive(Debug)]
pub struct DnsLookupStatic {
    addresses: Vec<IpAddr>,
}

impl DnsLookupStatic {
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl TypedFunc for DnsLookupStatic {
    type Input = DnsLookupInput;
    type Output = DnsLookupOutput;

    fn name(&self) -> &'static str {
        "dns_lookup_static"
    }

    async fn call(
        &self,
        _ctx: &Context,
        rtx: &Runtime,
        input: DnsLookupInput,
    ) -> Result<DnsLookupOutput, FuncError> {
        let trace = rtx.new_trace();
        let logger = OperationLogger::start(
            rtx.span(),
            &trace,
            format!("DNSLookup[static] {}", input.domain),
        );
        let record = QueryRecord {
            trace: &trace,
            engine: "static",
            resolver_address: String::new(),
            hostname: &input.domain,
            query_type: "ANY",
            t0: trace.elapsed(),
        };
        let addresses = dedup(self.addresses.iter().copied());
        rtx.save_observations(Observations {
            queries: vec![record.finish(
                addresses.iter().map(|a| answer_for(*a, None)).collect(),
                None,
            )],
            ..Observations::default()
        });
        logger.stop(None);
        Ok(DnsLookupOutput {
            domain: input.domain,
            addresses,
        })
    }
}
