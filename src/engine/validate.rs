//! Argument validation shared by the program builder and the compiler.

use std::net::{IpAddr, SocketAddr};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Accepts a DNS name with an optional trailing dot. Labels must be
/// non-empty printable ASCII without whitespace.
pub fn parse_domain(domain: &str) -> Result<String, String> {
    let trimmed = domain.strip_suffix('.').unwrap_or(domain);
    if trimmed.is_empty() || trimmed.len() > MAX_DOMAIN_LEN {
        return Err(format!("invalid domain: {domain:?}"));
    }
    let labels_ok = trimmed.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && label.bytes().all(|b| b.is_ascii_graphic())
    });
    if !labels_ok {
        return Err(format!("invalid domain: {domain:?}"));
    }
    Ok(domain.to_string())
}

/// Parses a non-empty list of IP address literals.
pub fn parse_ip_addrs<S: AsRef<str>>(addresses: &[S]) -> Result<Vec<IpAddr>, String> {
    if addresses.is_empty() {
        return Err("invalid addresses: empty list".into());
    }
    addresses
        .iter()
        .map(|a| {
            a.as_ref()
                .parse::<IpAddr>()
                .map_err(|_| format!("invalid address: {:?}", a.as_ref()))
        })
        .collect()
}

/// Parses `ADDR:PORT` (IPv4) or `[ADDR]:PORT` (IPv6).
pub fn parse_endpoint(endpoint: &str) -> Result<SocketAddr, String> {
    endpoint
        .parse::<SocketAddr>()
        .map_err(|_| format!("invalid endpoint: {endpoint:?}"))
}
