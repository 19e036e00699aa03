//! Minimal DNS message codec: one-question queries and A/AAAA answers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;

pub const QTYPE_A: u16 = 1;
pub const QTYPE_AAAA: u16 = 28;
const QTYPE_CNAME: u16 = 5;
const CLASS_IN: u16 = 1;

const FLAG_QR: u16 = 0x8000;
const FLAG_RD: u16 = 0x0100;
const FLAG_TC: u16 = 0x0200;

const HEADER_LEN: usize = 12;
const MAX_LABELS: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsWireError {
    #[error("dns_nxdomain_error")]
    NxDomain,

    #[error("dns_refused_error")]
    Refused,

    #[error("dns_server_failure")]
    ServerFailure,

    #[error("dns_no_answer")]
    NoAnswer,

    #[error("unknown_failure: dns rcode {0}")]
    Rcode(u16),

    #[error("unknown_failure: truncated dns response")]
    Truncated,

    #[error("unknown_failure: malformed dns message: {0}")]
    Malformed(&'static str),

    #[error("unknown_failure: invalid domain name: {0}")]
    InvalidName(String),
}

/// One address record from the answer section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub address: IpAddr,
    pub ttl: u32,
}

pub fn query_type_name(qtype: u16) -> &'static str {
    match qtype {
        QTYPE_A => "A",
        QTYPE_AAAA => "AAAA",
        QTYPE_CNAME => "CNAME",
        _ => "UNKNOWN",
    }
}

/// Encodes a recursive query for `domain` with the given type.
pub fn encode_query(id: u16, domain: &str, qtype: u16) -> Result<Vec<u8>, DnsWireError> {
    let mut out = Vec::with_capacity(HEADER_LEN + domain.len() + 6);
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&FLAG_RD.to_be_bytes());
    out.extend_from_slice(&1_u16.to_be_bytes());
    out.extend_from_slice(&[0; 6]);

    let name = domain.strip_suffix('.').unwrap_or(domain);
    if name.is_empty() || name.len() > 253 {
        return Err(DnsWireError::InvalidName(domain.to_string()));
    }
    for label in name.split('.') {
        let len = u8::try_from(label.len())
            .ok()
            .filter(|len| (1..=63).contains(len))
            .ok_or_else(|| DnsWireError::InvalidName(domain.to_string()))?;
        out.push(len);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out.extend_from_slice(&qtype.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    Ok(out)
}

/// Returns the id of a message, if it has a complete header.
pub fn message_id(msg: &[u8]) -> Option<u16> {
    (msg.len() >= HEADER_LEN).then(|| u16::from_be_bytes([msg[0], msg[1]]))
}

/// Decodes the answers of type `qtype` in a response.
///
/// A successful response without matching records is
/// [`DnsWireError::NoAnswer`].
pub fn decode_response(msg: &[u8], qtype: u16) -> Result<Vec<AddressRecord>, DnsWireError> {
    let mut r = Reader::new(msg);
    let _id = r.u16()?;
    let flags = r.u16()?;
    let qdcount = r.u16()?;
    let ancount = r.u16()?;
    let _nscount = r.u16()?;
    let _arcount = r.u16()?;

    if flags & FLAG_QR == 0 {
        return Err(DnsWireError::Malformed("not a response"));
    }
    if flags & FLAG_TC != 0 {
        return Err(DnsWireError::Truncated);
    }
    match flags & 0x000f {
        0 => {}
        2 => return Err(DnsWireError::ServerFailure),
        3 => return Err(DnsWireError::NxDomain),
        5 => return Err(DnsWireError::Refused),
        rcode => return Err(DnsWireError::Rcode(rcode)),
    }

    for _ in 0..qdcount {
        r.skip_name()?;
        r.skip(4)?;
    }

    let mut records = Vec::new();
    for _ in 0..ancount {
        r.skip_name()?;
        let rtype = r.u16()?;
        let _class = r.u16()?;
        let ttl = r.u32()?;
        let rdlen = usize::from(r.u16()?);
        let rdata = r.take(rdlen)?;
        let address = match (rtype, rdata.len()) {
            (QTYPE_A, 4) if qtype == QTYPE_A => {
                IpAddr::V4(Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]))
            }
            (QTYPE_AAAA, 16) if qtype == QTYPE_AAAA => {
                let mut octets = [0_u8; 16];
                octets.copy_from_slice(rdata);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            _ => continue,
        };
        records.push(AddressRecord { address, ttl });
    }

    if records.is_empty() {
        return Err(DnsWireError::NoAnswer);
    }
    Ok(records)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DnsWireError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(DnsWireError::Malformed("short message"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> Result<(), DnsWireError> {
        self.take(n).map(|_| ())
    }

    fn u16(&mut self) -> Result<u16, DnsWireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DnsWireError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Skips an encoded name. A compression pointer terminates it.
    fn skip_name(&mut self) -> Result<(), DnsWireError> {
        for _ in 0..MAX_LABELS {
            let len = self.take(1)?[0];
            match len {
                0 => return Ok(()),
                l if l & 0xc0 == 0xc0 => {
                    self.skip(1)?;
                    return Ok(());
                }
                l if l & 0xc0 == 0 => self.skip(usize::from(l))?,
                _ => return Err(DnsWireError::Malformed("bad label")),
            }
        }
        Err(DnsWireError::Malformed("name too long"))
    }
}
