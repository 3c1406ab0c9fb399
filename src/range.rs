use std::fmt;
use std::net::Ipv4Addr;

/// One blocklist entry. Both ends are inclusive.
///
/// The relative order of `start` and `end` is not checked here; that is the
/// filter store's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl AddressRange {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.start <= ip && ip <= self.end
    }
}

impl From<(Ipv4Addr, Ipv4Addr)> for AddressRange {
    fn from((start, end): (Ipv4Addr, Ipv4Addr)) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Parses a dotted quad, accepting zero-padded octets such as `001.002.003.004`.
///
/// `Ipv4Addr::from_str` rejects leading zeros, but eMule and some PeerGuardian
/// lists write every octet with three digits.
pub fn parse_ipv4_lenient(s: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = s.trim().split('.');

    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = part.parse().ok()?;
    }

    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}
