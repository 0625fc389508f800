//! Syntactic checks for IP addresses and CIDR blocks.
//!
//! Nothing here resolves names; a value is valid only if it is written as
//! an address literal.

use std::net::{Ipv4Addr, Ipv6Addr};

pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

pub fn is_ipv6(s: &str) -> bool {
    s.parse::<Ipv6Addr>().is_ok()
}

pub fn is_ip(s: &str) -> bool {
    is_ipv4(s) || is_ipv6(s)
}

pub fn is_cidrv4(s: &str) -> bool {
    split_cidr(s).is_some_and(|(addr, prefix)| prefix <= 32 && is_ipv4(addr))
}

pub fn is_cidrv6(s: &str) -> bool {
    split_cidr(s).is_some_and(|(addr, prefix)| prefix <= 128 && is_ipv6(addr))
}

pub fn is_cidr(s: &str) -> bool {
    is_cidrv4(s) || is_cidrv6(s)
}

/// Split `<address>/<prefix>`; the prefix must be one to three ASCII digits.
fn split_cidr(s: &str) -> Option<(&str, u16)> {
    let (addr, prefix) = s.split_once('/')?;
    if prefix.is_empty() || prefix.len() > 3 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((addr, prefix.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_literals() {
        assert!(is_ipv4("10.0.0.1"));
        assert!(is_ipv4("255.255.255.255"));
        assert!(!is_ipv4("256.1.1.1"));
        assert!(!is_ipv4("10.0.0"));
        assert!(!is_ipv4("example.com"));
    }

    #[test]
    fn ipv6_literals() {
        assert!(is_ipv6("::1"));
        assert!(is_ipv6("fe80::1:2"));
        assert!(is_ipv6("2001:db8:0:0:0:0:0:1"));
        assert!(!is_ipv6("2001:db8::1::2"));
        assert!(!is_ipv6("12345::"));
        assert!(is_ip("::1") && is_ip("1.2.3.4"));
    }

    #[test]
    fn cidr_blocks() {
        assert!(is_cidrv4("10.0.0.0/24"));
        assert!(is_cidrv4("0.0.0.0/0"));
        assert!(!is_cidrv4("10.0.0.0/33"));
        assert!(!is_cidrv4("10.0.0.0"));
        assert!(!is_cidrv4("10.0.0.0/"));
        assert!(!is_cidrv4("10.0.0.0/-1"));

        assert!(is_cidrv6("::1/128"));
        assert!(!is_cidrv6("::1/129"));
        assert!(!is_cidrv6("1.2.3.4"));
        assert!(!is_cidrv6("1.2.3.4/24"));

        assert!(is_cidr("10.0.0.0/8") && is_cidr("2001:db8::/32"));
    }
}
