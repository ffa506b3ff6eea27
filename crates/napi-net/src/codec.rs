use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;

use crate::address_family::{AddressFamily, IdentifyAddressFamily};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    #[error("invalid subnet: {0}")]
    InvalidSubnet(String),
}

/// Parse a dotted-quad or canonical-colon address. IPv6 is always
/// normalized to its canonical lowercase form by `std::net::IpAddr`'s
/// own `Display`, so no extra canonicalization is required here.
pub fn parse(input: &str) -> Result<IpAddr, AddressError> {
    input
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidIp(input.to_string()))
}

/// Render an address back to its canonical textual form.
pub fn format(addr: IpAddr) -> String {
    addr.to_string()
}

/// Parse a CIDR string (`a.b.c.d/n` or `a:b::/n`) into an `IpNetwork`.
pub fn parse_subnet(input: &str) -> Result<IpNetwork, AddressError> {
    input
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidSubnet(input.to_string()))
}

/// Numeric form of an address: a 128-bit unsigned integer (IPv4 addresses
/// occupy the low 32 bits).
pub fn to_numeric(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Inverse of [`to_numeric`]. Fails if the numeric value does not fit the
/// requested family (e.g. a value greater than `u32::MAX` for `Ipv4`).
pub fn from_numeric(value: u128, family: AddressFamily) -> Result<IpAddr, AddressError> {
    match family {
        AddressFamily::Ipv4 => {
            let v = u32::try_from(value)
                .map_err(|_| AddressError::InvalidIp(format!("{value} does not fit in 32 bits")))?;
            Ok(IpAddr::V4(Ipv4Addr::from(v)))
        }
        AddressFamily::Ipv6 => Ok(IpAddr::V6(Ipv6Addr::from(value))),
    }
}

/// Numeric ordering of two addresses. Cross-family comparisons order all
/// IPv4 addresses before all IPv6 addresses, since they never alias under
/// the numeric representation used by [`to_numeric`].
pub fn cmp(a: IpAddr, b: IpAddr) -> Ordering {
    match (a, b) {
        (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Less,
        (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Greater,
        _ => to_numeric(a).cmp(&to_numeric(b)),
    }
}

/// Whether `addr` falls within `subnet`.
pub fn in_subnet(addr: IpAddr, subnet: &IpNetwork) -> bool {
    subnet.contains(addr)
}

/// Build the netmask address for a given family/prefix-length pair.
pub fn bits_to_netmask(bits: u8, family: AddressFamily) -> Result<IpAddr, AddressError> {
    match family {
        AddressFamily::Ipv4 => {
            if bits > 32 {
                return Err(AddressError::InvalidSubnet(format!(
                    "{bits} is not a valid IPv4 prefix length"
                )));
            }
            let mask: u32 = if bits == 0 {
                0
            } else {
                u32::MAX << (32 - bits)
            };
            Ok(IpAddr::V4(Ipv4Addr::from(mask)))
        }
        AddressFamily::Ipv6 => {
            if bits > 128 {
                return Err(AddressError::InvalidSubnet(format!(
                    "{bits} is not a valid IPv6 prefix length"
                )));
            }
            let mask: u128 = if bits == 0 {
                0
            } else {
                u128::MAX << (128 - bits)
            };
            Ok(IpAddr::V6(Ipv6Addr::from(mask)))
        }
    }
}

/// Given the previous address handed out from `subnet` (or `None` to start
/// at the bottom of the range), return the next address still inside
/// `subnet`, or `None` once the range is exhausted. Used by range-update
/// bookkeeping and by tests that need a deterministic walk over a subnet;
/// the allocator itself drives candidate selection through the gap-scan
/// path in `napi-store`, not through this helper.
pub fn next_in(subnet: &IpNetwork, prev: Option<IpAddr>) -> Option<IpAddr> {
    let family = subnet.network().address_family();
    let candidate = match prev {
        None => to_numeric(subnet.network()),
        Some(prev) => to_numeric(prev) + 1,
    };
    let addr = from_numeric(candidate, family).ok()?;
    if in_subnet(addr, subnet) {
        Some(addr)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_v4() {
        let addr = parse("10.0.1.5").unwrap();
        assert_eq!(format(addr), "10.0.1.5");
    }

    #[test]
    fn parses_and_formats_v6_canonical() {
        let addr = parse("2001:DB8:0:0:0:0:0:1").unwrap();
        assert_eq!(format(addr), "2001:db8::1");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("not-an-ip").is_err());
        assert!(parse_subnet("10.0.0.0/99").is_err());
    }

    #[test]
    fn numeric_round_trip_v4() {
        let addr = parse("10.0.1.5").unwrap();
        let n = to_numeric(addr);
        assert_eq!(from_numeric(n, AddressFamily::Ipv4).unwrap(), addr);
    }

    #[test]
    fn numeric_round_trip_v6() {
        let addr = parse("2001:db8::1").unwrap();
        let n = to_numeric(addr);
        assert_eq!(from_numeric(n, AddressFamily::Ipv6).unwrap(), addr);
    }

    #[test]
    fn cmp_orders_numerically() {
        let a = parse("10.0.1.5").unwrap();
        let b = parse("10.0.1.6").unwrap();
        assert_eq!(cmp(a, b), Ordering::Less);
        assert_eq!(cmp(b, a), Ordering::Greater);
        assert_eq!(cmp(a, a), Ordering::Equal);
    }

    #[test]
    fn netmask_bits() {
        assert_eq!(
            bits_to_netmask(24, AddressFamily::Ipv4).unwrap(),
            parse("255.255.255.0").unwrap()
        );
        assert_eq!(
            bits_to_netmask(32, AddressFamily::Ipv4).unwrap(),
            parse("255.255.255.255").unwrap()
        );
        assert_eq!(
            bits_to_netmask(0, AddressFamily::Ipv4).unwrap(),
            parse("0.0.0.0").unwrap()
        );
    }

    #[test]
    fn next_in_walks_a_subnet() {
        let subnet: IpNetwork = "10.0.1.0/30".parse().unwrap();
        let first = next_in(&subnet, None).unwrap();
        assert_eq!(format(first), "10.0.1.0");
        let second = next_in(&subnet, Some(first)).unwrap();
        assert_eq!(format(second), "10.0.1.1");
        let last = next_in(&subnet, Some(parse("10.0.1.3").unwrap()));
        assert!(last.is_none());
    }
}
