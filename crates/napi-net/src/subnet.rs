use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::address_family::AddressFamily;
use crate::codec::{AddressError, from_numeric, to_numeric};

/// The first and last address of `subnet`'s numeric range, inclusive. For
/// IPv4 this is the network address through the broadcast address; for
/// IPv6, `ipnetwork` has no broadcast concept so the range simply runs to
/// the last address of the block (network address with all host bits set).
pub fn subnet_bounds(subnet: &IpNetwork) -> (IpAddr, IpAddr) {
    match subnet {
        IpNetwork::V4(net) => (IpAddr::V4(net.network()), IpAddr::V4(net.broadcast())),
        IpNetwork::V6(net) => {
            let family = AddressFamily::Ipv6;
            let start = to_numeric(IpAddr::V6(net.network()));
            let host_bits = 128 - net.prefix() as u32;
            let span = if host_bits >= 128 {
                u128::MAX
            } else {
                (1u128 << host_bits) - 1
            };
            let end = from_numeric(start | span, family).expect("128-bit value always fits v6");
            (IpAddr::V6(net.network()), end)
        }
    }
}

/// Broadcast address of a v4 subnet, if applicable. IPv6 has no broadcast
/// address, so `None` is always returned for V6 subnets (see §9 open
/// question (a): whether a /31-equivalent v4 subnet should elide the
/// broadcast is left to the caller, who can compare `prefix() >= 31`).
pub fn broadcast(subnet: &IpNetwork) -> Option<IpAddr> {
    match subnet {
        IpNetwork::V4(net) => Some(IpAddr::V4(net.broadcast())),
        IpNetwork::V6(_) => None,
    }
}

/// Whether `range` (inclusive) lies strictly inside `subnet`, excluding
/// the network and broadcast addresses (used to validate a network's
/// provision range per §3).
pub fn range_strictly_inside(
    subnet: &IpNetwork,
    start: IpAddr,
    end: IpAddr,
) -> Result<(), AddressError> {
    if !subnet.contains(start) || !subnet.contains(end) {
        return Err(AddressError::InvalidSubnet(
            "provision range is not contained in the subnet".into(),
        ));
    }
    if to_numeric(start) > to_numeric(end) {
        return Err(AddressError::InvalidSubnet(
            "provision range start is after its end".into(),
        ));
    }
    let network_addr = to_numeric(subnet.network());
    if to_numeric(start) == network_addr || to_numeric(end) == network_addr {
        return Err(AddressError::InvalidSubnet(
            "provision range may not include the network address".into(),
        ));
    }
    if let Some(bcast) = broadcast(subnet)
        && (start == bcast || end == bcast)
    {
        return Err(AddressError::InvalidSubnet(
            "provision range may not include the broadcast address".into(),
        ));
    }
    Ok(())
}

/// The number of bits permitted for a subnet of the given family, per §3:
/// 8..30 for v4, 8..128 for v6.
pub fn valid_prefix_bits(bits: u8, family: AddressFamily) -> bool {
    match family {
        AddressFamily::Ipv4 => (8..=30).contains(&bits),
        AddressFamily::Ipv6 => (8..=128).contains(&bits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_bounds() {
        let net: IpNetwork = "10.0.1.0/28".parse().unwrap();
        let (start, end) = subnet_bounds(&net);
        assert_eq!(start.to_string(), "10.0.1.0");
        assert_eq!(end.to_string(), "10.0.1.15");
    }

    #[test]
    fn v6_bounds() {
        let net: IpNetwork = "2001:db8::/126".parse().unwrap();
        let (start, end) = subnet_bounds(&net);
        assert_eq!(start.to_string(), "2001:db8::");
        assert_eq!(end.to_string(), "2001:db8::3");
    }

    #[test]
    fn range_rejects_network_and_broadcast() {
        let net: IpNetwork = "10.0.1.0/28".parse().unwrap();
        let network_addr = "10.0.1.0".parse().unwrap();
        let valid_end = "10.0.1.10".parse().unwrap();
        assert!(range_strictly_inside(&net, network_addr, valid_end).is_err());

        let valid_start = "10.0.1.1".parse().unwrap();
        let broadcast_addr = "10.0.1.15".parse().unwrap();
        assert!(range_strictly_inside(&net, valid_start, broadcast_addr).is_err());

        assert!(range_strictly_inside(&net, valid_start, valid_end).is_ok());
    }

    #[test]
    fn prefix_bit_ranges() {
        assert!(valid_prefix_bits(24, AddressFamily::Ipv4));
        assert!(!valid_prefix_bits(31, AddressFamily::Ipv4));
        assert!(!valid_prefix_bits(7, AddressFamily::Ipv4));
        assert!(valid_prefix_bits(64, AddressFamily::Ipv6));
    }
}
