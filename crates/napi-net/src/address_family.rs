/// A representation of an address family, which makes certain APIs more
/// composable if we can construct this as a type rather than branch on
/// `IpAddr::V4`/`IpAddr::V6` everywhere it matters.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn bits(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => 32,
            AddressFamily::Ipv6 => 128,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

pub trait IdentifyAddressFamily {
    /// Return the address family for this value.
    fn address_family(&self) -> AddressFamily;

    /// Check whether this value matches the specified `family`.
    fn is_address_family(&self, family: AddressFamily) -> bool {
        family == self.address_family()
    }

    fn require_address_family_or_else<F, E>(self, family: AddressFamily, err: F) -> Result<Self, E>
    where
        Self: Sized,
        F: FnOnce(Self) -> E,
    {
        match self.is_address_family(family) {
            true => Ok(self),
            false => Err(err(self)),
        }
    }
}

impl IdentifyAddressFamily for std::net::IpAddr {
    fn address_family(&self) -> AddressFamily {
        match self {
            std::net::IpAddr::V4(_) => AddressFamily::Ipv4,
            std::net::IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl IdentifyAddressFamily for ipnet::IpNet {
    fn address_family(&self) -> AddressFamily {
        match self {
            ipnet::IpNet::V4(_) => AddressFamily::Ipv4,
            ipnet::IpNet::V6(_) => AddressFamily::Ipv6,
        }
    }
}

#[cfg(feature = "ipnetwork")]
impl IdentifyAddressFamily for ipnetwork::IpNetwork {
    fn address_family(&self) -> AddressFamily {
        match self {
            ipnetwork::IpNetwork::V4(_) => AddressFamily::Ipv4,
            ipnetwork::IpNetwork::V6(_) => AddressFamily::Ipv6,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::str::FromStr;

    use super::*;

    #[test]
    fn require_address_family_or_else_passes_on_match() {
        let addr = IpAddr::from_str("127.0.0.1").unwrap();
        assert_eq!(
            addr.require_address_family_or_else(AddressFamily::Ipv4, |_| {}),
            Ok(addr),
        );
    }

    #[test]
    fn require_address_family_or_else_fails_on_mismatch() {
        let addr = IpAddr::from_str("127.0.0.1").unwrap();
        assert_eq!(
            addr.require_address_family_or_else(AddressFamily::Ipv6, |_| 42),
            Err(42)
        );
    }
}
