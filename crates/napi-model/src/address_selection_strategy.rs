/// How the allocator should select a candidate width when handing out an
/// address from a network's provision range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSelectionStrategy {
    /// Allocate the next available single address: a /32 for IPv4, a /128
    /// for IPv6. This is the only strategy the HTTP surface can request.
    NextAvailableIp,

    /// Allocate the next available contiguous block of the given prefix
    /// length (e.g. a /30 for a four-address-per-nic fabric network).
    /// Exercised only by `Network.fabric` networks internally; never
    /// requested directly by a caller.
    NextAvailablePrefix(u8),
}

impl AddressSelectionStrategy {
    /// The number of addresses a single allocation under this strategy
    /// consumes, given the network's address family width in bits.
    pub fn block_width_bits(self, family_bits: u8) -> u8 {
        match self {
            AddressSelectionStrategy::NextAvailableIp => family_bits,
            AddressSelectionStrategy::NextAvailablePrefix(bits) => bits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_available_ip_uses_the_full_width() {
        assert_eq!(
            AddressSelectionStrategy::NextAvailableIp.block_width_bits(32),
            32
        );
    }

    #[test]
    fn next_available_prefix_uses_its_own_width() {
        assert_eq!(
            AddressSelectionStrategy::NextAvailablePrefix(30).block_width_bits(32),
            30
        );
    }
}
