//! Address codec: parsing, formatting, numeric conversion, and subnet math
//! for IPv4/IPv6, shared by every crate that needs to reason about
//! addresses without talking to storage.

pub mod address_family;
pub mod codec;
pub mod subnet;

pub use address_family::{AddressFamily, IdentifyAddressFamily};
pub use codec::AddressError;
pub use ipnetwork::IpNetwork;
