//! Small pieces of request-decoding shared by more than one resource's
//! handlers: the `limit`/`offset` pair every listing endpoint takes, and
//! parsing a mac address given as colon-hex, bare hex, or decimal (§6).

use mac_address::MacAddress;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    1000
}

/// Accepts `aa:bb:cc:dd:ee:ff`, the bare hex form `aabbccddeeff`, or the
/// decimal integer `nic_state_machine::mac_key` uses as a storage key.
pub fn parse_mac(raw: &str) -> Option<MacAddress> {
    if let Ok(mac) = raw.parse::<MacAddress>() {
        return Some(mac);
    }
    if let Ok(num) = raw.parse::<u64>()
        && num <= 0xFFFF_FFFF_FFFF
    {
        let bytes = num.to_be_bytes();
        return Some(MacAddress::new([
            bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]));
    }
    if raw.len() == 12 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&raw[i * 2..i * 2 + 2], 16).ok()?;
        }
        return Some(MacAddress::new(bytes));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_hex() {
        assert!(parse_mac("aa:bb:cc:dd:ee:ff").is_some());
    }

    #[test]
    fn parses_bare_hex() {
        let mac = parse_mac("aabbccddeeff").unwrap();
        assert_eq!(mac.bytes(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn parses_decimal() {
        let mac = parse_mac("1").unwrap();
        assert_eq!(mac.bytes(), [0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_mac("not-a-mac").is_none());
    }
}
