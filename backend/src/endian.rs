//! Byte-order helpers for packed table fields.
//!
//! Table fields are little-endian 32-bit words. Ports sit in the low half of
//! such a word in network byte order, addresses occupy the whole word with the
//! first octet in the least significant byte.

use std::net::Ipv4Addr;

/// Extracts the port from a packed port field.
pub fn port_of(packed: u32) -> u16 {
    (packed as u16).swap_bytes()
}

/// Inverse of [`port_of`].
pub fn pack_port(port: u16) -> u32 {
    u32::from(port.swap_bytes())
}

/// Extracts the IPv4 address from a packed address field.
pub fn address_of(packed: u32) -> Ipv4Addr {
    Ipv4Addr::from(packed.to_le_bytes())
}

/// Inverse of [`address_of`].
pub fn pack_address(addr: Ipv4Addr) -> u32 {
    u32::from_le_bytes(addr.octets())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_byte_swapped_low_half() {
        // 8080 = 0x1F90, stored as bytes 1F 90 -> little-endian word 0x901F
        assert_eq!(port_of(0x0000_901F), 8080);
        assert_eq!(port_of(0x0000_5000), 80);
        // High half is ignored
        assert_eq!(port_of(0xDEAD_5000), 80);
    }

    #[test]
    fn port_swap_is_an_involution() {
        for port in [0u16, 1, 80, 443, 8080, 0x1234, u16::MAX] {
            assert_eq!(port_of(pack_port(port)), port);
            assert_eq!(port_of(port_of(u32::from(port)) as u32), port);
        }
    }

    #[test]
    fn address_octets_come_from_least_significant_byte_first() {
        assert_eq!(address_of(0x0100_007F), Ipv4Addr::new(127, 0, 0, 1));
        let addr = Ipv4Addr::new(93, 184, 216, 34);
        assert_eq!(address_of(pack_address(addr)), addr);
        assert_eq!(pack_address(Ipv4Addr::UNSPECIFIED), 0);
    }
}
