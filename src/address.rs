use core::fmt;

/// A Bluetooth Device Address (`BD_ADDR`) wrapper for type safety
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress(pub [u8; 6]);

impl DeviceAddress {
    /// Create a new device address from bytes
    #[must_use]
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_address_formats_as_colon_hex() {
        let addr = DeviceAddress::new([0x00, 0x1B, 0xDC, 0x07, 0x32, 0xEF]);
        let mut out: heapless::String<32> = heapless::String::new();
        write!(out, "{:?}", addr).unwrap();
        assert_eq!(out.as_str(), "00:1B:DC:07:32:EF");
    }
}
