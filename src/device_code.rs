/// Wire code identifying a device memory area.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DeviceCode(pub u8);

impl DeviceCode {
    pub const D: Self = Self(0xA8);
    pub const W: Self = Self(0xB4);
    pub const R: Self = Self(0xAF);
    pub const ZR: Self = Self(0xB0);
    pub const X: Self = Self(0x9C);
    pub const Y: Self = Self(0x9D);
    pub const M: Self = Self(0x90);

    /// Code bytes for the given series: 1 byte on Q, 2 bytes (LE) on iQ-R.
    #[must_use]
    pub fn to_bytes(self, series: PLCSeries) -> Vec<u8> {
        match series {
            PLCSeries::Q => vec![self.0],
            PLCSeries::R => u16::from(self.0).to_le_bytes().to_vec(),
        }
    }

    /// Read a device code back from a request field.
    pub fn from_bytes(bytes: &[u8], series: PLCSeries) -> Result<Self, GatewayError> {
        match (series, bytes) {
            (PLCSeries::Q, [c]) => Ok(Self(*c)),
            (PLCSeries::R, [lo, 0x00]) => Ok(Self(*lo)),
            _ => Err(GatewayError::Encoding(format!(
                "device code bytes {bytes:02X?} not valid for series {}",
                series.as_str()
            ))),
        }
    }
}

impl From<DeviceCode> for u8 {
    fn from(d: DeviceCode) -> Self {
        d.0
    }
}

impl From<u8> for DeviceCode {
    fn from(v: u8) -> Self {
        Self(v)
    }
}
