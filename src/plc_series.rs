use serde::{Deserialize, Serialize};

/// Addressing family of the target CPU.
///
/// Q 系列はデバイス番号3バイト + デバイスコード1バイト、
/// iQ-R 系列はデバイス番号4バイト + デバイスコード2バイトで要求を組み立てます。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum PLCSeries {
    Q,
    #[default]
    R,
}

impl PLCSeries {
    /// Parse PLC series from string like "Q" or "R" (also "iQ-R").
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Q" | "q" => Some(Self::Q),
            "R" | "r" | "iQ-R" | "IQ-R" | "iq-r" => Some(Self::R),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Q => "Q",
            Self::R => "R",
        }
    }

    /// Bytes used for the device number in a device field.
    #[must_use]
    pub const fn address_width(&self) -> usize {
        match self {
            Self::Q => 3,
            Self::R => 4,
        }
    }

    /// Bytes used for the device code in a device field.
    #[must_use]
    pub const fn device_code_width(&self) -> usize {
        match self {
            Self::Q => 1,
            Self::R => 2,
        }
    }

    /// Largest device number that fits the address field.
    #[must_use]
    pub const fn max_encodable_address(&self) -> u32 {
        match self {
            Self::Q => 0x00FF_FFFF,
            Self::R => u32::MAX,
        }
    }

    /// Width of a full device field (address + code).
    #[must_use]
    pub const fn device_field_width(&self) -> usize {
        self.address_width() + self.device_code_width()
    }
}

impl std::str::FromStr for PLCSeries {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s).ok_or(())
    }
}

impl std::fmt::Display for PLCSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
