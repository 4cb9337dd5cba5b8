use crate::error::GatewayError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::plc_series::PLCSeries;
// DeviceCode is kept in `src/device_code.rs` and included here so it lives in
// the `crate::device` module scope.
include!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/device_code.rs"));

/// Device memory areas the gateway can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum DeviceType {
    D,
    W,
    R,
    ZR,
    X,
    Y,
    M,
}

impl DeviceType {
    pub const ALL: [Self; 7] = [Self::D, Self::W, Self::R, Self::ZR, Self::X, Self::Y, Self::M];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::D => "D",
            Self::W => "W",
            Self::R => "R",
            Self::ZR => "ZR",
            Self::X => "X",
            Self::Y => "Y",
            Self::M => "M",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup_symbol(s).map(|d| d.device_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ValueKind {
    Word,
    Bit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum NumberBase {
    Decimal,     // 10進数
    Hexadecimal, // 16進数
}

impl NumberBase {
    #[must_use]
    pub const fn radix(&self) -> u32 {
        match self {
            Self::Decimal => 10,
            Self::Hexadecimal => 16,
        }
    }
}

/// Value semantics of a device area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Word { signed: bool },
    Bit,
}

// デバイス定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub device_type: DeviceType,
    pub class: DeviceClass,
    pub default_base: NumberBase, // 表記が10進数or16進数
    pub device_code: DeviceCode,  // デバイスコード
    pub max_address: u32,
    /// Device-count ceiling for one protocol call.
    pub max_per_request: usize,
    pub description: &'static str,
}

pub const DEFAULT_MAX_PER_REQUEST: usize = 32;

const X_Y_MAX_ADDRESS: u32 = 0x2FFF;
const R_MAX_ADDRESS: u32 = 32767;
const WIDE_MAX_ADDRESS: u32 = 0x00FF_FFFF;

static DEVICES: [DeviceDescriptor; 7] = [
    DeviceDescriptor {
        device_type: DeviceType::D,
        class: DeviceClass::Word { signed: true },
        default_base: NumberBase::Decimal,
        device_code: DeviceCode::D,
        max_address: WIDE_MAX_ADDRESS,
        max_per_request: DEFAULT_MAX_PER_REQUEST,
        description: "data register",
    },
    DeviceDescriptor {
        device_type: DeviceType::W,
        class: DeviceClass::Word { signed: true },
        default_base: NumberBase::Decimal,
        device_code: DeviceCode::W,
        max_address: WIDE_MAX_ADDRESS,
        max_per_request: DEFAULT_MAX_PER_REQUEST,
        description: "link register",
    },
    DeviceDescriptor {
        device_type: DeviceType::R,
        class: DeviceClass::Word { signed: true },
        default_base: NumberBase::Decimal,
        device_code: DeviceCode::R,
        max_address: R_MAX_ADDRESS,
        max_per_request: DEFAULT_MAX_PER_REQUEST,
        description: "file register (block switching)",
    },
    DeviceDescriptor {
        device_type: DeviceType::ZR,
        class: DeviceClass::Word { signed: true },
        default_base: NumberBase::Decimal,
        device_code: DeviceCode::ZR,
        max_address: WIDE_MAX_ADDRESS,
        max_per_request: DEFAULT_MAX_PER_REQUEST,
        description: "file register (serial number)",
    },
    DeviceDescriptor {
        device_type: DeviceType::X,
        class: DeviceClass::Bit,
        default_base: NumberBase::Hexadecimal,
        device_code: DeviceCode::X,
        max_address: X_Y_MAX_ADDRESS,
        max_per_request: DEFAULT_MAX_PER_REQUEST,
        description: "input relay",
    },
    DeviceDescriptor {
        device_type: DeviceType::Y,
        class: DeviceClass::Bit,
        default_base: NumberBase::Hexadecimal,
        device_code: DeviceCode::Y,
        max_address: X_Y_MAX_ADDRESS,
        max_per_request: DEFAULT_MAX_PER_REQUEST,
        description: "output relay",
    },
    DeviceDescriptor {
        device_type: DeviceType::M,
        class: DeviceClass::Bit,
        default_base: NumberBase::Decimal,
        device_code: DeviceCode::M,
        max_address: WIDE_MAX_ADDRESS,
        max_per_request: DEFAULT_MAX_PER_REQUEST,
        description: "internal relay",
    },
];

/// Map from symbol string to descriptor for O(1) lookup.
static DEVICE_BY_SYMBOL: Lazy<HashMap<&'static str, &'static DeviceDescriptor>> =
    Lazy::new(|| DEVICES.iter().map(|d| (d.device_type.as_str(), d)).collect());

/// Map from numeric device code (u8) to descriptor.
static DEVICE_BY_CODE: Lazy<HashMap<u8, &'static DeviceDescriptor>> =
    Lazy::new(|| DEVICES.iter().map(|d| (d.device_code.0, d)).collect());

impl DeviceDescriptor {
    #[must_use]
    pub const fn value_kind(&self) -> ValueKind {
        match self.class {
            DeviceClass::Word { .. } => ValueKind::Word,
            DeviceClass::Bit => ValueKind::Bit,
        }
    }

    #[must_use]
    pub const fn is_bit(&self) -> bool {
        matches!(self.class, DeviceClass::Bit)
    }

    #[must_use]
    pub fn symbol_str(&self) -> &'static str {
        self.device_type.as_str()
    }

    /// Typed value for one raw wire unit.
    #[must_use]
    pub fn encode_value(&self, raw: u16) -> i32 {
        match self.class {
            #[allow(clippy::cast_possible_wrap)]
            DeviceClass::Word { signed: true } => i32::from(raw as i16),
            DeviceClass::Word { signed: false } => i32::from(raw),
            DeviceClass::Bit => i32::from(raw & 1),
        }
    }

    /// Decode one 2-byte little-endian wire unit.
    ///
    /// Word devices yield one value; bit devices yield 16 flags, lowest
    /// device number first.
    pub fn decode_raw_unit(&self, bytes: &[u8]) -> Result<Vec<i32>, GatewayError> {
        let [lo, hi] = bytes else {
            return Err(GatewayError::MalformedResponse(format!(
                "expected a 2-byte unit for {}, got {} bytes",
                self.symbol_str(),
                bytes.len()
            )));
        };
        let raw = u16::from_le_bytes([*lo, *hi]);
        Ok(match self.class {
            DeviceClass::Word { .. } => vec![self.encode_value(raw)],
            DeviceClass::Bit => (0..16).map(|i| self.encode_value(raw >> i)).collect(),
        })
    }

    /// Device field for a request: address then code, widths per series.
    pub fn device_field(&self, address: u32, series: PLCSeries) -> Result<Vec<u8>, GatewayError> {
        if address > series.max_encodable_address() {
            return Err(GatewayError::Encoding(format!(
                "address {address} of {} does not fit a {} series device field",
                self.symbol_str(),
                series.as_str()
            )));
        }
        let mut out = Vec::with_capacity(series.device_field_width());
        out.extend_from_slice(&address.to_le_bytes()[..series.address_width()]);
        out.extend_from_slice(&self.device_code.to_bytes(series));
        Ok(out)
    }
}

/// Descriptor for a device type. Infallible for the closed set.
#[must_use]
pub fn lookup(device_type: DeviceType) -> &'static DeviceDescriptor {
    match device_type {
        DeviceType::D => &DEVICES[0],
        DeviceType::W => &DEVICES[1],
        DeviceType::R => &DEVICES[2],
        DeviceType::ZR => &DEVICES[3],
        DeviceType::X => &DEVICES[4],
        DeviceType::Y => &DEVICES[5],
        DeviceType::M => &DEVICES[6],
    }
}

/// Lookup by symbol (e.g. "D", "zr"). Case-insensitive.
pub fn lookup_symbol(sym: &str) -> Result<&'static DeviceDescriptor, GatewayError> {
    let up = sym.trim().to_ascii_uppercase();
    DEVICE_BY_SYMBOL
        .get(up.as_str())
        .copied()
        .ok_or_else(|| GatewayError::UnknownDeviceType {
            text: sym.to_string(),
            device: up,
        })
}

/// Lookup by numeric device code (u8).
#[must_use]
pub fn by_code(code: u8) -> Option<&'static DeviceDescriptor> {
    DEVICE_BY_CODE.get(&code).copied()
}

#[must_use]
pub fn supported_device_types() -> Vec<DeviceType> {
    DEVICES.iter().map(|d| d.device_type).collect()
}

#[must_use]
pub fn descriptors() -> &'static [DeviceDescriptor] {
    &DEVICES
}
