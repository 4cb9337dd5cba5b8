//! Textual device references (`D100`, `D100:5`, `X1A`, `M0x10`, `YH20`).
//!
//! 文法: 先頭の英字がデバイス種別（大文字小文字を区別しない）、続いてデバイス番号、
//! 任意で `:` + 点数。番号は `0x` 接頭辞、またはデバイス記号直後の `H` で16進指定になり、
//! それ以外はデバイスごとの既定の基数で解釈します。

use std::fmt;

use crate::device::{self, DeviceDescriptor, DeviceType, NumberBase};
use crate::error::GatewayError;

/// One parsed device reference within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub device_type: DeviceType,
    pub address: u32,
    pub length: u32,
    pub resolved_base: NumberBase,
    pub original_index: usize,
    /// The text the caller supplied, used as the result label.
    pub label: String,
}

impl DeviceSpec {
    /// Parse a reference outside of a batch (index 0).
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        Self::parse_indexed(text, 0)
    }

    pub fn parse_indexed(text: &str, original_index: usize) -> Result<Self, GatewayError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(format_error(text));
        }

        let (head, length_token) = match trimmed.split_once(':') {
            Some((h, l)) => (h.trim(), Some(l.trim())),
            None => (trimmed, None),
        };

        let letters_len = head
            .bytes()
            .take_while(u8::is_ascii_alphabetic)
            .count();
        if letters_len == 0 {
            return Err(format_error(text));
        }
        let letters = head[..letters_len].to_ascii_uppercase();

        let (descriptor, symbol_len, h_marker) = resolve_symbol(&letters).ok_or_else(|| {
            GatewayError::UnknownDeviceType {
                text: text.to_string(),
                device: letters.clone(),
            }
        })?;

        let skip = symbol_len + usize::from(h_marker);
        let mut token = head[skip..].trim();
        let mut resolved_base = if h_marker {
            NumberBase::Hexadecimal
        } else {
            descriptor.default_base
        };
        if let Some(rest) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            token = rest;
            resolved_base = NumberBase::Hexadecimal;
        }
        if token.is_empty() {
            return Err(format_error(text));
        }

        let address = parse_address(text, token, resolved_base)?;
        let length = match length_token {
            None => 1,
            Some(l) => parse_length(text, l)?,
        };

        check_range(text, descriptor, address, length)?;

        Ok(Self {
            device_type: descriptor.device_type,
            address,
            length,
            resolved_base,
            original_index,
            label: text.to_string(),
        })
    }

    /// Build a spec from already-split parts, e.g. a `device` / `address` /
    /// `length` triple from a request body. The label is the canonical name.
    pub fn from_parts(device: &str, address: u32, length: u32) -> Result<Self, GatewayError> {
        let descriptor = device::lookup_symbol(device)?;
        let text = format!("{}{}:{}", descriptor.symbol_str(), address, length);
        if length == 0 {
            return Err(GatewayError::InvalidLength { text });
        }
        check_range(&text, descriptor, address, length)?;
        let mut spec = Self {
            device_type: descriptor.device_type,
            address,
            length,
            resolved_base: descriptor.default_base,
            original_index: 0,
            label: String::new(),
        };
        spec.label = spec.to_string();
        Ok(spec)
    }

    #[must_use]
    pub fn descriptor(&self) -> &'static DeviceDescriptor {
        device::lookup(self.device_type)
    }

    /// Canonical device name in the device's default notation, e.g. `X1A`, `D100`.
    #[must_use]
    pub fn device_name(&self) -> String {
        match self.descriptor().default_base {
            NumberBase::Hexadecimal => format!("{}{:X}", self.device_type, self.address),
            NumberBase::Decimal => format!("{}{}", self.device_type, self.address),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.length == 1 {
            f.write_str(&self.device_name())
        } else {
            write!(f, "{}:{}", self.device_name(), self.length)
        }
    }
}

impl std::str::FromStr for DeviceSpec {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// True when `text` parses as a device reference.
#[must_use]
pub fn validate_device_spec(text: &str) -> bool {
    DeviceSpec::parse(text).is_ok()
}

// Longest registered symbol that prefixes `letters`, plus whether an `H`
// marker follows it. Letters left over after the symbol belong to the address
// token (hex digits on X/Y).
fn resolve_symbol(letters: &str) -> Option<(&'static DeviceDescriptor, usize, bool)> {
    let symbol_len = (1..=letters.len())
        .rev()
        .find(|&n| device::lookup_symbol(&letters[..n]).is_ok())?;
    let descriptor = device::lookup_symbol(&letters[..symbol_len]).ok()?;
    let rest = &letters[symbol_len..];
    let h_marker = rest.starts_with('H');
    let remaining = if h_marker { &rest[1..] } else { rest };
    // 残りの英字は16進数字でなければ未知のデバイス記号とみなす
    let hex_allowed = h_marker || descriptor.default_base == NumberBase::Hexadecimal;
    if !remaining.is_empty() && !(hex_allowed && remaining.bytes().all(|b| b.is_ascii_hexdigit()))
    {
        return None;
    }
    Some((descriptor, symbol_len, h_marker))
}

fn check_range(
    text: &str,
    descriptor: &DeviceDescriptor,
    address: u32,
    length: u32,
) -> Result<(), GatewayError> {
    let last = u64::from(address) + u64::from(length) - 1;
    if last <= u64::from(descriptor.max_address) {
        return Ok(());
    }
    let reason = if length == 1 {
        format!(
            "{} exceeds the maximum {} address {}",
            address,
            descriptor.symbol_str(),
            descriptor.max_address
        )
    } else {
        format!(
            "range {}..={} exceeds the maximum {} address {}",
            address,
            last,
            descriptor.symbol_str(),
            descriptor.max_address
        )
    };
    Err(GatewayError::InvalidAddress {
        text: text.to_string(),
        reason,
    })
}

fn parse_address(text: &str, token: &str, base: NumberBase) -> Result<u32, GatewayError> {
    let invalid = |reason: String| GatewayError::InvalidAddress {
        text: text.to_string(),
        reason,
    };
    if token.starts_with('-') {
        return Err(invalid(format!("negative address '{token}'")));
    }
    let valid_digits = match base {
        NumberBase::Decimal => token.bytes().all(|b| b.is_ascii_digit()),
        NumberBase::Hexadecimal => token.bytes().all(|b| b.is_ascii_hexdigit()),
    };
    if !valid_digits {
        return Err(invalid(format!(
            "'{token}' is not a {} number",
            match base {
                NumberBase::Decimal => "decimal",
                NumberBase::Hexadecimal => "hexadecimal",
            }
        )));
    }
    u32::from_str_radix(token, base.radix())
        .map_err(|e| invalid(format!("'{token}' is out of range: {e}")))
}

fn parse_length(text: &str, token: &str) -> Result<u32, GatewayError> {
    let invalid = || GatewayError::InvalidLength {
        text: text.to_string(),
    };
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match token.parse::<u32>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(n) => Ok(n),
    }
}

fn format_error(text: &str) -> GatewayError {
    GatewayError::InvalidSpecFormat {
        text: text.to_string(),
    }
}
