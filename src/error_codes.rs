//! MC 終了コード（エラーコード）一覧と種別判定
//!
//! 終了コード表は `error_codes.toml` を埋め込み、初回参照時に一度だけ解析して
//! 不変のマップとして保持します。実行時の登録・上書きはできません。
//! 表にないコードは `ProtocolErrorKind::Unknown` として扱います。

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::GatewayError;

/// Named subtype of a PLC-reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ProtocolErrorKind {
    DeviceRange,
    TargetBusy,
    CpuError,
    UnsupportedCommand,
    InvalidRequest,
    Unknown,
}

impl ProtocolErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceRange => "device range error",
            Self::TargetBusy => "target busy",
            Self::CpuError => "CPU error",
            Self::UnsupportedCommand => "unsupported command",
            Self::InvalidRequest => "invalid request",
            Self::Unknown => "unknown protocol error",
        }
    }

    #[must_use]
    pub const fn error_name(&self) -> &'static str {
        match self {
            Self::DeviceRange => "DeviceRangeError",
            Self::TargetBusy => "TargetBusyError",
            Self::CpuError => "CpuError",
            Self::UnsupportedCommand => "UnsupportedCommandError",
            Self::InvalidRequest => "InvalidRequestError",
            Self::Unknown => "UnknownProtocolError",
        }
    }
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorCodeEntry {
    // TOML では16進表記を文字列で書くことが多いので文字列/数値の両方を受け取れるようにする
    #[serde(deserialize_with = "parse_hex_or_int")]
    code: u16,
    name: Option<String>,
    kind: Option<ProtocolErrorKind>,
    description: Option<String>,
}

// serde 用ヘルパ: 整数または "0x...." 形式の文字列を u16 に変換する
fn parse_hex_or_int<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct V;
    impl serde::de::Visitor<'_> for V {
        type Value = u16;
        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "hex string like 0xNNNN or integer")
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u16::try_from(v).map_err(|_| E::custom(format!("value out of range: {v}")))
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u16::try_from(v).map_err(|_| E::custom(format!("value out of range: {v}")))
        }
        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let s = s.trim();
            s.strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .map_or_else(
                    || {
                        s.parse::<u16>()
                            .map_err(|e| E::custom(format!("parse int: {e}")))
                    },
                    |h| u16::from_str_radix(h, 16).map_err(|e| E::custom(format!("parse hex: {e}"))),
                )
        }
    }
    deserializer.deserialize_any(V)
}

#[derive(Debug, Deserialize)]
struct ErrorCodesToml {
    #[serde(default)]
    codes: Vec<ErrorCodeEntry>,
}

/// One resolved entry of the end-code table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndCodeEntry {
    pub code: u16,
    pub name: Option<String>,
    pub kind: ProtocolErrorKind,
    pub description: Option<String>,
}

/// Immutable end-code lookup table.
#[derive(Debug, Default)]
pub struct ErrorTable {
    by_code: HashMap<u16, EndCodeEntry>,
}

impl ErrorTable {
    /// Parse a TOML document into a table. Later duplicates replace earlier ones.
    pub fn parse_toml(s: &str) -> Result<Self, GatewayError> {
        let parsed: ErrorCodesToml = toml::from_str(s)
            .map_err(|e| GatewayError::Config(format!("error_codes.toml parse error: {e}")))?;
        let by_code = parsed
            .codes
            .into_iter()
            .map(|e| {
                (
                    e.code,
                    EndCodeEntry {
                        code: e.code,
                        name: e.name,
                        kind: e.kind.unwrap_or(ProtocolErrorKind::Unknown),
                        description: e.description,
                    },
                )
            })
            .collect();
        Ok(Self { by_code })
    }

    #[must_use]
    pub fn get(&self, code: u16) -> Option<&EndCodeEntry> {
        self.by_code.get(&code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Map a nonzero end code to a `GatewayError::Protocol`.
    #[must_use]
    pub fn to_error(&self, code: u16) -> GatewayError {
        let (kind, description) = self.get(code).map_or_else(
            || (ProtocolErrorKind::Unknown, "unrecognized end code".to_string()),
            |e| {
                (
                    e.kind,
                    e.description
                        .clone()
                        .unwrap_or_else(|| e.kind.as_str().to_string()),
                )
            },
        );
        GatewayError::Protocol {
            code,
            kind,
            description,
        }
    }
}

impl std::str::FromStr for ErrorTable {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_toml(s)
    }
}

static BUILTIN_TABLE: Lazy<ErrorTable> = Lazy::new(|| {
    match ErrorTable::parse_toml(include_str!("error_codes.toml")) {
        Ok(t) => t,
        Err(e) => {
            // 空の表: すべて Unknown 扱い
            tracing::error!("failed to parse embedded error_codes.toml: {}", e);
            ErrorTable::default()
        }
    }
});

/// The built-in table parsed from the embedded `error_codes.toml`.
#[must_use]
pub fn builtin() -> &'static ErrorTable {
    &BUILTIN_TABLE
}

#[must_use]
pub fn code_kind(code: u16) -> ProtocolErrorKind {
    builtin()
        .get(code)
        .map_or(ProtocolErrorKind::Unknown, |e| e.kind)
}

#[must_use]
pub fn code_name(code: u16) -> Option<String> {
    builtin().get(code).and_then(|e| e.name.clone())
}

#[must_use]
pub fn code_description(code: u16) -> Option<String> {
    builtin().get(code).and_then(|e| e.description.clone())
}

/// Convert a nonzero end code into the matching protocol error.
#[must_use]
pub fn protocol_error(code: u16) -> GatewayError {
    builtin().to_error(code)
}
