use std::time::Duration;

use thiserror::Error;

use crate::error_codes::ProtocolErrorKind;

#[derive(Error, Debug)]
pub enum GatewayError {
    // --- parse-time: never abort a batch ---
    #[error("unknown device type '{device}' in '{text}'")]
    UnknownDeviceType { text: String, device: String },

    #[error("invalid address in '{text}': {reason}")]
    InvalidAddress { text: String, reason: String },

    #[error("invalid length in '{text}': must be a positive integer")]
    InvalidLength { text: String },

    #[error("invalid device specification: '{text}'")]
    InvalidSpecFormat { text: String },

    // --- transport-time: trigger fallback ---
    #[error("connection error: {0}")]
    Connection(String),

    #[error("no response within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    // --- protocol-semantic ---
    #[error("PLC end code 0x{code:04X} ({kind}: {description})")]
    Protocol {
        code: u16,
        kind: ProtocolErrorKind,
        description: String,
    },

    // --- structural ---
    #[error("invalid batch request: {0}")]
    InvalidBatchRequest(String),

    #[error("request too large: {requested} exceeds maximum {max}")]
    RequestTooLarge { requested: usize, max: usize },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Taxonomy name reported next to the message in batch results.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownDeviceType { .. } => "UnknownDeviceTypeError",
            Self::InvalidAddress { .. } => "InvalidAddressError",
            Self::InvalidLength { .. } => "InvalidLengthError",
            Self::InvalidSpecFormat { .. } => "InvalidSpecFormatError",
            Self::Connection(_) => "ConnectionError",
            Self::ConnectionTimeout(_) => "ConnectionTimeoutError",
            Self::MalformedResponse(_) => "MalformedResponseError",
            Self::Protocol { kind, .. } => kind.error_name(),
            Self::InvalidBatchRequest(_) => "InvalidBatchRequestError",
            Self::RequestTooLarge { .. } => "RequestTooLargeError",
            Self::Encoding(_) => "EncodingError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// True for failures raised while parsing a device reference.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownDeviceType { .. }
                | Self::InvalidAddress { .. }
                | Self::InvalidLength { .. }
                | Self::InvalidSpecFormat { .. }
        )
    }

    /// End code carried by a protocol error, if any.
    #[must_use]
    pub const fn end_code(&self) -> Option<u16> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}
