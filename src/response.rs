use crate::error::GatewayError;
use crate::error_codes;
use crate::mc_define::{AccessRoute, MC_END_OK, MC_SUBHEADER_RESPONSE};
use crate::mc_frame::parse_frame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McResponse {
    pub subheader: [u8; 2],
    pub access_route: AccessRoute,
    pub end_code: u16,
    /// Response data after the end code. On an error end code this is the
    /// error information block.
    pub data: Vec<u8>,
}

impl McResponse {
    /// Parse a raw 3E response frame.
    ///
    /// # Errors
    ///
    /// Returns `Err(GatewayError::MalformedResponse)` when the frame is not a
    /// complete response frame.
    pub fn try_new(payload: &[u8]) -> Result<Self, GatewayError> {
        let pr = parse_frame(payload)?;
        let Some(end_code) = pr.end_code else {
            return Err(GatewayError::MalformedResponse(format!(
                "unexpected subheader {:02X} {:02X} in response",
                pr.subheader[0], pr.subheader[1]
            )));
        };
        Ok(Self {
            subheader: pr.subheader,
            access_route: pr.access_route,
            end_code,
            data: pr.data(payload).to_vec(),
        })
    }

    /// Successful response carrying `data`.
    #[must_use]
    pub fn ok(access_route: AccessRoute, data: Vec<u8>) -> Self {
        Self {
            subheader: MC_SUBHEADER_RESPONSE,
            access_route,
            end_code: MC_END_OK,
            data,
        }
    }

    /// Error response. The error information block echoes the access route
    /// followed by command and subcommand.
    #[must_use]
    pub fn error(access_route: AccessRoute, end_code: u16, command: u16, subcommand: u16) -> Self {
        let mut data = Vec::with_capacity(9);
        data.extend_from_slice(&access_route.to_bytes());
        data.extend_from_slice(&command.to_le_bytes());
        data.extend_from_slice(&subcommand.to_le_bytes());
        Self {
            subheader: MC_SUBHEADER_RESPONSE,
            access_route,
            end_code,
            data,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.end_code == MC_END_OK
    }

    /// The response data on success, the mapped protocol error otherwise.
    pub fn into_result(self) -> Result<Vec<u8>, GatewayError> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(error_codes::protocol_error(self.end_code))
        }
    }

    /// Serialize into a 3E response frame.
    pub fn build(&self) -> Result<Vec<u8>, GatewayError> {
        let data_len = u16::try_from(self.data.len() + 2).map_err(|_| {
            GatewayError::Encoding(format!("response data too large: {}", self.data.len()))
        })?;
        let mut out = Vec::with_capacity(11 + self.data.len());
        out.extend_from_slice(&self.subheader);
        out.extend_from_slice(&self.access_route.to_bytes());
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&self.end_code.to_le_bytes());
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}
