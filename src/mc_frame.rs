use crate::error::GatewayError;
use crate::mc_define::{
    AccessRoute, MC_PREFIX_SIZE, MC_REQUEST_HEADER_SIZE, MC_SUBHEADER_REQUEST,
    MC_SUBHEADER_RESPONSE,
};

/// Result of parsing a 3E frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameParseResult {
    pub subheader: [u8; 2],
    pub access_route: AccessRoute,
    /// Data length field as sent (counts the timer or end code).
    pub data_len: u16,
    /// Offset into the original payload where the data bytes start
    pub data_offset: usize,
    /// Number of data bytes (not including monitoring timer / end code)
    pub data_bytes: usize,
    /// Present on response frames
    pub end_code: Option<u16>,
    /// Present on request frames
    pub monitor_timer: Option<u16>,
}

impl FrameParseResult {
    #[must_use]
    pub const fn is_response(&self) -> bool {
        self.end_code.is_some()
    }

    /// Data bytes of the frame this header was parsed from.
    #[must_use]
    pub fn data<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        payload
            .get(self.data_offset..self.data_offset + self.data_bytes)
            .unwrap_or(&[])
    }
}

/// Compute the full frame length from a (possibly partial) buffer.
///
/// Returns `Ok(None)` while fewer than the 9 prefix bytes are available and
/// `Err` when the prefix cannot start a 3E frame.
pub fn detect_frame(buf: &[u8]) -> Result<Option<usize>, GatewayError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let subheader = [buf[0], buf[1]];
    if subheader != MC_SUBHEADER_REQUEST && subheader != MC_SUBHEADER_RESPONSE {
        return Err(GatewayError::MalformedResponse(format!(
            "unexpected subheader {:02X} {:02X}",
            buf[0], buf[1]
        )));
    }
    if buf.len() < MC_PREFIX_SIZE {
        return Ok(None);
    }
    let data_len = usize::from(u16::from_le_bytes([buf[7], buf[8]]));
    if data_len < 2 {
        return Err(GatewayError::MalformedResponse(format!(
            "3E invalid data_len (must be >=2): {data_len}"
        )));
    }
    Ok(Some(MC_PREFIX_SIZE + data_len))
}

/// Parse a complete 3E frame payload into header fields and data offsets.
pub fn parse_frame(payload: &[u8]) -> Result<FrameParseResult, GatewayError> {
    let frame_len = detect_frame(payload)?.ok_or_else(|| {
        GatewayError::MalformedResponse(format!(
            "frame too short: {} bytes, header needs {}",
            payload.len(),
            MC_REQUEST_HEADER_SIZE
        ))
    })?;
    if payload.len() < frame_len {
        return Err(GatewayError::MalformedResponse(format!(
            "3E payload length mismatch: have {} bytes, header announces {}",
            payload.len(),
            frame_len
        )));
    }
    let subheader = [payload[0], payload[1]];
    let access_route =
        AccessRoute::from_bytes([payload[2], payload[3], payload[4], payload[5], payload[6]]);
    let data_len = u16::from_le_bytes([payload[7], payload[8]]);
    // timer (request) or end code (response) sits at 9..11
    let word = u16::from_le_bytes([payload[9], payload[10]]);
    let is_response = subheader == MC_SUBHEADER_RESPONSE;
    Ok(FrameParseResult {
        subheader,
        access_route,
        data_len,
        data_offset: MC_REQUEST_HEADER_SIZE,
        data_bytes: usize::from(data_len) - 2,
        end_code: is_response.then_some(word),
        monitor_timer: (!is_response).then_some(word),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_frame_incomplete_small() {
        let buf: Vec<u8> = vec![MC_SUBHEADER_REQUEST[0]]; // only 1 byte
        let res = detect_frame(&buf).expect("detect_frame call");
        assert!(res.is_none(), "expected None for too-small buffer");
        let res = detect_frame(&[0xD0, 0x00, 0x00, 0xFF]).expect("detect_frame call");
        assert!(res.is_none());
    }

    #[test]
    fn test_detect_frame_header_present() {
        // response prefix announcing 6 bytes (end code + 4 data bytes)
        let buf = vec![0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x06, 0x00];
        assert_eq!(detect_frame(&buf).expect("detect"), Some(15));
    }

    #[test]
    fn test_detect_frame_bad_subheader() {
        assert!(detect_frame(&[0x54, 0x00, 0, 0, 0, 0, 0, 2, 0]).is_err());
        // data_len below 2 cannot hold an end code
        assert!(detect_frame(&[0xD0, 0x00, 0, 0, 0, 0, 0, 1, 0]).is_err());
    }

    #[test]
    fn test_parse_request_monitor_timer() {
        // subheader(2) + access_route(5) + data_len(2) + monitor_timer(2) + 10 bytes data
        let buf = vec![
            0x50, 0x00, // subheader
            0x00, 0xFF, 0xFF, 0x03, 0x00, // access_route
            0x0C, 0x00, // data_len = 12
            0x0A, 0x00, // monitor_timer = 10 (2.5 s)
            // 10 bytes data
            0x01, 0x04, 0x00, 0x00, 0x64, 0x00, 0x00, 0xA8, 0x01, 0x00,
        ];
        let pr = parse_frame(&buf).expect("parse_frame request");
        assert_eq!(pr.subheader, [0x50, 0x00]);
        assert_eq!(pr.access_route, AccessRoute::default());
        assert_eq!(pr.data_len, 12);
        assert_eq!(pr.monitor_timer, Some(10u16));
        assert_eq!(pr.end_code, None);
        assert_eq!(pr.data_bytes, 10usize);
        assert_eq!(pr.data_offset, 11usize);
        assert_eq!(pr.data(&buf)[..2], [0x01, 0x04]);
    }

    #[test]
    fn test_parse_response_end_code() {
        let buf = vec![
            0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x04, 0x00, 0x00, 0x00, 0x39, 0x30,
        ];
        let pr = parse_frame(&buf).expect("parse_frame response");
        assert!(pr.is_response());
        assert_eq!(pr.end_code, Some(0));
        assert_eq!(pr.data(&buf), &[0x39, 0x30]);
    }

    #[test]
    fn test_parse_frame_truncated_error() {
        // header announces 4 data bytes but only 2 present
        let buf = vec![
            0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01, 0x02,
        ];
        assert!(parse_frame(&buf).is_err());
        assert!(parse_frame(&[0x50]).is_err());
    }
}
