use crate::error::GatewayError;
use crate::mc_define::AccessRoute;
use crate::mc_define::MC_SUBHEADER_REQUEST;

/// Default monitoring timer: 0x0010 x 0.25 s = 4 s.
pub const DEFAULT_MONITORING_TIMER: u16 = 0x0010;

// McRequest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McRequest {
    pub subheader: [u8; 2],
    pub access_route: AccessRoute,
    pub request_data_len: u16,
    pub monitoring_timer: u16, // unit: 0.25 seconds, valid range: 0x0001 to 0xFFFF
    /// Command(2) + subcommand(2) + command payload.
    pub request_data: Vec<u8>,
}

impl Default for McRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl McRequest {
    /// Builder for 3E request frames.
    ///
    /// `McRequest` は 3E 要求フレーム（サブヘッダ、アクセス経路、監視タイマ、
    /// 要求データ）を組み立てるための構造体です。
    ///
    /// 例:
    /// ```no_run
    /// let req = mc_gateway::request::McRequest::new()
    ///     .with_access_route(mc_gateway::mc_define::AccessRoute::default())
    ///     .try_with_request_data([0x01u8, 0x04, 0x00, 0x00]).unwrap();
    /// let frame = req.build();
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subheader: MC_SUBHEADER_REQUEST,
            access_route: AccessRoute {
                network_number: 0x00,
                pc_number: 0xFF,
                io_number: 0x03FF,
                station_number: 0x00,
            },
            request_data_len: 2,
            monitoring_timer: DEFAULT_MONITORING_TIMER,
            request_data: Vec::new(),
        }
    }
    #[must_use]
    pub const fn with_access_route(mut self, access_route: AccessRoute) -> Self {
        self.access_route = access_route;
        self
    }
    #[must_use]
    pub const fn with_monitoring_timer(mut self, monitoring_timer: u16) -> Self {
        self.monitoring_timer = monitoring_timer;
        self
    }

    /// Set command data. Fails when the data would overflow the u16 length field.
    pub fn try_with_request_data<R: AsRef<[u8]>>(
        mut self,
        request_data: R,
    ) -> Result<Self, GatewayError> {
        let slice = request_data.as_ref();
        // length includes the 2-byte monitoring timer
        let total_len = slice
            .len()
            .checked_add(2)
            .ok_or_else(|| GatewayError::Encoding("request_data length overflow".into()))?;
        let len_u16 = u16::try_from(total_len).map_err(|_| {
            GatewayError::Encoding("request_data too large to fit into u16".into())
        })?;
        self.request_data_len = len_u16;
        self.request_data = slice.to_vec();
        Ok(self)
    }

    /// Command code from the request data, if present.
    #[must_use]
    pub fn command(&self) -> Option<u16> {
        self.request_data
            .get(0..2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    #[must_use]
    pub fn subcommand(&self) -> Option<u16> {
        self.request_data
            .get(2..4)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Bytes after command and subcommand.
    #[must_use]
    pub fn command_payload(&self) -> &[u8] {
        self.request_data.get(4..).unwrap_or(&[])
    }

    // 3E: subheader(2) + access_route(5) + data_len(2) + monitor_timer(2, LE) + data...
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(11 + self.request_data.len());
        payload.extend_from_slice(&self.subheader);
        payload.extend_from_slice(&self.access_route.to_bytes());
        payload.extend_from_slice(&self.request_data_len.to_le_bytes());
        payload.extend_from_slice(&self.monitoring_timer.to_le_bytes());
        payload.extend_from_slice(&self.request_data);
        payload
    }

    /// Construct an `McRequest` from a raw incoming frame. This is the inverse
    /// of `build` and is what a server uses to interpret requests.
    pub fn try_from_payload(payload: &[u8]) -> Result<Self, GatewayError> {
        let pr = crate::mc_frame::parse_frame(payload)?;
        let Some(monitoring_timer) = pr.monitor_timer else {
            return Err(GatewayError::MalformedResponse(
                "expected a request frame, got a response subheader".into(),
            ));
        };
        Ok(Self {
            subheader: pr.subheader,
            access_route: pr.access_route,
            request_data_len: pr.data_len,
            monitoring_timer,
            request_data: pr.data(payload).to_vec(),
        })
    }
}
