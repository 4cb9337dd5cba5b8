use std::time::Duration;

use crate::mc_define::AccessRoute;
use crate::plc_series::PLCSeries;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5511;
pub const DEFAULT_TIMEOUT_SECS: f64 = 3.0;

/// Where and how to reach one PLC. Passed into every read call.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Bound for connect and for each read/write, in seconds.
    pub timeout_secs: f64,
    pub series: PLCSeries,
    /// 3E access route (5 bytes)
    pub access_route: AccessRoute,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            series: PLCSeries::default(),
            access_route: AccessRoute::default(),
        }
    }
    /// Direct connection using the default access route `[0x00, 0xFF, 0xFF, 0x03, 0x00]`.
    #[must_use]
    pub fn direct(host: impl Into<String>, port: u16) -> Self {
        Self::new().with_host(host).with_port(port)
    }
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: f64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
    #[must_use]
    pub const fn with_series(mut self, series: PLCSeries) -> Self {
        self.series = series;
        self
    }
    #[must_use]
    pub const fn with_access_route(mut self, route: AccessRoute) -> Self {
        self.access_route = route;
        self
    }

    /// "host:port"
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout as a `Duration`. Non-finite or negative values become zero.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::ZERO)
    }

    /// Monitoring timer field in 0.25 s units, clamped to 1..=0xFFFF.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn monitoring_timer(&self) -> u16 {
        let quarters = (self.timeout().as_secs_f64() * 4.0).ceil();
        quarters.clamp(1.0, f64::from(u16::MAX)) as u16
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConnectionConfig::default();
        assert_eq!(c.addr(), "127.0.0.1:5511");
        assert_eq!(c.timeout(), Duration::from_secs(3));
        assert_eq!(c.series, PLCSeries::R);
        assert_eq!(c.access_route, AccessRoute::default());
    }

    #[test]
    fn monitoring_timer_units() {
        let c = ConnectionConfig::direct("10.0.0.5", 5000).with_timeout_secs(3.0);
        assert_eq!(c.monitoring_timer(), 12);
        assert_eq!(c.with_timeout_secs(0.0).monitoring_timer(), 1);
        let big = ConnectionConfig::new().with_timeout_secs(1.0e9);
        assert_eq!(big.monitoring_timer(), 0xFFFF);
        let bad = ConnectionConfig::new().with_timeout_secs(-2.0);
        assert_eq!(bad.timeout(), Duration::ZERO);
        assert_eq!(bad.monitoring_timer(), 1);
    }
}
