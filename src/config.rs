//! Gateway defaults loaded by the embedding application.
//!
//! 設定は値として扱い、グローバルには保持しません。TOML と環境変数
//! (`PLC_IP`, `PLC_PORT`, `PLC_TIMEOUT_SEC`, `PLC_SERIES`) から組み立て、
//! 読出しのたびに `ConnectionConfig` として渡します。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::batch::BatchReadEngine;
use crate::device::DEFAULT_MAX_PER_REQUEST;
use crate::endpoint::{ConnectionConfig, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};
use crate::error::GatewayError;
use crate::mc_define::AccessRoute;
use crate::plc_series::PLCSeries;

pub const ENV_PLC_IP: &str = "PLC_IP";
pub const ENV_PLC_PORT: &str = "PLC_PORT";
pub const ENV_PLC_TIMEOUT_SEC: &str = "PLC_TIMEOUT_SEC";
pub const ENV_PLC_SERIES: &str = "PLC_SERIES";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlcSettings {
    pub host: String,
    pub port: u16,
    pub timeout_secs: f64,
    pub series: PLCSeries,
    pub network_number: u8,
    pub pc_number: u8,
    pub io_number: u16,
    pub station_number: u8,
}

impl Default for PlcSettings {
    fn default() -> Self {
        let route = AccessRoute::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            series: PLCSeries::default(),
            network_number: route.network_number,
            pc_number: route.pc_number,
            io_number: route.io_number,
            station_number: route.station_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSettings {
    pub max_devices_per_request: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_devices_per_request: DEFAULT_MAX_PER_REQUEST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub plc: PlcSettings,
    pub batch: BatchSettings,
}

impl GatewaySettings {
    pub fn from_toml_str(s: &str) -> Result<Self, GatewayError> {
        let settings: Self = toml::from_str(s)
            .map_err(|e| GatewayError::Config(format!("settings parse error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::default().apply_env_overrides()
    }

    pub fn apply_env_overrides(self) -> Result<Self, GatewayError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `PLC_*` overrides using `lookup` in place of the environment.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_PLC_IP) {
            self.plc.host = host.trim().to_string();
        }
        if let Some(port) = lookup(ENV_PLC_PORT) {
            self.plc.port = port
                .trim()
                .parse()
                .map_err(|e| GatewayError::Config(format!("{ENV_PLC_PORT}='{port}': {e}")))?;
        }
        if let Some(timeout) = lookup(ENV_PLC_TIMEOUT_SEC) {
            self.plc.timeout_secs = timeout.trim().parse().map_err(|e| {
                GatewayError::Config(format!("{ENV_PLC_TIMEOUT_SEC}='{timeout}': {e}"))
            })?;
        }
        if let Some(series) = lookup(ENV_PLC_SERIES) {
            self.plc.series = PLCSeries::from_str(&series).ok_or_else(|| {
                GatewayError::Config(format!("{ENV_PLC_SERIES}='{series}': expected Q or R"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.plc.host.trim().is_empty() {
            return Err(GatewayError::Config("plc.host must not be empty".into()));
        }
        if !(self.plc.timeout_secs.is_finite() && self.plc.timeout_secs > 0.0) {
            return Err(GatewayError::Config(format!(
                "plc.timeout_secs must be a positive number, got {}",
                self.plc.timeout_secs
            )));
        }
        if self.batch.max_devices_per_request == 0 {
            return Err(GatewayError::Config(
                "batch.max_devices_per_request must be at least 1".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn access_route(&self) -> AccessRoute {
        AccessRoute::default()
            .with_network_number(self.plc.network_number)
            .with_pc_number(self.plc.pc_number)
            .with_io_number(self.plc.io_number)
            .with_station_number(self.plc.station_number)
    }

    #[must_use]
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::direct(self.plc.host.clone(), self.plc.port)
            .with_timeout_secs(self.plc.timeout_secs)
            .with_series(self.plc.series)
            .with_access_route(self.access_route())
    }

    #[must_use]
    pub fn engine(&self) -> BatchReadEngine {
        BatchReadEngine::new().with_max_devices_per_request(self.batch.max_devices_per_request)
    }
}
