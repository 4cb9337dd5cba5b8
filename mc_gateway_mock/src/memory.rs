//! Initial device memory for the mock, loaded from TOML.
//!
//! ```toml
//! [[words]]
//! device = "D100"
//! values = [12345, -1]
//!
//! [[bits]]
//! device = "M200"
//! values = [1, 0, 1]
//!
//! [[limits]]
//! device = "D"
//! points = 1000
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use mc_gateway::device::{self, DeviceType};
use mc_gateway::device_spec::DeviceSpec;

use crate::device_store::DeviceStore;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryFile {
    pub words: Vec<MemoryEntry>,
    pub bits: Vec<MemoryEntry>,
    pub limits: Vec<LimitEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryEntry {
    /// Start device, e.g. `D100` or `X1A`.
    pub device: String,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitEntry {
    /// Device symbol, e.g. `D`.
    pub device: String,
    pub points: u32,
}

impl MemoryFile {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parse memory file")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read memory file {}", path.display()))?;
        Self::from_toml_str(&s)
    }

    /// Write every entry into `store`.
    pub fn apply(&self, store: &mut DeviceStore) -> Result<()> {
        for entry in &self.words {
            let spec = start_of(&entry.device)?;
            if spec.descriptor().is_bit() {
                bail!("{} is a bit device, list it under [[bits]]", entry.device);
            }
            let words = entry
                .values
                .iter()
                .map(|v| to_word(*v).with_context(|| format!("{}: value {v}", entry.device)))
                .collect::<Result<Vec<u16>>>()?;
            store.set_words(spec.device_type, spec.address, &words);
        }
        for entry in &self.bits {
            let spec = start_of(&entry.device)?;
            if !spec.descriptor().is_bit() {
                bail!("{} is a word device, list it under [[words]]", entry.device);
            }
            let bits: Vec<bool> = entry.values.iter().map(|v| *v != 0).collect();
            store.set_bits(spec.device_type, spec.address, &bits);
        }
        for limit in &self.limits {
            let device_type: DeviceType = device::lookup_symbol(&limit.device)?.device_type;
            store.set_limit(device_type, limit.points);
        }
        Ok(())
    }
}

fn start_of(text: &str) -> Result<DeviceSpec> {
    DeviceSpec::parse(text).with_context(|| format!("invalid start device '{text}'"))
}

/// Signed values are stored as their two's complement word.
fn to_word(v: i64) -> Result<u16> {
    if let Ok(signed) = i16::try_from(v) {
        #[allow(clippy::cast_sign_loss)]
        return Ok(signed as u16);
    }
    u16::try_from(v).context("does not fit a 16-bit word")
}
