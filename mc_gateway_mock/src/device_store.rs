use std::collections::HashMap;

use mc_gateway::device::{self, DeviceType};

/// In-memory PLC device memory. Unset addresses read as zero.
///
/// Bit devices hold one 0/1 entry per device number; word devices one u16.
#[derive(Debug, Default, Clone)]
pub struct DeviceStore {
    cells: HashMap<(DeviceType, u32), u16>,
    limits: HashMap<DeviceType, u64>,
}

impl DeviceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_words(&mut self, device: DeviceType, start: u32, words: &[u16]) {
        for (addr, w) in (start..).zip(words) {
            self.cells.insert((device, addr), *w);
        }
    }

    pub fn set_bits(&mut self, device: DeviceType, start: u32, bits: &[bool]) {
        for (addr, b) in (start..).zip(bits) {
            self.cells.insert((device, addr), u16::from(*b));
        }
    }

    /// Number of device points this PLC exposes for `device`.
    pub fn set_limit(&mut self, device: DeviceType, points: u32) {
        self.limits.insert(device, u64::from(points));
    }

    #[must_use]
    pub fn limit(&self, device: DeviceType) -> u64 {
        self.limits
            .get(&device)
            .copied()
            .unwrap_or_else(|| u64::from(device::lookup(device).max_address) + 1)
    }

    /// True when `start..start+count` lies inside the configured points.
    #[must_use]
    pub fn in_range(&self, device: DeviceType, start: u32, count: u64) -> bool {
        u64::from(start) + count <= self.limit(device)
    }

    #[must_use]
    pub fn word(&self, device: DeviceType, addr: u32) -> u16 {
        self.cells.get(&(device, addr)).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn bit(&self, device: DeviceType, addr: u32) -> bool {
        self.word(device, addr) != 0
    }

    /// 16 bit devices starting at `addr`, packed LSB first.
    #[must_use]
    pub fn packed_bits(&self, device: DeviceType, addr: u32) -> u16 {
        (0..16u32)
            .filter(|i| self.bit(device, addr.saturating_add(*i)))
            .fold(0u16, |acc, i| acc | (1 << i))
    }
}
