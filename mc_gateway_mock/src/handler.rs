use std::sync::Arc;
use tokio::sync::RwLock;

use anyhow::Result;

use mc_gateway::commands::Command;
use mc_gateway::device::{self, DeviceCode, DeviceType};
use mc_gateway::mc_define::{MAX_BATCH_READ_BITS, MAX_BATCH_READ_WORDS, MAX_BLOCK_READ_POINTS};
use mc_gateway::plc_series::PLCSeries;
use mc_gateway::request::McRequest;
use mc_gateway::response::McResponse;

use crate::device_store::DeviceStore;

/// Requested range lies outside the PLC's device points.
pub const END_DEVICE_RANGE: u16 = 0xC056;
/// Command/subcommand pair the mock does not implement.
pub const END_UNSUPPORTED_COMMAND: u16 = 0xC059;
/// Unknown device code, or bit access to a word device.
pub const END_DEVICE_CODE: u16 = 0xC05C;
/// Point count is zero or above the command limit.
pub const END_POINT_COUNT: u16 = 0xC052;
/// Request data length does not match the command layout.
pub const END_REQUEST_LENGTH: u16 = 0xC061;

/// Decode a read request, answer it from `store`, and return the encoded
/// response frame. Failures on the PLC side come back as error end codes,
/// only frame encoding errors are returned as `Err`.
pub async fn handle_request_and_apply_store(
    store: &Arc<RwLock<DeviceStore>>,
    req: &McRequest,
) -> Result<Vec<u8>> {
    let guard = store.read().await;
    Ok(respond(&guard, req).build()?)
}

/// Answer one request against a store snapshot.
#[must_use]
pub fn respond(store: &DeviceStore, req: &McRequest) -> McResponse {
    let command = req.command().unwrap_or(0);
    let sub = req.subcommand().unwrap_or(0);
    let Some((cmd, series)) = Command::from_codes(command, sub) else {
        tracing::debug!("[mock] unsupported command 0x{command:04X}/0x{sub:04X}");
        return McResponse::error(req.access_route, END_UNSUPPORTED_COMMAND, command, sub);
    };
    let payload = req.command_payload();
    let result = match cmd {
        Command::ReadWords => read_words(store, series, payload),
        Command::ReadBits => read_bits(store, series, payload),
        Command::ReadBlocks => read_blocks(store, series, payload),
    };
    match result {
        Ok(data) => McResponse::ok(req.access_route, data),
        Err(end_code) => {
            tracing::debug!("[mock] {} -> end code 0x{end_code:04X}", cmd.as_str());
            McResponse::error(req.access_route, end_code, command, sub)
        }
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], u16> {
        let end = self.pos + n;
        let bytes = self.buf.get(self.pos..end).ok_or(END_REQUEST_LENGTH)?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, u16> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Result<u16, u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Address (3 or 4 bytes LE) followed by the device code.
    fn device(&mut self, series: PLCSeries) -> Result<(DeviceType, u32), u16> {
        let address = self
            .take(series.address_width())?
            .iter()
            .rev()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        let code = DeviceCode::from_bytes(self.take(series.device_code_width())?, series)
            .map_err(|_| END_DEVICE_CODE)?;
        let desc = device::by_code(code.0).ok_or(END_DEVICE_CODE)?;
        Ok((desc.device_type, address))
    }

    fn finish(&self) -> Result<(), u16> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(END_REQUEST_LENGTH)
        }
    }
}

fn check_points(points: u16, max: usize) -> Result<(), u16> {
    if points == 0 || usize::from(points) > max {
        return Err(END_POINT_COUNT);
    }
    Ok(())
}

fn read_words(store: &DeviceStore, series: PLCSeries, payload: &[u8]) -> Result<Vec<u8>, u16> {
    let mut c = Cursor::new(payload);
    let (dt, address) = c.device(series)?;
    let points = c.u16()?;
    c.finish()?;
    check_points(points, MAX_BATCH_READ_WORDS)?;
    let mut out = Vec::with_capacity(usize::from(points) * 2);
    word_units(store, dt, address, points, &mut out)?;
    Ok(out)
}

fn read_bits(store: &DeviceStore, series: PLCSeries, payload: &[u8]) -> Result<Vec<u8>, u16> {
    let mut c = Cursor::new(payload);
    let (dt, address) = c.device(series)?;
    let points = c.u16()?;
    c.finish()?;
    check_points(points, MAX_BATCH_READ_BITS)?;
    if !device::lookup(dt).is_bit() {
        return Err(END_DEVICE_CODE);
    }
    if !store.in_range(dt, address, u64::from(points)) {
        return Err(END_DEVICE_RANGE);
    }
    let bits: Vec<u8> = (0..u32::from(points))
        .map(|i| u8::from(store.bit(dt, address + i)))
        .collect();
    // two points per byte, first point in the high nibble
    Ok(bits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect())
}

fn read_blocks(store: &DeviceStore, series: PLCSeries, payload: &[u8]) -> Result<Vec<u8>, u16> {
    let mut c = Cursor::new(payload);
    let word_blocks = c.u8()?;
    let bit_blocks = c.u8()?;
    let mut blocks = Vec::with_capacity(usize::from(word_blocks) + usize::from(bit_blocks));
    for i in 0..(usize::from(word_blocks) + usize::from(bit_blocks)) {
        let (dt, address) = c.device(series)?;
        let points = c.u16()?;
        if points == 0 {
            return Err(END_POINT_COUNT);
        }
        // bit blocks carry bit devices counted in 16-point words
        if i >= usize::from(word_blocks) && !device::lookup(dt).is_bit() {
            return Err(END_DEVICE_CODE);
        }
        blocks.push((dt, address, points));
    }
    c.finish()?;
    let total: usize = blocks.iter().map(|(_, _, p)| usize::from(*p)).sum();
    if total > MAX_BLOCK_READ_POINTS {
        return Err(END_POINT_COUNT);
    }
    let mut out = Vec::with_capacity(total * 2);
    for (dt, address, points) in blocks {
        word_units(store, dt, address, points, &mut out)?;
    }
    Ok(out)
}

/// Append `points` 16-bit units starting at `address`. Bit devices are read
/// 16 points per unit.
fn word_units(
    store: &DeviceStore,
    dt: DeviceType,
    address: u32,
    points: u16,
    out: &mut Vec<u8>,
) -> Result<(), u16> {
    let is_bit = device::lookup(dt).is_bit();
    let span = if is_bit {
        u64::from(points) * 16
    } else {
        u64::from(points)
    };
    if !store.in_range(dt, address, span) {
        return Err(END_DEVICE_RANGE);
    }
    for i in 0..u32::from(points) {
        let unit = if is_bit {
            store.packed_bits(dt, address + i * 16)
        } else {
            store.word(dt, address + i)
        };
        out.extend_from_slice(&unit.to_le_bytes());
    }
    Ok(())
}
