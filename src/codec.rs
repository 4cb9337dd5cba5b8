//! 3E バイナリフレームの読出し要求の組立と応答の解釈
//!
//! - 複数ブロック一括読出し (0x0406): 同じ値種別（ワード/ビット）のデバイスをまとめて読む
//! - 一括読出し (0x0401): 1デバイスずつ読む（フォールバック用）
//!
//! コーデックは分割を行いません。上限を超える要求は `RequestTooLarge` になります。

use crate::commands::Command;
use crate::device::{DeviceDescriptor, ValueKind};
use crate::device_spec::DeviceSpec;
use crate::endpoint::ConnectionConfig;
use crate::error::GatewayError;
use crate::mc_define::{
    end_code_name, AccessRoute, MAX_BATCH_READ_BITS, MAX_BATCH_READ_WORDS, MAX_BLOCK_READ_POINTS,
};
use crate::plc_series::PLCSeries;
use crate::request::{McRequest, DEFAULT_MONITORING_TIMER};
use crate::response::McResponse;

const BITS_PER_WORD: u32 = 16;

/// Stateless encoder/decoder for one connection's addressing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McCodec {
    series: PLCSeries,
    access_route: AccessRoute,
    monitoring_timer: u16,
}

impl Default for McCodec {
    fn default() -> Self {
        Self::new(PLCSeries::default())
    }
}

// Word range a bit block covers on the wire.
#[derive(Debug, Clone, Copy)]
struct BitWindow {
    start: u32,
    offset: usize,
    words: usize,
}

impl BitWindow {
    fn of(spec: &DeviceSpec) -> Self {
        let offset = spec.address % BITS_PER_WORD;
        let words = (offset + spec.length).div_ceil(BITS_PER_WORD);
        Self {
            start: spec.address - offset,
            offset: offset as usize,
            words: words as usize,
        }
    }
}

impl McCodec {
    #[must_use]
    pub const fn new(series: PLCSeries) -> Self {
        Self {
            series,
            access_route: AccessRoute {
                network_number: 0x00,
                pc_number: 0xFF,
                io_number: 0x03FF,
                station_number: 0x00,
            },
            monitoring_timer: DEFAULT_MONITORING_TIMER,
        }
    }

    #[must_use]
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.series)
            .with_access_route(config.access_route)
            .with_monitoring_timer(config.monitoring_timer())
    }

    #[must_use]
    pub const fn with_access_route(mut self, access_route: AccessRoute) -> Self {
        self.access_route = access_route;
        self
    }

    #[must_use]
    pub const fn with_monitoring_timer(mut self, monitoring_timer: u16) -> Self {
        self.monitoring_timer = if monitoring_timer == 0 { 1 } else { monitoring_timer };
        self
    }

    #[must_use]
    pub const fn series(&self) -> PLCSeries {
        self.series
    }

    #[must_use]
    pub const fn monitoring_timer(&self) -> u16 {
        self.monitoring_timer
    }

    fn frame(&self, command: Command, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let mut data = Vec::with_capacity(4 + payload.len());
        data.extend_from_slice(&command.header_bytes(self.series));
        data.extend_from_slice(payload);
        let req = McRequest::new()
            .with_access_route(self.access_route)
            .with_monitoring_timer(self.monitoring_timer)
            .try_with_request_data(data)?;
        Ok(req.build())
    }

    fn response_data(frame: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let resp = McResponse::try_new(frame)?;
        if !resp.is_success() {
            tracing::debug!(
                "[MC] end code 0x{:04X} ({}), error information {:02X?}",
                resp.end_code,
                end_code_name(resp.end_code).unwrap_or_else(|| "unknown".into()),
                resp.data
            );
        }
        resp.into_result()
    }

    /// Encode one block read (0x0406) carrying one block per spec.
    ///
    /// All specs must share a value kind. Word specs become word blocks of
    /// `length` points; bit specs become bit blocks aligned down to a multiple
    /// of 16 and counted in words.
    pub fn encode_block_read(&self, specs: &[DeviceSpec]) -> Result<Vec<u8>, GatewayError> {
        let kind = group_kind(specs)?;
        let ceiling = specs
            .iter()
            .map(|s| s.descriptor().max_per_request)
            .min()
            .unwrap_or(0);
        if specs.len() > ceiling {
            return Err(GatewayError::RequestTooLarge {
                requested: specs.len(),
                max: ceiling,
            });
        }
        let total_points = block_points(specs, kind);
        if total_points > MAX_BLOCK_READ_POINTS {
            return Err(GatewayError::RequestTooLarge {
                requested: total_points,
                max: MAX_BLOCK_READ_POINTS,
            });
        }
        let blocks = u8::try_from(specs.len()).map_err(|_| GatewayError::RequestTooLarge {
            requested: specs.len(),
            max: usize::from(u8::MAX),
        })?;

        let block_width = self.series.device_field_width() + 2;
        let mut payload = Vec::with_capacity(2 + specs.len() * block_width);
        match kind {
            ValueKind::Word => payload.extend_from_slice(&[blocks, 0]),
            ValueKind::Bit => payload.extend_from_slice(&[0, blocks]),
        }
        for spec in specs {
            let desc = spec.descriptor();
            let (start, points) = match kind {
                ValueKind::Word => (spec.address, spec.length as usize),
                ValueKind::Bit => {
                    let w = BitWindow::of(spec);
                    (w.start, w.words)
                }
            };
            payload.extend_from_slice(&desc.device_field(start, self.series)?);
            payload.extend_from_slice(&points_u16(points)?.to_le_bytes());
        }
        tracing::debug!(
            "[MC] {} {:?} blocks={} points={}",
            Command::ReadBlocks.as_str(),
            kind,
            specs.len(),
            total_points
        );
        self.frame(Command::ReadBlocks, &payload)
    }

    /// Decode a block read response into one value list per spec, in request order.
    pub fn decode_block_read(
        &self,
        specs: &[DeviceSpec],
        frame: &[u8],
    ) -> Result<Vec<Vec<i32>>, GatewayError> {
        let kind = group_kind(specs)?;
        let data = Self::response_data(frame)?;
        let expected = block_points(specs, kind) * 2;
        if data.len() != expected {
            return Err(GatewayError::MalformedResponse(format!(
                "block read returned {} bytes, expected {}",
                data.len(),
                expected
            )));
        }

        let mut units = data.chunks_exact(2);
        let mut out = Vec::with_capacity(specs.len());
        for spec in specs {
            let desc = spec.descriptor();
            let values = match kind {
                ValueKind::Word => {
                    let mut words = Vec::with_capacity(spec.length as usize);
                    for unit in units.by_ref().take(spec.length as usize) {
                        words.extend(desc.decode_raw_unit(unit)?);
                    }
                    words
                }
                ValueKind::Bit => {
                    let w = BitWindow::of(spec);
                    let mut flags = Vec::with_capacity(w.words * 16);
                    for unit in units.by_ref().take(w.words) {
                        flags.extend(desc.decode_raw_unit(unit)?);
                    }
                    flags
                        .into_iter()
                        .skip(w.offset)
                        .take(spec.length as usize)
                        .collect()
                }
            };
            if values.len() != spec.length as usize {
                return Err(GatewayError::MalformedResponse(format!(
                    "{}: got {} values, expected {}",
                    spec.label,
                    values.len(),
                    spec.length
                )));
            }
            out.push(values);
        }
        Ok(out)
    }

    /// Encode a batch read (0x0401) of one contiguous range.
    pub fn encode_batch_read(&self, spec: &DeviceSpec) -> Result<Vec<u8>, GatewayError> {
        let desc = spec.descriptor();
        let (command, max) = match desc.value_kind() {
            ValueKind::Word => (Command::ReadWords, MAX_BATCH_READ_WORDS),
            ValueKind::Bit => (Command::ReadBits, MAX_BATCH_READ_BITS),
        };
        let points = spec.length as usize;
        if points > max {
            return Err(GatewayError::RequestTooLarge {
                requested: points,
                max,
            });
        }
        let mut payload = desc.device_field(spec.address, self.series)?;
        payload.extend_from_slice(&points_u16(points)?.to_le_bytes());
        tracing::debug!(
            "[MC] {} {} points={}",
            command.as_str(),
            spec.device_name(),
            points
        );
        self.frame(command, &payload)
    }

    /// Decode a batch read response. Bits arrive two per byte, high nibble first.
    pub fn decode_batch_read(
        &self,
        spec: &DeviceSpec,
        frame: &[u8],
    ) -> Result<Vec<i32>, GatewayError> {
        let desc = spec.descriptor();
        let data = Self::response_data(frame)?;
        let length = spec.length as usize;
        let expected = match desc.value_kind() {
            ValueKind::Word => length * 2,
            ValueKind::Bit => length.div_ceil(2),
        };
        if data.len() != expected {
            return Err(GatewayError::MalformedResponse(format!(
                "batch read of {} returned {} bytes, expected {}",
                spec.label,
                data.len(),
                expected
            )));
        }
        match desc.value_kind() {
            ValueKind::Word => data
                .chunks_exact(2)
                .map(|u| desc.decode_raw_unit(u))
                .collect::<Result<Vec<_>, _>>()
                .map(|units| units.concat()),
            ValueKind::Bit => Ok(data
                .iter()
                .flat_map(|b| [b >> 4, b & 0x0F])
                .take(length)
                .map(|nibble| desc.encode_value(u16::from(nibble)))
                .collect()),
        }
    }
}

fn group_kind(specs: &[DeviceSpec]) -> Result<ValueKind, GatewayError> {
    let first = specs
        .first()
        .ok_or_else(|| GatewayError::Encoding("empty device group".into()))?;
    let kind = first.descriptor().value_kind();
    if let Some(other) = specs
        .iter()
        .find(|s| s.descriptor().value_kind() != kind)
    {
        return Err(GatewayError::Encoding(format!(
            "mixed value kinds in one group: {} is {:?}, {} is {:?}",
            first.label,
            kind,
            other.label,
            other.descriptor().value_kind()
        )));
    }
    Ok(kind)
}

fn block_points(specs: &[DeviceSpec], kind: ValueKind) -> usize {
    specs
        .iter()
        .map(|s| match kind {
            ValueKind::Word => s.length as usize,
            ValueKind::Bit => BitWindow::of(s).words,
        })
        .sum()
}

/// Points one spec contributes to a block read: its length for word
/// devices, the covering 16-bit words for bit devices.
#[must_use]
pub fn block_read_points(spec: &DeviceSpec) -> usize {
    block_points(std::slice::from_ref(spec), spec.descriptor().value_kind())
}

fn points_u16(points: usize) -> Result<u16, GatewayError> {
    u16::try_from(points).map_err(|_| GatewayError::RequestTooLarge {
        requested: points,
        max: usize::from(u16::MAX),
    })
}

/// Smallest device-count ceiling among `descriptors`.
#[must_use]
pub fn group_ceiling<'a, I>(descriptors: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a DeviceDescriptor>,
{
    descriptors.into_iter().map(|d| d.max_per_request).min()
}
