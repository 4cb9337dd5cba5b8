//! 一括読出しエンジン
//!
//! 入力順のデバイス指定を解析し、ワード/ビットごとにまとめて分割し、
//! 複数ブロック一括読出しで読みます。まとめ読みが失敗したチャンクは
//! 1デバイスずつの一括読出しにフォールバックします。結果は常に入力と同じ順序・件数です。

use std::time::Instant;

use serde::Serialize;

use crate::codec::{block_read_points, group_ceiling, McCodec};
use crate::device::{self, ValueKind, DEFAULT_MAX_PER_REQUEST};
use crate::device_spec::DeviceSpec;
use crate::endpoint::ConnectionConfig;
use crate::error::GatewayError;
use crate::mc_define::MAX_BLOCK_READ_POINTS;
use crate::transport;

/// Outcome for one input entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResultItem {
    #[serde(skip)]
    pub original_index: usize,
    pub device: String,
    pub values: Vec<i32>,
    pub success: bool,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl BatchResultItem {
    #[must_use]
    pub fn success(original_index: usize, device: impl Into<String>, values: Vec<i32>) -> Self {
        Self {
            original_index,
            device: device.into(),
            values,
            success: true,
            error: None,
            error_code: None,
        }
    }

    #[must_use]
    pub fn failure(original_index: usize, device: impl Into<String>, err: &GatewayError) -> Self {
        Self {
            original_index,
            device: device.into(),
            values: Vec::new(),
            success: false,
            error: Some(err.to_string()),
            error_code: Some(err.code()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub results: Vec<BatchResultItem>,
    pub total_devices: usize,
    pub successful_devices: usize,
}

impl BatchResult {
    #[must_use]
    pub fn from_items(results: Vec<BatchResultItem>) -> Self {
        let successful_devices = results.iter().filter(|r| r.success).count();
        Self {
            total_devices: results.len(),
            successful_devices,
            results,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    #[must_use]
    pub fn failed_devices(&self) -> usize {
        self.total_devices - self.successful_devices
    }
}

/// Result of a connectivity check against one PLC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionProbe {
    pub target: String,
    /// The D0 test read succeeded. An error end code counts as not connected.
    pub connected: bool,
    pub error: Option<String>,
    pub response_time_ms: Option<u64>,
    pub test_read_value: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCapabilities {
    pub batch_read_available: bool,
    pub supported_devices: Vec<&'static str>,
    pub supported_formats: Vec<&'static str>,
    pub max_devices_per_request: usize,
    pub randomread_fallback: bool,
}

const SUPPORTED_FORMATS: [&str; 5] = ["D100", "D100:5", "X1A", "M0x10", "YH20"];

/// Ordered multi-device reads with per-device fallback.
///
/// Holds only immutable settings; share it freely between tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReadEngine {
    max_devices_per_request: usize,
}

impl Default for BatchReadEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReadEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_devices_per_request: DEFAULT_MAX_PER_REQUEST,
        }
    }

    /// Ceiling on devices per protocol call. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_max_devices_per_request(mut self, n: usize) -> Self {
        self.max_devices_per_request = n.max(1);
        self
    }

    #[must_use]
    pub const fn max_devices_per_request(&self) -> usize {
        self.max_devices_per_request
    }

    /// Read every entry of `specs`, in order.
    ///
    /// # Errors
    ///
    /// Only `InvalidBatchRequest` for an empty list. Every per-device failure
    /// is reported inside the returned `BatchResult`.
    pub async fn read<S: AsRef<str>>(
        &self,
        specs: &[S],
        config: &ConnectionConfig,
    ) -> Result<BatchResult, GatewayError> {
        if specs.is_empty() {
            return Err(GatewayError::InvalidBatchRequest(
                "device list is empty".into(),
            ));
        }

        let codec = McCodec::from_config(config);
        let mut slots: Vec<Option<BatchResultItem>> = vec![None; specs.len()];
        let mut words = Vec::new();
        let mut bits = Vec::new();
        for (index, text) in specs.iter().enumerate() {
            let text = text.as_ref();
            match DeviceSpec::parse_indexed(text, index) {
                Ok(spec) => match spec.descriptor().value_kind() {
                    ValueKind::Word => words.push(spec),
                    ValueKind::Bit => bits.push(spec),
                },
                Err(e) => {
                    tracing::warn!("[batch] skipping '{}': {}", text, e);
                    slots[index] = Some(BatchResultItem::failure(index, text, &e));
                }
            }
        }

        for group in [words, bits] {
            if group.is_empty() {
                continue;
            }
            let ceiling = group_ceiling(group.iter().map(DeviceSpec::descriptor))
                .map_or(self.max_devices_per_request, |c| {
                    c.min(self.max_devices_per_request)
                });
            for chunk in split_chunks(&group, ceiling) {
                for item in read_chunk(&codec, chunk, config).await {
                    let index = item.original_index;
                    slots[index] = Some(item);
                }
            }
        }

        let results: Vec<BatchResultItem> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let err = GatewayError::InvalidBatchRequest("no result produced".into());
                    BatchResultItem::failure(index, specs[index].as_ref(), &err)
                })
            })
            .collect();
        let result = BatchResult::from_items(results);
        tracing::info!(
            "[batch] {} devices read, {} succeeded, {} failed ({})",
            result.total_devices,
            result.successful_devices,
            result.failed_devices(),
            config.addr()
        );
        Ok(result)
    }

    #[must_use]
    pub fn capabilities(&self) -> BatchCapabilities {
        BatchCapabilities {
            batch_read_available: true,
            supported_devices: device::supported_device_types()
                .iter()
                .map(device::DeviceType::as_str)
                .collect(),
            supported_formats: SUPPORTED_FORMATS.to_vec(),
            max_devices_per_request: self.max_devices_per_request,
            randomread_fallback: true,
        }
    }
}

// Consecutive runs of at most `ceiling` specs whose block-read points stay
// within MAX_BLOCK_READ_POINTS. A spec that alone exceeds the limit gets its
// own chunk and is read through the fallback.
fn split_chunks(group: &[DeviceSpec], ceiling: usize) -> Vec<&[DeviceSpec]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut points = 0;
    for (i, spec) in group.iter().enumerate() {
        let p = block_read_points(spec);
        if i > start && (i - start >= ceiling || points + p > MAX_BLOCK_READ_POINTS) {
            chunks.push(&group[start..i]);
            start = i;
            points = 0;
        }
        points += p;
    }
    if start < group.len() {
        chunks.push(&group[start..]);
    }
    chunks
}

// One block read for the chunk; on any failure, one batch read per member.
async fn read_chunk(
    codec: &McCodec,
    chunk: &[DeviceSpec],
    config: &ConnectionConfig,
) -> Vec<BatchResultItem> {
    match read_blocks(codec, chunk, config).await {
        Ok(values) => chunk
            .iter()
            .zip(values)
            .map(|(spec, v)| BatchResultItem::success(spec.original_index, spec.label.as_str(), v))
            .collect(),
        Err(e) => {
            tracing::warn!(
                "[batch] block read of {} devices failed ({}), reading individually",
                chunk.len(),
                e
            );
            let mut items = Vec::with_capacity(chunk.len());
            for spec in chunk {
                let item = match read_single(codec, spec, config).await {
                    Ok(values) => {
                        BatchResultItem::success(spec.original_index, spec.label.as_str(), values)
                    }
                    Err(e) => {
                        tracing::debug!("[batch] {} failed: {}", spec.label, e);
                        BatchResultItem::failure(spec.original_index, spec.label.as_str(), &e)
                    }
                };
                items.push(item);
            }
            items
        }
    }
}

async fn read_blocks(
    codec: &McCodec,
    chunk: &[DeviceSpec],
    config: &ConnectionConfig,
) -> Result<Vec<Vec<i32>>, GatewayError> {
    let frame = codec.encode_block_read(chunk)?;
    let response = transport::round_trip(config, &frame).await?;
    codec.decode_block_read(chunk, &response)
}

async fn read_single(
    codec: &McCodec,
    spec: &DeviceSpec,
    config: &ConnectionConfig,
) -> Result<Vec<i32>, GatewayError> {
    let frame = codec.encode_batch_read(spec)?;
    let response = transport::round_trip(config, &frame).await?;
    codec.decode_batch_read(spec, &response)
}

/// Read `specs` with a default engine.
pub async fn read<S: AsRef<str>>(
    specs: &[S],
    config: &ConnectionConfig,
) -> Result<BatchResult, GatewayError> {
    BatchReadEngine::new().read(specs, config).await
}

/// Read `length` points of one device with a single batch read.
pub async fn read_device(
    device: &str,
    address: u32,
    length: u32,
    config: &ConnectionConfig,
) -> Result<Vec<i32>, GatewayError> {
    let spec = DeviceSpec::from_parts(device, address, length)?;
    read_single(&McCodec::from_config(config), &spec, config).await
}

/// Read D0 once and report whether it succeeded and how long it took.
pub async fn probe_connection(config: &ConnectionConfig) -> ConnectionProbe {
    let started = Instant::now();
    let result = read_device("D", 0, 1, config).await;
    let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let target = config.addr();
    match result {
        Ok(values) => ConnectionProbe {
            target,
            connected: true,
            error: None,
            response_time_ms: Some(elapsed),
            test_read_value: values.first().copied(),
        },
        Err(e) => {
            tracing::warn!("[probe] {} : {}", target, e);
            ConnectionProbe {
                target,
                connected: false,
                error: Some(e.to_string()),
                response_time_ms: None,
                test_read_value: None,
            }
        }
    }
}

/// Capabilities of a default engine.
#[must_use]
pub fn capabilities() -> BatchCapabilities {
    BatchReadEngine::new().capabilities()
}
