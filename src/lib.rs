#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::too_long_first_doc_paragraph
)]

//! mc_gateway
//!
//! mc_gateway は Mitsubishi PLC の MC プロトコル (3E フレーム, バイナリ) で
//! レジスタ・リレーをまとめて読み出すゲートウェイのコアライブラリです。
//!
//! 主な機能:
//! - デバイス指定文字列の解析 (`D100`, `D100:5`, `X1A`, `M0x10`, `YH20`)
//! - 3E 要求フレームの組立と応答の解析（複数ブロック一括読出し / 一括読出し）
//! - 1呼び出しごとに TCP セッションを張る送受信（タイムアウト付き）
//! - 入力順を保ったバッチ読出しと、失敗時の1デバイスずつのフォールバック
//! - テスト用のモック PLC (別 crate `mc_gateway_mock`)
//!
//! 使い方の簡単な例:
//! ```no_run
//! # async fn demo() -> Result<(), mc_gateway::GatewayError> {
//! use mc_gateway::{BatchReadEngine, ConnectionConfig};
//! let config = ConnectionConfig::direct("192.168.0.10", 5511).with_timeout_secs(3.0);
//! let result = BatchReadEngine::new()
//!     .read(&["D100", "M200:3", "X1A"], &config)
//!     .await?;
//! println!("{}", result.to_json());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod codec;
pub mod commands;
pub mod config;
pub mod device;
pub mod device_spec;
pub mod endpoint;
pub mod error;
pub mod error_codes;
pub mod mc_define;
pub mod mc_frame;
pub mod plc_series;
pub mod request;
pub mod response;
pub mod transport;

pub use batch::{
    capabilities, probe_connection, read, read_device, BatchCapabilities, BatchReadEngine,
    BatchResult, BatchResultItem, ConnectionProbe,
};
pub use codec::McCodec;
pub use config::GatewaySettings;
pub use device::{DeviceClass, DeviceDescriptor, DeviceType, NumberBase, ValueKind};
pub use device_spec::{validate_device_spec, DeviceSpec};
pub use endpoint::ConnectionConfig;
pub use error::GatewayError;
pub use error_codes::ProtocolErrorKind;
pub use plc_series::PLCSeries;
