//! MC3E プロトコル定義モジュール
//!
//! 3E フレーム（バイナリコード）の定数とアクセス経路を提供します。
//! - サブヘッダ（要求/応答）の定義
//! - ヘッダサイズ、アクセス経路のデフォルト値
//! - 1回の要求で扱える点数の上限
//!
//! NOTE: フレームの組立・解析は `request` / `response` / `mc_frame` で実装しています。

/// 3E 要求サブヘッダ
pub const MC_SUBHEADER_REQUEST: [u8; 2] = [0x50, 0x00];

/// 3E 応答サブヘッダ
pub const MC_SUBHEADER_RESPONSE: [u8; 2] = [0xD0, 0x00];

/// サブヘッダ(2) + アクセス経路(5) + データ長(2)
pub const MC_PREFIX_SIZE: usize = 9;

/// 要求ヘッダ: プレフィックス + 監視タイマ(2)
pub const MC_REQUEST_HEADER_SIZE: usize = 11;

/// アクセス経路（デフォルト）: ネットワーク0x00、PC番号0xFF、IO番号0x03FF、局番号0x00
pub const MC_ACCESS_PATH_DEFAULT: [u8; 5] = [0x00, 0xFF, 0xFF, 0x03, 0x00];

pub const MC_END_OK: u16 = 0x0000;

/// Block read: total points over all blocks.
pub const MAX_BLOCK_READ_POINTS: usize = 960;

/// Batch read in word units.
pub const MAX_BATCH_READ_WORDS: usize = 960;

/// Batch read in bit units.
pub const MAX_BATCH_READ_BITS: usize = 7168;

/// Return a short static name for a known end-code, or None if unknown.
#[must_use]
pub fn end_code_name(code: u16) -> Option<String> {
    if code == MC_END_OK {
        return Some("OK".to_string());
    }
    crate::error_codes::code_name(code)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRoute {
    pub network_number: u8,
    pub pc_number: u8,
    pub io_number: u16,
    pub station_number: u8,
}
impl AccessRoute {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0] = self.network_number;
        bytes[1] = self.pc_number;
        bytes[2..4].copy_from_slice(&self.io_number.to_le_bytes());
        bytes[4] = self.station_number;
        bytes
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 5]) -> Self {
        Self {
            network_number: bytes[0],
            pc_number: bytes[1],
            io_number: u16::from_le_bytes([bytes[2], bytes[3]]),
            station_number: bytes[4],
        }
    }

    #[must_use]
    pub const fn with_network_number(mut self, network_number: u8) -> Self {
        self.network_number = network_number;
        self
    }
    #[must_use]
    pub const fn with_pc_number(mut self, pc_number: u8) -> Self {
        self.pc_number = pc_number;
        self
    }
    #[must_use]
    pub const fn with_io_number(mut self, io_number: u16) -> Self {
        self.io_number = io_number;
        self
    }
    #[must_use]
    pub const fn with_station_number(mut self, station_number: u8) -> Self {
        self.station_number = station_number;
        self
    }
}
impl Default for AccessRoute {
    fn default() -> Self {
        Self::from_bytes(MC_ACCESS_PATH_DEFAULT)
    }
}
