use crate::plc_series::PLCSeries;
use serde::Deserialize;
use std::str::FromStr;

/// Read commands used by the gateway. Names match the ids used in logs and in
/// the mock's fault descriptions (`"read_blocks"` etc.).
#[derive(Debug, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// 一括読出し（ワード単位） 0x0401
    ReadWords,
    /// 一括読出し（ビット単位） 0x0401
    ReadBits,
    /// 複数ブロック一括読出し 0x0406
    ReadBlocks,
}

pub const CMD_BATCH_READ: u16 = 0x0401;
pub const CMD_BLOCK_READ: u16 = 0x0406;

impl Command {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReadWords => "read_words",
            Self::ReadBits => "read_bits",
            Self::ReadBlocks => "read_blocks",
        }
    }

    #[must_use]
    pub const fn command_code(&self) -> u16 {
        match self {
            Self::ReadWords | Self::ReadBits => CMD_BATCH_READ,
            Self::ReadBlocks => CMD_BLOCK_READ,
        }
    }

    #[must_use]
    pub const fn subcommand(&self, series: PLCSeries) -> u16 {
        match (self, series) {
            (Self::ReadWords | Self::ReadBlocks, PLCSeries::Q) => 0x0000,
            (Self::ReadWords | Self::ReadBlocks, PLCSeries::R) => 0x0002,
            (Self::ReadBits, PLCSeries::Q) => 0x0001,
            (Self::ReadBits, PLCSeries::R) => 0x0003,
        }
    }

    /// Command(2) + subcommand(2), both little-endian.
    #[must_use]
    pub fn header_bytes(&self, series: PLCSeries) -> [u8; 4] {
        let c = self.command_code().to_le_bytes();
        let s = self.subcommand(series).to_le_bytes();
        [c[0], c[1], s[0], s[1]]
    }

    /// Identify a command and the addressing series from wire codes.
    #[must_use]
    pub const fn from_codes(command: u16, subcommand: u16) -> Option<(Self, PLCSeries)> {
        match (command, subcommand) {
            (CMD_BATCH_READ, 0x0000) => Some((Self::ReadWords, PLCSeries::Q)),
            (CMD_BATCH_READ, 0x0002) => Some((Self::ReadWords, PLCSeries::R)),
            (CMD_BATCH_READ, 0x0001) => Some((Self::ReadBits, PLCSeries::Q)),
            (CMD_BATCH_READ, 0x0003) => Some((Self::ReadBits, PLCSeries::R)),
            (CMD_BLOCK_READ, 0x0000) => Some((Self::ReadBlocks, PLCSeries::Q)),
            (CMD_BLOCK_READ, 0x0002) => Some((Self::ReadBlocks, PLCSeries::R)),
            _ => None,
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_words" => Ok(Self::ReadWords),
            "read_bits" => Ok(Self::ReadBits),
            "read_blocks" => Ok(Self::ReadBlocks),
            other => Err(format!("unknown command id: {other}")),
        }
    }
}
