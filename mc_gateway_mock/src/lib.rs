//! mc_gateway_mock
//!
//! MC プロトコル 3E バイナリフレームを話す簡易モック PLC です。
//! 一括読出し (0x0401) と複数ブロック一括読出し (0x0406) に応答し、
//! テストからデバイス値・点数上限・障害モードを設定できます。

pub mod device_store;
pub mod handler;
pub mod memory;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

use mc_gateway::commands::CMD_BLOCK_READ;
use mc_gateway::device;
use mc_gateway::mc_frame::detect_frame;
use mc_gateway::request::McRequest;
use mc_gateway::response::McResponse;

pub use device_store::DeviceStore;
pub use memory::MemoryFile;

/// Misbehaviour injected into every request the mock receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Answer 0x0406 with `0xC059`, batch reads stay healthy.
    RejectBlockReads,
    /// Answer every request with this end code.
    EndCode(u16),
    /// Read requests but never answer.
    Silent,
    /// Drop the connection with a TCP reset.
    Reset,
}

impl FromStr for Fault {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "none" => Ok(Self::None),
            "reject-block-reads" => Ok(Self::RejectBlockReads),
            "silent" => Ok(Self::Silent),
            "reset" => Ok(Self::Reset),
            other => {
                let code = other.strip_prefix("end-code=").unwrap_or(other);
                let hex = code.strip_prefix("0x").unwrap_or(code);
                u16::from_str_radix(hex, 16)
                    .map(Self::EndCode)
                    .map_err(|_| format!("unknown fault '{other}'"))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockServer {
    store: Arc<RwLock<DeviceStore>>,
    fault: Arc<RwLock<Fault>>,
    requests: Arc<AtomicUsize>,
}

impl MockServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set word devices starting at `start`. `device` is a symbol such as `"D"`.
    pub async fn set_words(&self, device: &str, start: u32, words: &[u16]) -> Result<()> {
        let dt = device::lookup_symbol(device)?.device_type;
        self.store.write().await.set_words(dt, start, words);
        Ok(())
    }

    pub async fn set_bits(&self, device: &str, start: u32, bits: &[bool]) -> Result<()> {
        let dt = device::lookup_symbol(device)?.device_type;
        self.store.write().await.set_bits(dt, start, bits);
        Ok(())
    }

    /// Restrict `device` to `points` device numbers; reads beyond answer `0xC056`.
    pub async fn set_limit(&self, device: &str, points: u32) -> Result<()> {
        let dt = device::lookup_symbol(device)?.device_type;
        self.store.write().await.set_limit(dt, points);
        Ok(())
    }

    pub async fn set_fault(&self, fault: Fault) {
        *self.fault.write().await = fault;
    }

    pub async fn load_memory(&self, memory: &MemoryFile) -> Result<()> {
        memory.apply(&mut *self.store.write().await)
    }

    /// Request frames received so far, across all connections.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn run(&self, bind: &str) -> Result<()> {
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("bind {bind}"))?;
        tracing::info!("mock PLC listening on {}", listener.local_addr()?);
        self.run_listener_on(listener).await
    }

    pub async fn run_listener_on(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!("[mock] accepted {peer}");
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.serve_connection(stream).await {
                    tracing::warn!("[mock] connection {peer} closed: {e:#}");
                }
            });
        }
    }

    /// Bind an ephemeral loopback port and serve it in the background.
    pub async fn spawn_local(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run_listener_on(listener).await {
                tracing::error!("[mock] listener stopped: {e:#}");
            }
        });
        Ok(addr)
    }

    async fn serve_connection(&self, mut stream: TcpStream) -> Result<()> {
        let mut buf: Vec<u8> = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);

            while let Some(len) = detect_frame(&buf)? {
                if buf.len() < len {
                    break;
                }
                let frame: Vec<u8> = buf.drain(..len).collect();
                self.requests.fetch_add(1, Ordering::SeqCst);
                let req = McRequest::try_from_payload(&frame)?;

                let fault = *self.fault.read().await;
                match fault {
                    Fault::Silent => {
                        tracing::debug!("[mock] silent, dropping request");
                        continue;
                    }
                    Fault::Reset => {
                        socket2::SockRef::from(&stream).set_linger(Some(Duration::ZERO))?;
                        drop(stream);
                        return Ok(());
                    }
                    _ => {}
                }
                let resp = self.respond(&req, fault).await?;
                stream.write_all(&resp).await?;
            }
        }
    }

    async fn respond(&self, req: &McRequest, fault: Fault) -> Result<Vec<u8>> {
        let command = req.command().unwrap_or(0);
        let sub = req.subcommand().unwrap_or(0);
        let injected = match fault {
            Fault::EndCode(code) => Some(code),
            Fault::RejectBlockReads if command == CMD_BLOCK_READ => {
                Some(handler::END_UNSUPPORTED_COMMAND)
            }
            _ => None,
        };
        if let Some(code) = injected {
            return Ok(McResponse::error(req.access_route, code, command, sub).build()?);
        }
        handler::handle_request_and_apply_store(&self.store, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_from_str() {
        assert_eq!("none".parse::<Fault>(), Ok(Fault::None));
        assert_eq!("Reject-Block-Reads".parse::<Fault>(), Ok(Fault::RejectBlockReads));
        assert_eq!("end-code=0xC051".parse::<Fault>(), Ok(Fault::EndCode(0xC051)));
        assert_eq!("C056".parse::<Fault>(), Ok(Fault::EndCode(0xC056)));
        assert!("sometimes".parse::<Fault>().is_err());
    }

    #[tokio::test]
    async fn setters_validate_symbols() -> Result<()> {
        let server = MockServer::new();
        server.set_words("D", 0, &[1, 2]).await?;
        server.set_bits("m", 10, &[true]).await?;
        assert!(server.set_words("Q", 0, &[1]).await.is_err());
        let store = server.store.read().await;
        assert_eq!(store.word(mc_gateway::DeviceType::D, 1), 2);
        assert!(store.bit(mc_gateway::DeviceType::M, 10));
        Ok(())
    }
}
