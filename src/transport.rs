use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout as tokio_timeout;

use crate::endpoint::ConnectionConfig;
use crate::error::GatewayError;
use crate::mc_define::MC_PREFIX_SIZE;
use crate::mc_frame::detect_frame;

pub(crate) fn hex_dump(b: &[u8]) -> String {
    b.iter()
        .map(|x| format!("{x:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// Run one socket step under the configured bound.
async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio_timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(
            GatewayError::MalformedResponse(format!("peer closed during {what}: {e}")),
        ),
        Ok(Err(e)) => Err(GatewayError::Connection(format!("{what} failed: {e}"))),
        Err(_) => Err(GatewayError::ConnectionTimeout(limit)),
    }
}

async fn exchange(
    stream: &mut TcpStream,
    payload: &[u8],
    limit: Duration,
) -> Result<Vec<u8>, GatewayError> {
    bounded(limit, "write", stream.write_all(payload)).await?;
    tracing::debug!("[MC TCP send] {}", hex_dump(payload));

    let mut frame = vec![0u8; MC_PREFIX_SIZE];
    bounded(limit, "read", stream.read_exact(&mut frame)).await?;
    let frame_len = detect_frame(&frame)?.ok_or_else(|| {
        GatewayError::MalformedResponse("incomplete response header".into())
    })?;
    frame.resize(frame_len, 0);
    bounded(limit, "read", stream.read_exact(&mut frame[MC_PREFIX_SIZE..])).await?;
    tracing::debug!("[MC TCP recv] {}", hex_dump(&frame));
    Ok(frame)
}

/// Send one request frame to the PLC and return exactly one response frame.
///
/// A fresh TCP session is opened for every call and closed before returning,
/// on success and on every error path. Connect, write and each read are
/// bounded by `config.timeout()`. No retry.
///
/// # Errors
///
/// `Connection` for connect/write/read failures, `ConnectionTimeout` when a
/// bound expires, `MalformedResponse` when the peer closes mid-frame or sends
/// something that is not a 3E frame.
pub async fn round_trip(config: &ConnectionConfig, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
    let limit = config.timeout();
    let addr = config.addr();
    let mut stream = bounded(limit, "connect", TcpStream::connect(addr.as_str()))
        .await
        .map_err(|e| match e {
            GatewayError::Connection(msg) => GatewayError::Connection(format!("{addr}: {msg}")),
            other => other,
        })?;

    let result = exchange(&mut stream, payload, limit).await;
    if let Err(e) = &result {
        tracing::debug!("[MC TCP] {} exchange failed: {}", addr, e);
    }
    // best effort; the socket is dropped either way
    let _ = tokio_timeout(limit, stream.shutdown()).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reads_one_frame_announced_by_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 64];
            let _ = s.read(&mut buf).await;
            // response split across two writes, followed by trailing garbage
            s.write_all(&[0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00])
                .await
                .expect("write");
            s.write_all(&[0x04, 0x00, 0x00, 0x00, 0x39, 0x30, 0xEE])
                .await
                .expect("write");
        });
        let cfg = ConnectionConfig::direct("127.0.0.1", port).with_timeout_secs(2.0);
        let frame = round_trip(&cfg, &[0x50, 0x00]).await.expect("round trip");
        assert_eq!(frame.len(), 13);
        assert_eq!(&frame[11..], &[0x39, 0x30]);
    }

    #[tokio::test]
    async fn peer_closing_mid_frame_is_malformed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 64];
            let _ = s.read(&mut buf).await;
            s.write_all(&[0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x10, 0x00, 0x00])
                .await
                .expect("write");
        });
        let cfg = ConnectionConfig::direct("127.0.0.1", port).with_timeout_secs(2.0);
        let err = round_trip(&cfg, &[0x50, 0x00]).await.expect_err("short frame");
        assert_eq!(err.code(), "MalformedResponseError");
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let (s, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(s);
        });
        let cfg = ConnectionConfig::direct("127.0.0.1", port).with_timeout_secs(0.2);
        let err = round_trip(&cfg, &[0x50, 0x00]).await.expect_err("timeout");
        assert!(matches!(err, GatewayError::ConnectionTimeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn refused_connection() {
        // bind then drop to get a port nobody listens on
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            l.local_addr().expect("addr").port()
        };
        let cfg = ConnectionConfig::direct("127.0.0.1", port).with_timeout_secs(1.0);
        let err = round_trip(&cfg, &[0x50, 0x00]).await.expect_err("refused");
        assert_eq!(err.code(), "ConnectionError");
    }

    #[test]
    fn hex_dump_format() {
        assert_eq!(hex_dump(&[0x50, 0x00, 0xAB]), "50 00 AB");
    }
}
