use std::error::Error;
use std::time::{Duration, Instant};

use mc_gateway::{probe_connection, read_device, BatchReadEngine, ConnectionConfig, GatewayError};
use mc_gateway_mock::{Fault, MockServer};

async fn mock_with(fault: Fault) -> Result<(MockServer, ConnectionConfig), Box<dyn Error>> {
    let server = MockServer::new();
    server.set_words("D", 0, &[7]).await?;
    server.set_words("D", 100, &[12345, 0xFFFE]).await?;
    server.set_bits("M", 200, &[true, false, true]).await?;
    server.set_bits("X", 0x1A, &[true]).await?;
    server.set_fault(fault).await;
    let addr = server.spawn_local().await?;
    let config = ConnectionConfig::direct("127.0.0.1", addr.port()).with_timeout_secs(0.5);
    Ok((server, config))
}

/// A loopback port nobody listens on.
async fn closed_port() -> Result<u16, Box<dyn Error>> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

#[tokio::test]
async fn block_read_rejection_falls_back_per_device() -> Result<(), Box<dyn Error>> {
    let (server, config) = mock_with(Fault::RejectBlockReads).await?;
    let result = BatchReadEngine::new()
        .read(&["D100", "M200:3", "X1A"], &config)
        .await?;

    assert_eq!(result.successful_devices, 3);
    assert_eq!(result.results[0].values, vec![12345]);
    assert_eq!(result.results[1].values, vec![1, 0, 1]);
    assert_eq!(result.results[2].values, vec![1]);
    // two rejected block reads, three batch reads
    assert_eq!(server.request_count(), 5);
    Ok(())
}

#[tokio::test]
async fn end_code_fault_fails_every_device() -> Result<(), Box<dyn Error>> {
    let (_server, config) = mock_with(Fault::EndCode(0xC051)).await?;
    let result = BatchReadEngine::new().read(&["D100", "X1A"], &config).await?;

    assert_eq!(result.total_devices, 2);
    assert_eq!(result.successful_devices, 0);
    for item in &result.results {
        assert!(!item.success);
        assert!(item.values.is_empty());
        assert_eq!(item.error_code, Some("TargetBusyError"));
    }
    Ok(())
}

#[tokio::test]
async fn silent_plc_times_out() -> Result<(), Box<dyn Error>> {
    let (_server, config) = mock_with(Fault::Silent).await?;
    let started = Instant::now();
    let result = BatchReadEngine::new().read(&["D0", "D1"], &config).await?;

    assert_eq!(result.successful_devices, 0);
    for item in &result.results {
        assert_eq!(item.error_code, Some("ConnectionTimeoutError"));
    }
    // block read + two fallbacks, each bounded by 0.5 s
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn reset_connection_is_reported_per_device() -> Result<(), Box<dyn Error>> {
    let (_server, config) = mock_with(Fault::Reset).await?;
    let result = BatchReadEngine::new().read(&["D100", "M200"], &config).await?;

    assert_eq!(result.successful_devices, 0);
    for item in &result.results {
        assert!(matches!(
            item.error_code,
            Some("ConnectionError" | "MalformedResponseError")
        ));
    }
    Ok(())
}

#[tokio::test]
async fn refused_connection_is_reported_per_device() -> Result<(), Box<dyn Error>> {
    let config = ConnectionConfig::direct("127.0.0.1", closed_port().await?).with_timeout_secs(0.5);
    let result = BatchReadEngine::new().read(&["D0", "bad!"], &config).await?;

    assert_eq!(result.total_devices, 2);
    assert_eq!(result.results[0].error_code, Some("ConnectionError"));
    assert!(!result.results[1].success);
    assert_ne!(result.results[1].error_code, Some("ConnectionError"));
    Ok(())
}

#[tokio::test]
async fn empty_batch_is_rejected() -> Result<(), Box<dyn Error>> {
    let config = ConnectionConfig::direct("127.0.0.1", closed_port().await?);
    let empty: [&str; 0] = [];
    let err = BatchReadEngine::new()
        .read(&empty, &config)
        .await
        .expect_err("empty input");
    assert!(matches!(err, GatewayError::InvalidBatchRequest(_)));
    Ok(())
}

#[tokio::test]
async fn connection_check_reports_reachability() -> Result<(), Box<dyn Error>> {
    let (_server, config) = mock_with(Fault::None).await?;
    let check = probe_connection(&config).await;
    assert!(check.connected);
    assert_eq!(check.test_read_value, Some(7));
    assert!(check.response_time_ms.is_some());
    assert!(check.error.is_none());

    // the PLC answers, but the test read fails
    let (_server, config) = mock_with(Fault::EndCode(0xC059)).await?;
    let check = probe_connection(&config).await;
    assert!(!check.connected);
    assert!(check.error.is_some());
    assert!(check.response_time_ms.is_none());
    assert_eq!(check.test_read_value, None);

    let config = ConnectionConfig::direct("127.0.0.1", closed_port().await?).with_timeout_secs(0.5);
    let check = probe_connection(&config).await;
    assert!(!check.connected);
    assert!(check.response_time_ms.is_none());
    assert_eq!(check.target, config.addr());
    Ok(())
}

#[tokio::test]
async fn read_single_device() -> Result<(), Box<dyn Error>> {
    let (server, config) = mock_with(Fault::None).await?;
    assert_eq!(read_device("D", 100, 2, &config).await?, vec![12345, -2]);
    assert_eq!(read_device("x", 0x1A, 1, &config).await?, vec![1]);
    assert_eq!(read_device("M", 199, 4, &config).await?, vec![0, 1, 0, 1]);
    assert_eq!(server.request_count(), 3);

    let err = read_device("Q", 0, 1, &config).await.expect_err("unknown type");
    assert_eq!(err.code(), "UnknownDeviceTypeError");
    server.set_limit("D", 10).await?;
    let err = read_device("D", 100, 1, &config).await.expect_err("range");
    assert_eq!(err.end_code(), Some(0xC056));
    Ok(())
}
