use std::error::Error;
use std::net::SocketAddr;

use mc_gateway::{BatchReadEngine, ConnectionConfig, PLCSeries};
use mc_gateway_mock::MockServer;

async fn start_mock() -> Result<(MockServer, SocketAddr), Box<dyn Error>> {
    let server = MockServer::new();
    server.set_words("D", 100, &[12345, 0xFFFE, 7]).await?;
    server.set_bits("M", 200, &[true, false, true]).await?;
    server.set_bits("X", 0x1A, &[true]).await?;
    let addr = server.spawn_local().await?;
    Ok((server, addr))
}

fn config_for(addr: SocketAddr) -> ConnectionConfig {
    ConnectionConfig::direct("127.0.0.1", addr.port()).with_timeout_secs(2.0)
}

#[tokio::test]
async fn mixed_devices_end_to_end() -> Result<(), Box<dyn Error>> {
    let (server, addr) = start_mock().await?;
    let result = BatchReadEngine::new()
        .read(&["D100", "M200:3", "X1A"], &config_for(addr))
        .await?;

    assert_eq!(result.total_devices, 3);
    assert_eq!(result.successful_devices, 3);
    let values: Vec<Vec<i32>> = result.results.iter().map(|r| r.values.clone()).collect();
    assert_eq!(values, vec![vec![12345], vec![1, 0, 1], vec![1]]);
    // one block read for the word group, one for the bit group
    assert_eq!(server.request_count(), 2);

    let json = result.to_json();
    assert_eq!(json["total_devices"], 3);
    assert_eq!(json["successful_devices"], 3);
    assert_eq!(json["results"][1]["device"], "M200:3");
    assert_eq!(json["results"][1]["values"], serde_json::json!([1, 0, 1]));
    assert_eq!(json["results"][0]["success"], true);
    assert!(json["results"][0]["error"].is_null());
    assert!(json["results"][0].get("error_code").is_none());
    Ok(())
}

#[tokio::test]
async fn q_series_addressing() -> Result<(), Box<dyn Error>> {
    let (_server, addr) = start_mock().await?;
    let config = config_for(addr).with_series(PLCSeries::Q);
    let result = mc_gateway::read(&["D100:3", "M201", "X1A"], &config).await?;
    assert_eq!(result.successful_devices, 3);
    assert_eq!(result.results[0].values, vec![12345, -2, 7]);
    assert_eq!(result.results[1].values, vec![0]);
    assert_eq!(result.results[2].values, vec![1]);
    Ok(())
}

#[tokio::test]
async fn results_follow_input_order() -> Result<(), Box<dyn Error>> {
    let (_server, addr) = start_mock().await?;
    let input = ["X1A", "D100", "M202", "bogus", "D101", "D102:1", "M200:0"];
    let result = BatchReadEngine::new().read(&input, &config_for(addr)).await?;

    let labels: Vec<&str> = result.results.iter().map(|r| r.device.as_str()).collect();
    assert_eq!(labels, input.to_vec());
    assert_eq!(result.total_devices, input.len());
    assert_eq!(result.successful_devices, 5);

    assert_eq!(result.results[0].values, vec![1]);
    assert_eq!(result.results[1].values, vec![12345]);
    assert_eq!(result.results[2].values, vec![1]);
    assert_eq!(result.results[4].values, vec![-2]);
    assert_eq!(result.results[5].values, vec![7]);

    let bogus = &result.results[3];
    assert!(!bogus.success);
    assert!(bogus.values.is_empty());
    assert!(bogus.error.is_some());
    assert_eq!(result.results[6].error_code, Some("InvalidLengthError"));
    Ok(())
}

#[tokio::test]
async fn failing_device_does_not_poison_the_batch() -> Result<(), Box<dyn Error>> {
    let (server, addr) = start_mock().await?;
    server.set_limit("D", 1000).await?;

    let result = BatchReadEngine::new()
        .read(&["D100", "D5000", "D102"], &config_for(addr))
        .await?;

    assert_eq!(result.successful_devices, 2);
    assert_eq!(result.results[0].values, vec![12345]);
    assert_eq!(result.results[2].values, vec![7]);
    let failed = &result.results[1];
    assert!(!failed.success);
    assert_eq!(failed.error_code, Some("DeviceRangeError"));
    assert!(failed.error.as_deref().unwrap_or("").contains("C056"));
    // block read rejected, then one batch read per device
    assert_eq!(server.request_count(), 4);
    Ok(())
}

#[tokio::test]
async fn large_batches_are_chunked_invisibly() -> Result<(), Box<dyn Error>> {
    let server = MockServer::new();
    let words: Vec<u16> = (0..40).map(|i| 1000 + i).collect();
    server.set_words("D", 0, &words).await?;
    let addr = server.spawn_local().await?;

    let input: Vec<String> = (0..40).map(|i| format!("D{i}")).collect();
    let result = BatchReadEngine::new().read(&input, &config_for(addr)).await?;

    assert_eq!(result.total_devices, 40);
    assert_eq!(result.successful_devices, 40);
    for (i, item) in result.results.iter().enumerate() {
        assert_eq!(item.device, format!("D{i}"));
        assert_eq!(item.values, vec![1000 + i32::try_from(i)?]);
    }
    // 32 + 8
    assert_eq!(server.request_count(), 2);
    Ok(())
}

#[tokio::test]
async fn later_chunk_falls_back_without_touching_earlier_results() -> Result<(), Box<dyn Error>> {
    let server = MockServer::new();
    let words: Vec<u16> = (0..40).map(|i| 500 + i).collect();
    server.set_words("D", 0, &words).await?;
    server.set_limit("D", 36).await?;
    let addr = server.spawn_local().await?;

    let input: Vec<String> = (0..40).map(|i| format!("D{i}")).collect();
    let result = BatchReadEngine::new().read(&input, &config_for(addr)).await?;

    assert_eq!(result.total_devices, 40);
    assert_eq!(result.successful_devices, 36);
    for (i, item) in result.results.iter().enumerate() {
        assert_eq!(item.device, format!("D{i}"));
        if i < 36 {
            assert!(item.success, "D{i}");
            assert_eq!(item.values, vec![500 + i32::try_from(i)?]);
        } else {
            assert!(!item.success, "D{i}");
            assert_eq!(item.error_code, Some("DeviceRangeError"));
        }
    }
    // D0..D31 in one block read; D32..D39 block read rejected, then 8 single reads
    assert_eq!(server.request_count(), 10);
    Ok(())
}

#[tokio::test]
async fn large_bit_batches_are_chunked() -> Result<(), Box<dyn Error>> {
    let server = MockServer::new();
    let pattern: Vec<bool> = (0..40).map(|i| i % 2 == 1).collect();
    server.set_bits("M", 0, &pattern).await?;
    let addr = server.spawn_local().await?;

    let input: Vec<String> = (0..40).map(|i| format!("M{i}")).collect();
    let result = BatchReadEngine::new().read(&input, &config_for(addr)).await?;

    assert_eq!(result.successful_devices, 40);
    for (i, item) in result.results.iter().enumerate() {
        assert_eq!(item.values, vec![i32::from(i % 2 == 1)], "M{i}");
    }
    assert_eq!(server.request_count(), 2);
    Ok(())
}

#[tokio::test]
async fn chunks_respect_block_read_point_limit() -> Result<(), Box<dyn Error>> {
    let server = MockServer::new();
    let addr = server.spawn_local().await?;
    server.set_words("D", 3100, &[42]).await?;

    // 32 ranges of 31 points: 992 points in total, more than one block read carries
    let input: Vec<String> = (0..32).map(|i| format!("D{}:31", i * 100)).collect();
    let result = BatchReadEngine::new().read(&input, &config_for(addr)).await?;

    assert_eq!(result.successful_devices, 32);
    assert_eq!(result.results[31].values.len(), 31);
    assert_eq!(result.results[31].values[0], 42);
    // 30 ranges, then 2
    assert_eq!(server.request_count(), 2);
    Ok(())
}

#[tokio::test]
async fn bit_devices_across_word_boundaries() -> Result<(), Box<dyn Error>> {
    let server = MockServer::new();
    let pattern: Vec<bool> = (0..20).map(|i| i % 3 == 0).collect();
    server.set_bits("M", 0, &pattern).await?;
    server.set_bits("Y", 0x1F, &[true]).await?;
    server.set_bits("X", 0x2FFF, &[true]).await?;
    let addr = server.spawn_local().await?;

    let result = BatchReadEngine::new()
        .read(&["M0:20", "Y1F", "X2FFF", "M14:4"], &config_for(addr))
        .await?;

    assert_eq!(result.successful_devices, 4);
    let expected: Vec<i32> = pattern.iter().map(|b| i32::from(*b)).collect();
    assert_eq!(result.results[0].values, expected);
    assert_eq!(result.results[1].values, vec![1]);
    assert_eq!(result.results[2].values, vec![1]);
    assert_eq!(result.results[3].values, expected[14..18].to_vec());
    Ok(())
}

#[tokio::test]
async fn concurrent_batches_share_one_engine() -> Result<(), Box<dyn Error>> {
    let server = MockServer::new();
    let words: Vec<u16> = (0..64).collect();
    server.set_words("D", 0, &words).await?;
    let addr = server.spawn_local().await?;

    let engine = BatchReadEngine::new().with_max_devices_per_request(4);
    let config = config_for(addr);
    let mut handles = Vec::new();
    for t in 0..8u32 {
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            let input: Vec<String> = (0..8).map(|i| format!("D{}", t * 8 + i)).collect();
            engine.read(&input, &config).await
        }));
    }
    for (t, handle) in handles.into_iter().enumerate() {
        let result = handle.await??;
        assert_eq!(result.successful_devices, 8);
        let first = i32::try_from(t * 8)?;
        assert_eq!(result.results[0].values, vec![first]);
        assert_eq!(result.results[7].values, vec![first + 7]);
    }
    assert_eq!(server.request_count(), 16);
    Ok(())
}
