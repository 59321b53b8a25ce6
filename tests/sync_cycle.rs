mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    sample_punches, sample_users, spawn_import_server, test_config, Script, ScriptedConnector,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use zk_attendance_sync::{DeliveryClient, FailureKind, SyncError, SyncOrchestrator, SyncScheduler};

fn orchestrator(script: &Arc<Script>, config: &zk_attendance_sync::AppConfig) -> SyncOrchestrator {
    SyncOrchestrator::new(
        config,
        ScriptedConnector {
            script: script.clone(),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn cycle_delivers_grouped_records() {
    let (addr, server) = spawn_import_server(vec![200], 200).await;
    let script = Script::with_data(sample_users(), sample_punches());
    let sync = orchestrator(&script, &test_config(addr));

    let outcome = sync.run_sync_cycle().await;

    assert!(outcome.success, "{}", outcome.message);
    let summary = outcome.data_summary.unwrap();
    assert_eq!(summary.users_count, 2);
    assert_eq!(summary.punches_count, 3);
    assert_eq!(server.posts(), 1);

    let body = server.bodies.lock().unwrap()[0].clone();
    assert_eq!(
        body["period"],
        json!({"start_date": "2024-01-01", "end_date": "2024-01-01"})
    );
    let records = body["attendance_records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["name"], "John Doe");
    assert_eq!(records[0]["times"], json!(["08:00:00", "17:00:00"]));
    assert_eq!(
        records[0]["daily"]["attendance_details"][1]["status"],
        "Check Out"
    );
    assert!(records[1].get("daily").is_none());

    let headers = server.headers.lock().unwrap()[0].clone();
    assert_eq!(headers["authorization"], "Bearer secret-token");
    assert_eq!(headers["accept"], "application/json");
    assert_eq!(headers["content-type"], "application/json");
}

#[tokio::test]
async fn empty_device_still_syncs() {
    let (addr, server) = spawn_import_server(vec![200], 200).await;
    let script = Script::with_data(sample_users(), Vec::new());
    let sync = orchestrator(&script, &test_config(addr));

    let outcome = sync.run_sync_cycle().await;

    assert!(outcome.success);
    assert_eq!(outcome.data_summary.unwrap().punches_count, 0);
    let body = server.bodies.lock().unwrap()[0].clone();
    assert_eq!(body["attendance_records"], json!([]));
    assert_eq!(body["period"]["start_date"], body["period"]["end_date"]);
}

#[tokio::test]
async fn unavailable_server_exhausts_attempts() {
    let (addr, server) = spawn_import_server(vec![503], 200).await;
    let script = Script::with_data(sample_users(), sample_punches());
    let sync = orchestrator(&script, &test_config(addr));

    let started = Instant::now();
    let outcome = sync.run_sync_cycle().await;
    let elapsed = started.elapsed();

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::Delivery));
    assert!(outcome.message.starts_with("Delivery failed after 3 attempt(s)"));
    assert_eq!(outcome.message.matches("Delivery failed").count(), 1);
    assert!(outcome.data_summary.is_none());
    assert_eq!(server.posts(), 3);
    // two one-second pauses, none after the last attempt
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test]
async fn delivery_recovers_after_transient_rejection() {
    let (addr, server) = spawn_import_server(vec![500, 200], 200).await;
    let config = test_config(addr);
    let client = DeliveryClient::new(&config.server).unwrap();
    let payload = zk_attendance_sync::aggregate(&sample_users(), &sample_punches());

    client.send(&payload).await.unwrap();

    assert_eq!(server.posts(), 2);
}

#[tokio::test]
async fn refused_connections_exhaust_attempts() {
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let client = DeliveryClient::new(&test_config(addr).server).unwrap();
    let payload = zk_attendance_sync::aggregate(&sample_users(), &sample_punches());

    let started = Instant::now();
    let result = client.send(&payload).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(SyncError::Delivery { attempts: 3, .. })));
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test]
async fn unreachable_device_reports_status_stage() {
    let (addr, server) = spawn_import_server(vec![200], 200).await;
    let script = Script::new();
    script
        .refuse_connect
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let sync = orchestrator(&script, &test_config(addr));

    let outcome = sync.run_sync_cycle().await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(FailureKind::Connection));
    assert!(outcome.message.starts_with("Device status unavailable"));
    assert_eq!(server.posts(), 0);

    let status = sync.get_status().await;
    assert!(!status.success);
    assert!(status.data.is_none());
}

#[tokio::test]
async fn overlapping_cycle_is_rejected() {
    let (addr, _server) = spawn_import_server(vec![200], 200).await;
    let script = Script::with_data(sample_users(), sample_punches());
    *script.read_delay.lock().unwrap() = Duration::from_millis(300);
    let sync = Arc::new(orchestrator(&script, &test_config(addr)));

    let first = tokio::spawn({
        let sync = sync.clone();
        async move { sync.run_sync_cycle().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = sync.run_sync_cycle().await;
    assert!(!second.success);
    assert_eq!(second.failure, Some(FailureKind::Busy));

    let first = first.await.unwrap();
    assert!(first.success, "{}", first.message);
}

#[tokio::test]
async fn cycle_waits_for_status_query_instead_of_reporting_busy() {
    let (addr, server) = spawn_import_server(vec![200], 200).await;
    let script = Script::with_data(sample_users(), sample_punches());
    *script.read_delay.lock().unwrap() = Duration::from_millis(300);
    let sync = Arc::new(orchestrator(&script, &test_config(addr)));

    let status = tokio::spawn({
        let sync = sync.clone();
        async move { sync.get_status().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = sync.run_sync_cycle().await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.failure, None);
    assert_eq!(server.posts(), 1);
    assert!(status.await.unwrap().success);
}

#[tokio::test]
async fn status_reports_counts() {
    let (addr, _server) = spawn_import_server(vec![200], 200).await;
    let script = Script::with_data(sample_users(), sample_punches());
    let sync = orchestrator(&script, &test_config(addr));

    let status = sync.get_status().await;

    assert!(status.success);
    let data = status.data.unwrap();
    assert_eq!(data.users_count, 2);
    assert_eq!(data.attendance_count, 3);
    let value = serde_json::to_value(&data).unwrap();
    assert_eq!(value["deviceInfo"]["serialNumber"], "A8N5230560123");
}

#[tokio::test]
async fn preview_does_not_deliver() {
    let (addr, server) = spawn_import_server(vec![200], 200).await;
    let script = Script::with_data(sample_users(), sample_punches());
    let sync = orchestrator(&script, &test_config(addr));

    let preview = sync.preview_payload().await;

    assert!(preview.success);
    assert_eq!(preview.data.unwrap().record_count(), 2);
    assert_eq!(server.posts(), 0);
}

#[tokio::test]
async fn connectivity_accepts_missing_health_route() {
    let (addr, server) = spawn_import_server(vec![200], 404).await;
    let script = Script::new();
    let sync = orchestrator(&script, &test_config(addr));

    let report = sync.test_connectivity().await;

    assert!(report.device_connection);
    assert!(report.server_connection);
    assert_eq!(
        server
            .health_checks
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn connectivity_flags_failing_server() {
    let (addr, _server) = spawn_import_server(vec![200], 500).await;
    let script = Script::new();
    script
        .refuse_connect
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let sync = orchestrator(&script, &test_config(addr));

    let report = sync.test_connectivity().await;

    assert!(!report.device_connection);
    assert!(!report.server_connection);
}

#[tokio::test]
async fn scheduler_runs_immediately_and_stops_on_cancel() {
    let (addr, server) = spawn_import_server(vec![200], 200).await;
    let script = Script::with_data(sample_users(), sample_punches());
    let config = test_config(addr);
    let sync = Arc::new(orchestrator(&script, &config));
    let scheduler = SyncScheduler::new(sync, &config.sync).unwrap();

    let ctx = CancellationToken::new();
    let handle = tokio::spawn({
        let ctx = ctx.clone();
        async move { scheduler.run(ctx).await }
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.posts() == 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.posts(), 1);

    ctx.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}
