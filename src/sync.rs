//! Sync orchestration.
//!
//! A cycle runs FETCH_STATUS, then AGGREGATE, then DELIVER, strictly in
//! sequence. Each stage that can fail ends the cycle with its own message and
//! [`FailureKind`], so callers can tell where it broke. Only one cycle runs
//! at a time. The device reader lives behind its own mutex, so status and
//! connectivity queries wait their turn instead of sharing the session.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::aggregate::aggregate;
use crate::config::AppConfig;
use crate::delivery::DeliveryClient;
use crate::device::{DeviceLink, DeviceReader, StatusBundle};
use crate::error::{FailureKind, SyncError, SyncResult};
use crate::payload::SyncPayload;
use crate::zkteco::{Connector, PunchEvent, UserRecord, ZkConnector};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StatusBundle>,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

/// Pre-aggregation counts of what a cycle processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    pub users_count: usize,
    pub punches_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_summary: Option<DataSummary>,
    /// Set on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadPreview {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SyncPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityReport {
    pub device_connection: bool,
    pub server_connection: bool,
    pub timestamp: DateTime<Local>,
}

impl SyncOutcome {
    fn succeeded(summary: DataSummary) -> Self {
        Self {
            success: true,
            message: "Device data synced successfully".to_string(),
            timestamp: Local::now(),
            data_summary: Some(summary),
            failure: None,
        }
    }

    fn failed(kind: FailureKind, message: String) -> Self {
        Self {
            success: false,
            message,
            timestamp: Local::now(),
            data_summary: None,
            failure: Some(kind),
        }
    }
}

pub struct SyncOrchestrator {
    /// Held for the whole of a cycle
    cycle: Mutex<()>,
    reader: Mutex<DeviceReader>,
    delivery: DeliveryClient,
}

impl SyncOrchestrator {
    pub fn new(config: &AppConfig, connector: impl Connector + 'static) -> SyncResult<Self> {
        Ok(Self {
            cycle: Mutex::new(()),
            reader: Mutex::new(DeviceReader::new(DeviceLink::new(connector))),
            delivery: DeliveryClient::new(&config.server)?,
        })
    }

    /// Orchestrator talking to the configured ZKTeco device
    pub fn from_config(config: &AppConfig) -> SyncResult<Self> {
        Self::new(config, ZkConnector::new(config.device.clone()))
    }

    pub async fn get_status(&self) -> StatusResponse {
        let mut reader = self.reader.lock().await;
        match reader.get_status().await {
            Ok(status) => StatusResponse {
                success: true,
                data: Some(status),
                message: "Device status retrieved".to_string(),
                timestamp: Local::now(),
            },
            Err(e) => {
                log::error!("[sync] Error getting device status: {}", e);
                StatusResponse {
                    success: false,
                    data: None,
                    message: format!("Device status unavailable: {}", e),
                    timestamp: Local::now(),
                }
            }
        }
    }

    /// One full cycle. Returns at once with a busy outcome if another cycle
    /// is still running. Status and connectivity queries in flight are
    /// waited for, not treated as busy.
    pub async fn run_sync_cycle(&self) -> SyncOutcome {
        let _cycle = match self.cycle.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("[sync] Sync requested while another cycle is running");
                return SyncOutcome::failed(FailureKind::Busy, SyncError::Busy.to_string());
            }
        };

        log::info!("[sync] Starting device data sync");

        let snapshot = {
            let mut reader = self.reader.lock().await;
            reader.snapshot().await
        };
        let snapshot = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("[sync] Device status unavailable: {}", e);
                return SyncOutcome::failed(e.kind(), format!("Device status unavailable: {}", e));
            }
        };
        let summary = DataSummary {
            users_count: snapshot.users.len(),
            punches_count: snapshot.punches.len(),
        };

        let payload = match aggregate_off_thread(snapshot.users, snapshot.punches).await {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("[sync] {}", e);
                return SyncOutcome::failed(e.kind(), e.to_string());
            }
        };

        if let Err(e) = self.delivery.send(&payload).await {
            log::error!("[sync] {}", e);
            return SyncOutcome::failed(e.kind(), e.to_string());
        }

        log::info!(
            "[sync] Sync complete: {} users, {} punches, {} records",
            summary.users_count,
            summary.punches_count,
            payload.record_count()
        );
        SyncOutcome::succeeded(summary)
    }

    /// The payload a cycle would deliver right now, without delivering it
    pub async fn preview_payload(&self) -> PayloadPreview {
        let snapshot = {
            let mut reader = self.reader.lock().await;
            reader.snapshot().await
        };

        let result = match snapshot {
            Ok(snapshot) => aggregate_off_thread(snapshot.users, snapshot.punches).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(payload) => PayloadPreview {
                success: true,
                message: format!("Prepared {} attendance records", payload.record_count()),
                timestamp: Local::now(),
                data: Some(payload),
            },
            Err(e) => {
                log::error!("[sync] Payload preview failed: {}", e);
                PayloadPreview {
                    success: false,
                    message: e.to_string(),
                    timestamp: Local::now(),
                    data: None,
                }
            }
        }
    }

    pub async fn test_connectivity(&self) -> ConnectivityReport {
        let device_connection = {
            let mut reader = self.reader.lock().await;
            reader.link_mut().test_connection().await
        };
        if !device_connection {
            log::error!("[sync] Device connection test failed");
        }

        let server_connection = self.delivery.test_server_reachable().await;

        ConnectivityReport {
            device_connection,
            server_connection,
            timestamp: Local::now(),
        }
    }
}

async fn aggregate_off_thread(users: Vec<UserRecord>, punches: Vec<PunchEvent>) -> SyncResult<SyncPayload> {
    tokio::task::spawn_blocking(move || aggregate(&users, &punches))
        .await
        .map_err(|e| SyncError::Formatting(format!("aggregation task failed: {}", e)))
}
