use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::link::DeviceLink;
use crate::error::SyncResult;
use crate::zkteco::{DeviceIdentity, PunchEvent, UserRecord};

/// Lightweight device status, as reported to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBundle {
    pub device_info: DeviceIdentity,
    pub users_count: usize,
    pub attendance_count: usize,
    pub connected: bool,
    pub timestamp: DateTime<Local>,
}

/// Status plus the roster and punches it was computed from
#[derive(Debug, Clone)]
pub struct DeviceSnapshot {
    pub status: StatusBundle,
    pub users: Vec<UserRecord>,
    pub punches: Vec<PunchEvent>,
}

/// Read-only view of the device; every read follows the link's reconnect-once policy
pub struct DeviceReader {
    link: DeviceLink,
}

impl DeviceReader {
    pub fn new(link: DeviceLink) -> Self {
        Self { link }
    }

    pub fn link_mut(&mut self) -> &mut DeviceLink {
        &mut self.link
    }

    pub async fn get_identity(&mut self) -> SyncResult<DeviceIdentity> {
        let identity = self.link.read("device info", |s| s.identity()).await?;
        log::info!("[device] Retrieved device info: {}", identity.device_name);
        Ok(identity)
    }

    /// Roster in device order
    pub async fn get_users(&mut self) -> SyncResult<Vec<UserRecord>> {
        let users = self.link.read("users", |s| s.users()).await?;
        log::info!("[device] Retrieved {} users from device", users.len());
        Ok(users)
    }

    /// Every punch currently stored, in device order
    pub async fn get_punches(&mut self) -> SyncResult<Vec<PunchEvent>> {
        let punches = self.link.read("attendance", |s| s.punches()).await?;
        log::info!("[device] Retrieved {} attendance records from device", punches.len());
        Ok(punches)
    }

    /// Identity, roster and punches in one pass.
    ///
    /// Only the identity read is mandatory; a failed roster or punch read is
    /// logged and counted as empty.
    pub async fn snapshot(&mut self) -> SyncResult<DeviceSnapshot> {
        let device_info = self.get_identity().await?;

        let users = self.get_users().await.unwrap_or_else(|e| {
            log::warn!("[device] Users unavailable, counting none: {}", e);
            Vec::new()
        });
        let punches = self.get_punches().await.unwrap_or_else(|e| {
            log::warn!("[device] Attendance unavailable, counting none: {}", e);
            Vec::new()
        });

        let status = StatusBundle {
            device_info,
            users_count: users.len(),
            attendance_count: punches.len(),
            connected: true,
            timestamp: Local::now(),
        };
        log::info!(
            "[device] Device status retrieved: {} users, {} attendance records",
            status.users_count,
            status.attendance_count
        );

        Ok(DeviceSnapshot { status, users, punches })
    }

    pub async fn get_status(&mut self) -> SyncResult<StatusBundle> {
        Ok(self.snapshot().await?.status)
    }
}
