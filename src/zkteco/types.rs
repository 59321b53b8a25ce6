//! Records read from a ZKTeco device

use serde::{Deserialize, Serialize};

/// Identity snapshot of the device, refreshed on every read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_name: String,
    pub serial_number: String,
    pub firmware_version: String,
    /// Device clock as `YYYY-MM-DD HH:MM:SS`, device-local
    pub device_time: String,
    pub ip_address: String,
    pub port: u16,
}

/// A user enrolled on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub name: String,
    pub card: u32,
    pub privilege: u8,
    pub password: String,
    pub group_id: String,
    /// Device-internal slot numbers the user occupies
    pub user_sns: Vec<u16>,
    pub work_code: u32,
}

/// A single punch stored on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PunchEvent {
    pub user_id: String,
    /// `YYYY-MM-DD HH:MM:SS`, device-local
    pub timestamp: String,
    pub status: u8,
    pub punch: u8,
}

impl PunchEvent {
    pub fn new(user_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: timestamp.into(),
            status: 0,
            punch: 0,
        }
    }
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            card: 0,
            privilege: 0,
            password: String::new(),
            group_id: String::new(),
            user_sns: Vec::new(),
            work_code: 0,
        }
    }
}
