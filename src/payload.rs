//! Wire shape of the import request body.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CARD_PLACEHOLDER: &str = "0";
pub const VERIFICATION_FINGERPRINT: &str = "Fingerprint";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub period: Period,
    pub attendance_records: Vec<AttendanceRecord>,
}

/// Inclusive date range covered by the records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One row per (date, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub id_number: String,
    pub name: String,
    /// Distinct `HH:MM:SS` values, ascending
    pub times: Vec<String>,
    pub card: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily: Option<DailyDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyDetail {
    pub date: NaiveDate,
    pub user_id: String,
    pub attendance_details: Vec<AttendanceDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceDetail {
    pub date: NaiveDate,
    pub id_number: String,
    pub name: String,
    pub time: String,
    pub status: PunchStatus,
    pub verification: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunchStatus {
    #[serde(rename = "Check In")]
    CheckIn,
    #[serde(rename = "Check Out")]
    CheckOut,
}

impl PunchStatus {
    /// Label for the punch at `index` within its day (0 = first)
    pub fn for_position(index: usize) -> Self {
        if index % 2 == 0 {
            PunchStatus::CheckIn
        } else {
            PunchStatus::CheckOut
        }
    }
}

impl SyncPayload {
    pub fn record_count(&self) -> usize {
        self.attendance_records.len()
    }
}
