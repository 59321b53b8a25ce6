//! Punch aggregation.
//!
//! Turns a flat list of punches plus the roster into one record per
//! (date, user), ordered by date then user id. Punch labels alternate
//! Check In / Check Out by position within the day; the device's own
//! punch-type code is ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::payload::{
    AttendanceDetail, AttendanceRecord, DailyDetail, Period, PunchStatus, SyncPayload,
    CARD_PLACEHOLDER, VERIFICATION_FINGERPRINT,
};
use crate::zkteco::{PunchEvent, UserRecord};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Default)]
struct DayBucket {
    times: BTreeSet<NaiveTime>,
    punches: Vec<NaiveTime>,
}

/// Aggregate against today's local date (used for the empty-period fallback)
pub fn aggregate(users: &[UserRecord], punches: &[PunchEvent]) -> SyncPayload {
    aggregate_on(users, punches, Local::now().date_naive())
}

pub fn aggregate_on(users: &[UserRecord], punches: &[PunchEvent], today: NaiveDate) -> SyncPayload {
    let names: HashMap<&str, &str> = users
        .iter()
        .map(|u| (u.user_id.as_str(), u.name.as_str()))
        .collect();

    let mut buckets: BTreeMap<(NaiveDate, &str), DayBucket> = BTreeMap::new();
    let mut skipped = 0usize;

    for punch in punches {
        let at = match NaiveDateTime::parse_from_str(&punch.timestamp, TIMESTAMP_FORMAT) {
            Ok(at) => at,
            Err(e) => {
                skipped += 1;
                log::warn!(
                    "[aggregate] Skipping punch for user {} with bad timestamp {:?}: {}",
                    punch.user_id,
                    punch.timestamp,
                    e
                );
                continue;
            }
        };

        let bucket = buckets
            .entry((at.date(), punch.user_id.as_str()))
            .or_default();
        bucket.times.insert(at.time());
        bucket.punches.push(at.time());
    }

    let period = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some((first, _)), Some((last, _))) => Period {
            start_date: *first,
            end_date: *last,
        },
        _ => Period {
            start_date: today,
            end_date: today,
        },
    };

    let attendance_records: Vec<AttendanceRecord> = buckets
        .into_iter()
        .map(|((date, user_id), bucket)| {
            let name = names
                .get(user_id)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("User {}", user_id));
            build_record(date, user_id, name, bucket)
        })
        .collect();

    log::info!(
        "[aggregate] Built {} records from {} punches ({} skipped), period {} to {}",
        attendance_records.len(),
        punches.len(),
        skipped,
        period.start_date,
        period.end_date
    );

    SyncPayload {
        period,
        attendance_records,
    }
}

fn build_record(date: NaiveDate, user_id: &str, name: String, mut bucket: DayBucket) -> AttendanceRecord {
    let times = bucket
        .times
        .iter()
        .map(|t| t.format(TIME_FORMAT).to_string())
        .collect();

    let daily = if bucket.punches.len() > 1 {
        // stable, so equal timestamps keep device order
        bucket.punches.sort();
        let attendance_details = bucket
            .punches
            .iter()
            .enumerate()
            .map(|(i, t)| AttendanceDetail {
                date,
                id_number: user_id.to_string(),
                name: name.clone(),
                time: t.format(TIME_FORMAT).to_string(),
                status: PunchStatus::for_position(i),
                verification: VERIFICATION_FINGERPRINT.to_string(),
            })
            .collect();
        Some(DailyDetail {
            date,
            user_id: user_id.to_string(),
            attendance_details,
        })
    } else {
        None
    };

    AttendanceRecord {
        date,
        id_number: user_id.to_string(),
        name,
        times,
        card: CARD_PLACEHOLDER.to_string(),
        daily,
    }
}
