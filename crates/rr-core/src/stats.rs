//! # Aggregate Statistics
//!
//! Formats grouped counts coming out of the repository into the shapes the
//! API and the admin dashboard render. Nothing here touches storage.

use crate::models::{IncidentStatus, IncidentType};
use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// `count` as an integer percentage of `total`; 0 when `total` is 0.
pub fn percentage(count: i64, total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        count * 100 / total
    }
}

/// One labelled bar of a breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub count: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: &'static str,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: i64,
}

/// Status breakdown in declaration order, skipping statuses with no rows.
pub fn status_breakdown(rows: &[(IncidentStatus, i64)], total: i64) -> Vec<StatEntry> {
    IncidentStatus::ALL
        .iter()
        .filter_map(|status| {
            let count = lookup(rows, status);
            (count > 0).then(|| StatEntry {
                key: status.as_str(),
                label: status.label(),
                count,
                percentage: percentage(count, total),
            })
        })
        .collect()
}

/// Type breakdown in declaration order, skipping types with no rows.
pub fn type_breakdown(rows: &[(IncidentType, i64)], total: i64) -> Vec<StatEntry> {
    IncidentType::ALL
        .iter()
        .filter_map(|kind| {
            let count = lookup(rows, kind);
            (count > 0).then(|| StatEntry {
                key: kind.as_str(),
                label: kind.label(),
                count,
                percentage: percentage(count, total),
            })
        })
        .collect()
}

/// Every status as a key, zero-filled.
pub fn status_counts(rows: &[(IncidentStatus, i64)]) -> BTreeMap<&'static str, i64> {
    IncidentStatus::ALL
        .iter()
        .map(|status| (status.as_str(), lookup(rows, status)))
        .collect()
}

/// Every incident type as a key, zero-filled.
pub fn type_counts(rows: &[(IncidentType, i64)]) -> BTreeMap<&'static str, i64> {
    IncidentType::ALL
        .iter()
        .map(|kind| (kind.as_str(), lookup(rows, kind)))
        .collect()
}

/// Monday-first counts of creation weekday (UTC).
pub fn weekday_counts(timestamps: &[DateTime<Utc>]) -> Vec<DayCount> {
    let mut counts = [0i64; 7];
    for ts in timestamps {
        counts[ts.weekday().num_days_from_monday() as usize] += 1;
    }
    WEEKDAYS
        .iter()
        .zip(counts)
        .map(|(day, count)| DayCount {
            day: weekday_name(*day),
            count,
        })
        .collect()
}

/// Ascending counts per calendar month (UTC), months with no rows omitted.
pub fn month_counts(timestamps: &[DateTime<Utc>]) -> Vec<MonthCount> {
    let mut buckets: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    for ts in timestamps {
        *buckets.entry((ts.year(), ts.month())).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|((year, month), count)| MonthCount {
            month: format!("{:04}-{:02}", year, month),
            count,
        })
        .collect()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn lookup<K: PartialEq>(rows: &[(K, i64)], key: &K) -> i64 {
    rows.iter()
        .filter(|(k, _)| k == key)
        .map(|(_, count)| *count)
        .sum()
}

/// Response body of the statistics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentStatistics {
    pub total: i64,
    pub by_type: BTreeMap<&'static str, i64>,
    pub by_status: BTreeMap<&'static str, i64>,
    pub by_day_of_week: Vec<DayCount>,
    pub by_month: Vec<MonthCount>,
}

impl IncidentStatistics {
    pub fn build(
        total: i64,
        by_status: &[(IncidentStatus, i64)],
        by_type: &[(IncidentType, i64)],
        timestamps: &[DateTime<Utc>],
    ) -> Self {
        Self {
            total,
            by_type: type_counts(by_type),
            by_status: status_counts(by_status),
            by_day_of_week: weekday_counts(timestamps),
            by_month: month_counts(timestamps),
        }
    }
}
