//! Pure aggregation over stored records: window statistics and calendar
//! buckets. Every energy figure assumes one record per minute.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::Serialize;

/// Records per hour at the nominal logging cadence.
pub const READINGS_PER_HOUR: f64 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PowerTempRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub power_watts: f64,
    pub cpu_temp_c: f64,
    pub gpu_temp_c: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Stats {
    pub count: u64,
    pub avg_power: f64,
    pub max_power: f64,
    pub min_power: f64,
    pub total_energy_kwh: f64,
    pub window_hours: f64,
}

impl Stats {
    pub fn from_aggregates(count: u64, avg_power: f64, max_power: f64, min_power: f64) -> Self {
        if count == 0 {
            return Stats::default();
        }
        let window_hours = count as f64 / READINGS_PER_HOUR;
        Stats {
            count,
            avg_power,
            max_power,
            min_power,
            total_energy_kwh: avg_power * window_hours / 1000.0,
            window_hours,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HourlyAverage {
    /// Local wall-clock start of the hour.
    pub hour: NaiveDateTime,
    pub avg_power: f64,
}

impl HourlyAverage {
    pub fn label(&self) -> String {
        self.hour.format("%Y-%m-%d %H:00").to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DailyAverage {
    pub day: NaiveDate,
    pub avg_power: f64,
    pub energy_kwh: f64,
}

impl DailyAverage {
    pub fn label(&self) -> String {
        self.day.format("%Y-%m-%d").to_string()
    }
}

#[derive(Default)]
struct Bucket {
    sum: f64,
    count: u64,
}

impl Bucket {
    fn add(&mut self, watts: f64) {
        self.sum += watts;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

fn hour_start(at: NaiveDateTime) -> NaiveDateTime {
    at.date()
        .and_hms_opt(at.hour(), 0, 0)
        .unwrap_or(at)
}

pub fn hourly_buckets<Tz: TimeZone>(records: &[PowerTempRecord], tz: &Tz) -> Vec<HourlyAverage> {
    let mut buckets: BTreeMap<NaiveDateTime, Bucket> = BTreeMap::new();
    for record in records {
        let local = record.timestamp.with_timezone(tz).naive_local();
        buckets
            .entry(hour_start(local))
            .or_default()
            .add(record.power_watts);
    }
    buckets
        .into_iter()
        .map(|(hour, bucket)| HourlyAverage {
            hour,
            avg_power: bucket.mean(),
        })
        .collect()
}

pub fn daily_buckets<Tz: TimeZone>(records: &[PowerTempRecord], tz: &Tz) -> Vec<DailyAverage> {
    let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
    for record in records {
        let day = record.timestamp.with_timezone(tz).date_naive();
        buckets.entry(day).or_default().add(record.power_watts);
    }
    buckets
        .into_iter()
        .map(|(day, bucket)| DailyAverage {
            day,
            avg_power: bucket.mean(),
            energy_kwh: bucket.sum / READINGS_PER_HOUR / 1000.0,
        })
        .collect()
}
