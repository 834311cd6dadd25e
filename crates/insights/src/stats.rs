//! Usage Statistics

use chrono::{Datelike, Timelike, Weekday};
use serde::Serialize;
use telemetry::Reading;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Aggregated fill behaviour of one bin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    /// Percentage points of fill gained per hour, ignoring emptying
    pub average_fill_rate: f64,
    /// Weekday with the highest mean fill
    pub peak_day: Weekday,
    /// Hour of day (UTC) with the highest mean fill
    pub peak_hour: u32,
}

impl WeeklyStats {
    /// Aggregate readings (oldest first). `None` with fewer than two.
    pub fn from_history<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Option<Self> {
        let readings: Vec<&Reading> = readings.into_iter().collect();
        if readings.len() < 2 {
            return None;
        }

        let rise: f64 = readings
            .windows(2)
            .map(|pair| (f64::from(pair[1].fill_percentage) - f64::from(pair[0].fill_percentage)).max(0.0))
            .sum();
        let span_hours = (readings[readings.len() - 1].timestamp - readings[0].timestamp).num_seconds() as f64 / 3600.0;
        let average_fill_rate = if span_hours > 0.0 { rise / span_hours } else { 0.0 };

        let mut by_day = [(0.0f64, 0u32); 7];
        let mut by_hour = [(0.0f64, 0u32); 24];
        for reading in &readings {
            let fill = f64::from(reading.fill_percentage);
            let day = &mut by_day[reading.timestamp.weekday().num_days_from_monday() as usize];
            day.0 += fill;
            day.1 += 1;
            let hour = &mut by_hour[reading.timestamp.hour() as usize];
            hour.0 += fill;
            hour.1 += 1;
        }

        let peak_day = WEEKDAYS[peak_index(&by_day)?];
        let peak_hour = peak_index(&by_hour)? as u32;

        Some(Self {
            average_fill_rate,
            peak_day,
            peak_hour,
        })
    }
}

/// Index of the bucket with the highest mean; earliest wins ties
fn peak_index(buckets: &[(f64, u32)]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, (sum, count)) in buckets.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        let mean = sum / f64::from(*count);
        if best.map_or(true, |(_, m)| mean > m) {
            best = Some((i, mean));
        }
    }
    best.map(|(i, _)| i)
}
