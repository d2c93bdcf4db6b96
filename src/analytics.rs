//! Read-only summaries over a tank's reading history.
//!
//! History is expected oldest first, as the history sink receives it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::classifier::{classify, critical_level};
use crate::model::{DerivedReading, Status};

/// Litres consumed on one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyConsumption {
    pub day: NaiveDate,
    pub litres: f64,
}

/// Sum of volume drops per day over the last `days` days that saw any
/// consumption.  Rises (refills) are ignored.  A drop is attributed to
/// the day of the later reading.
pub fn daily_consumption(history: &[DerivedReading], days: usize) -> Vec<DailyConsumption> {
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for pair in history.windows(2) {
        let drop = pair[0].volume_l - pair[1].volume_l;
        if drop > 0.0 {
            *per_day.entry(pair[1].timestamp.date_naive()).or_default() += drop;
        }
    }
    let skip = per_day.len().saturating_sub(days);
    per_day
        .into_iter()
        .skip(skip)
        .map(|(day, litres)| DailyConsumption { day, litres })
        .collect()
}

/// Timestamp of the most recent reading below the critical level.
pub fn last_critical_at(history: &[DerivedReading], min_threshold_l: f64) -> Option<DateTime<Utc>> {
    history
        .iter()
        .rev()
        .find(|r| classify(r.volume_l, min_threshold_l) == Status::Critical)
        .map(|r| r.timestamp)
}

/// Litres above the minimum threshold.  Negative when below it.
pub fn safety_margin(volume_l: f64, min_threshold_l: f64) -> f64 {
    volume_l - min_threshold_l
}

/// Litres left before the reorder trigger fires.
pub fn headroom_to_critical(volume_l: f64, min_threshold_l: f64) -> f64 {
    volume_l - critical_level(min_threshold_l)
}
