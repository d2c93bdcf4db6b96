//! Threshold-based status classifier.
//!
//! Every comparison is a strict `<`, the same convention the reorder
//! trigger uses:
//!
//! | volume                      | status     |
//! |-----------------------------|------------|
//! | `v < min / 2`               | `Critical` |
//! | `min / 2 ≤ v < min`         | `Low`      |
//! | `v ≥ min`                   | `Normal`   |

use crate::model::Status;

/// Fraction of the minimum threshold below which the tank is critical.
pub const CRITICAL_FRACTION: f64 = 0.5;

/// Volume below which the tank is critical.
pub fn critical_level(min_threshold: f64) -> f64 {
    min_threshold * CRITICAL_FRACTION
}

/// Classify a volume against the configured minimum threshold.
pub fn classify(volume: f64, min_threshold: f64) -> Status {
    if volume < critical_level(min_threshold) {
        Status::Critical
    } else if volume < min_threshold {
        Status::Low
    } else {
        Status::Normal
    }
}
