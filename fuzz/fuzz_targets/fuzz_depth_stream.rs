//! Fuzz target: `TankService::process_sample`
//!
//! Decodes the input as a stream of (time step, depth) pairs, including
//! negative steps, NaN and infinite depths, and runs it through a full
//! pipeline.  Asserts that nothing panics, every recorded volume lies in
//! `[0, full]`, and refill amounts stay positive.
//!
//! cargo fuzz run fuzz_depth_stream

#![no_main]

use chrono::{Duration, TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use tankwatch::adapters::memory::MemoryStore;
use tankwatch::app::service::TankService;
use tankwatch::config::{EngineConfig, TankConfig};
use tankwatch::model::TelemetrySample;

fuzz_target!(|data: &[u8]| {
    let mut config = TankConfig::default();
    config.auto_order.enabled = true;
    config.auto_order.supplier_name = "Fuzz Fuel".into();
    let full = config.geometry.full_volume();

    let Ok(mut service) = TankService::new("FUZZ", config, &EngineConfig::default()) else {
        return;
    };
    let mut store = MemoryStore::new();
    let mut at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

    for chunk in data.chunks_exact(10) {
        let step = i16::from_le_bytes([chunk[0], chunk[1]]);
        let depth = f64::from_le_bytes([
            chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7], chunk[8], chunk[9],
        ]);
        at += Duration::seconds(i64::from(step));
        service.process_sample(TelemetrySample::new(at, depth), &mut store);
    }

    for reading in store.history("FUZZ") {
        assert!(reading.volume_l >= 0.0 && reading.volume_l <= full + 1e-6);
    }
    for event in store.events("FUZZ") {
        assert!(event.amount > 0.0, "refill amount must be positive");
    }
});
