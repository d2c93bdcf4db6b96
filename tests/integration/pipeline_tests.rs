//! Integration tests for the TankService sample pipeline and commands.
//!
//! Samples are built from target volumes through the tank geometry, so
//! every scenario runs the full clamp → volume → classify → aggregate →
//! reorder chain exactly as live telemetry would.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::mock_sinks::{RecordingSink, SinkCall};
use tankwatch::adapters::memory::MemoryStore;
use tankwatch::aggregator::Transition;
use tankwatch::app::commands::TankCommand;
use tankwatch::app::events::{CommandOutcome, DropReason, SampleOutcome};
use tankwatch::app::service::TankService;
use tankwatch::config::{EngineConfig, TankConfig};
use tankwatch::error::EngineError;
use tankwatch::model::{Severity, Status, SupplierConfirmation, TelemetrySample};
use tankwatch::reorder::ReorderDecision;

const TANK: &str = "UNI-01";

fn t(min: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(min)
}

fn config() -> TankConfig {
    let mut c = TankConfig::default();
    c.min_threshold_l = 3000.0;
    c.auto_order.enabled = true;
    c.auto_order.supplier_name = "Diesel Co".into();
    c.auto_order.target_volume_l = 15_000.0;
    c
}

fn make_service() -> TankService {
    TankService::new(TANK, config(), &EngineConfig::default()).unwrap()
}

/// Sample whose derived volume is `litres`.
fn at_volume(min: i64, litres: f64) -> TelemetrySample {
    let depth = config().geometry.depth_for_volume(litres);
    TelemetrySample::new(t(min), depth)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.5
}

// ── Refill aggregation ────────────────────────────────────────

#[test]
fn rise_within_window_extends_existing_event() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();

    svc.process_sample(at_volume(0, 1000.0), &mut sink);
    svc.process_sample(at_volume(5, 1600.0), &mut sink);
    svc.process_sample(at_volume(20, 1900.0), &mut sink);

    let opened = sink.opened();
    assert_eq!(opened.len(), 1, "exactly one event opened");
    let updated = sink.updated();
    assert_eq!(updated.len(), 1, "the second rise updates in place");
    assert_eq!(updated[0].id, opened[0].id);
    assert!(close(updated[0].volume_before, 1000.0));
    assert!(close(updated[0].volume_after, 1900.0));
    assert!(close(updated[0].amount, 900.0));

    assert_eq!(
        sink.notifications(Severity::Success).len(),
        1,
        "no second notification for an extended event"
    );
}

#[test]
fn rise_after_window_opens_new_event() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();

    svc.process_sample(at_volume(0, 1000.0), &mut sink);
    svc.process_sample(at_volume(1, 1600.0), &mut sink);
    svc.process_sample(at_volume(40, 2400.0), &mut sink);

    let opened = sink.opened();
    assert_eq!(opened.len(), 2);
    assert_ne!(opened[0].id, opened[1].id);
    assert!(close(opened[1].volume_before, 1600.0));
    assert!(close(opened[1].amount, 800.0));
    assert_eq!(sink.notifications(Severity::Success).len(), 2);
}

#[test]
fn confirmed_event_is_never_extended() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();
    let now = t(0);

    svc.process_sample(at_volume(0, 1000.0), &mut sink);
    svc.process_sample(at_volume(1, 1600.0), &mut sink);
    let id = svc.last_event().unwrap().id.clone();

    let out = svc
        .handle_command(
            TankCommand::ConfirmSupplier {
                event_id: id.clone(),
                confirmed: true,
            },
            now,
            &mut sink,
        )
        .unwrap();
    let CommandOutcome::SupplierRecorded(event) = out else {
        panic!("expected SupplierRecorded, got {out:?}");
    };
    assert_eq!(event.confirmed_supplier, SupplierConfirmation::Confirmed);

    // Still inside the window, but the event is closed.
    svc.process_sample(at_volume(3, 2000.0), &mut sink);
    let opened = sink.opened();
    assert_eq!(opened.len(), 2);
    assert!(close(opened[1].volume_before, 1600.0));

    let again = svc.handle_command(
        TankCommand::ConfirmSupplier {
            event_id: id,
            confirmed: false,
        },
        now,
        &mut sink,
    );
    assert!(matches!(again, Err(EngineError::UnknownEvent(_))));
}

#[test]
fn confirming_twice_is_rejected() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();
    svc.process_sample(at_volume(0, 1000.0), &mut sink);
    svc.process_sample(at_volume(1, 1600.0), &mut sink);
    let id = svc.last_event().unwrap().id.clone();

    let confirm = |confirmed| TankCommand::ConfirmSupplier {
        event_id: id.clone(),
        confirmed,
    };
    svc.handle_command(confirm(false), t(2), &mut sink).unwrap();
    let err = svc.handle_command(confirm(true), t(3), &mut sink).unwrap_err();
    assert_eq!(err, EngineError::EventClosed(id.clone()));
    assert_eq!(
        svc.last_event().unwrap().confirmed_supplier,
        SupplierConfirmation::Rejected
    );
}

#[test]
fn consumption_never_opens_an_event() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();
    for (i, v) in [9000.0, 8800.0, 8790.0, 8820.0, 8500.0].into_iter().enumerate() {
        svc.process_sample(at_volume(i as i64, v), &mut sink);
    }
    assert!(sink.opened().is_empty(), "drops and jitter are not refills");
    assert_eq!(sink.readings().len(), 5);
}

// ── Reorder policy ────────────────────────────────────────────

#[test]
fn falling_into_critical_places_one_order() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();

    let low = svc.process_sample(at_volume(0, 1600.0), &mut sink);
    assert_eq!(low.reading().unwrap().status, Status::Low);

    let out = svc.process_sample(at_volume(1, 1400.0), &mut sink);
    let SampleOutcome::Processed {
        reading, reorder, ..
    } = out
    else {
        panic!("sample should be processed");
    };
    assert_eq!(reading.status, Status::Critical);
    let ReorderDecision::Placed(order) = reorder else {
        panic!("expected an order, got {reorder:?}");
    };
    assert_eq!(order.supplier_name, "Diesel Co");
    assert!(close(order.volume, 15_000.0 - 1400.0));

    let again = svc.process_sample(at_volume(2, 1300.0), &mut sink);
    let SampleOutcome::Processed { reorder, .. } = again else {
        panic!("sample should be processed");
    };
    assert_eq!(reorder, ReorderDecision::AlreadyPending);

    assert_eq!(sink.orders().len(), 1);
    let alerts = sink.notifications(Severity::Critical);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].message.contains("Diesel Co"));
}

#[test]
fn disabled_auto_order_never_orders() {
    let mut c = config();
    c.auto_order.enabled = false;
    let mut svc = TankService::new(TANK, c, &EngineConfig::default()).unwrap();
    let mut sink = RecordingSink::new();

    svc.process_sample(at_volume(0, 1600.0), &mut sink);
    svc.process_sample(at_volume(1, 100.0), &mut sink);

    assert!(sink.orders().is_empty());
    assert!(svc.pending_order().is_none());
}

#[test]
fn execute_refill_clears_order_and_fills_tank() {
    let mut svc = make_service();
    let mut store = MemoryStore::new();

    svc.process_sample(at_volume(0, 1600.0), &mut store);
    svc.process_sample(at_volume(1, 1400.0), &mut store);
    assert!(store.pending_order(TANK).is_some());

    let out = svc
        .handle_command(TankCommand::ExecuteRefill, t(10), &mut store)
        .unwrap();
    let CommandOutcome::RefillExecuted { order, sample, .. } = out else {
        panic!("expected RefillExecuted, got {out:?}");
    };
    assert_eq!(store.orders(TANK), vec![order]);
    assert_eq!(store.pending_order(TANK), None);
    assert!(svc.pending_order().is_none());
    let delivered: Vec<_> = store
        .notifications()
        .into_iter()
        .filter(|n| n.severity == Severity::Info)
        .collect();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "Refill delivered");

    let reading = sample.reading().copied().unwrap();
    assert!(close(reading.volume_l, 15_000.0));
    assert_eq!(reading.status, Status::Normal);

    let SampleOutcome::Processed { transition, .. } = sample else {
        panic!("override sample should be processed");
    };
    assert!(matches!(transition, Transition::Opened(_)));
    assert_eq!(store.events(TANK).len(), 1);

    let none = svc.handle_command(TankCommand::ExecuteRefill, t(11), &mut store);
    assert_eq!(none, Err(EngineError::NoPendingOrder));
}

#[test]
fn execute_refill_keeps_order_when_reading_would_be_stale() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();

    svc.process_sample(at_volume(0, 1600.0), &mut sink);
    // Sensor clock runs ahead of the command clock.
    svc.process_sample(at_volume(20, 1400.0), &mut sink);
    let pending = svc.pending_order().cloned().unwrap();
    let calls_before = sink.calls.len();

    let err = svc
        .handle_command(TankCommand::ExecuteRefill, t(10), &mut sink)
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::StaleOverride {
            at: t(10),
            previous: t(20),
        }
    );
    assert_eq!(svc.pending_order(), Some(&pending));
    assert_eq!(sink.calls.len(), calls_before, "nothing closed or recorded");

    let out = svc
        .handle_command(TankCommand::ExecuteRefill, t(30), &mut sink)
        .unwrap();
    assert!(matches!(out, CommandOutcome::RefillExecuted { .. }));
    assert!(svc.pending_order().is_none());
}

#[test]
fn fulfilled_order_allows_a_new_one() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();

    svc.process_sample(at_volume(0, 1400.0), &mut sink);
    svc.handle_command(TankCommand::FulfilOrder, t(1), &mut sink)
        .unwrap();
    svc.process_sample(at_volume(2, 1300.0), &mut sink);

    assert_eq!(sink.orders().len(), 2);
    assert!(
        sink.calls
            .iter()
            .any(|c| matches!(c, SinkCall::OrderClosed(_)))
    );
}

// ── Delivery guarantees ───────────────────────────────────────

#[test]
fn redelivered_and_stale_samples_are_dropped() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();

    let first = at_volume(5, 9000.0);
    svc.process_sample(first, &mut sink);
    assert_eq!(
        svc.process_sample(first, &mut sink),
        SampleOutcome::Dropped(DropReason::Duplicate)
    );
    assert_eq!(
        svc.process_sample(at_volume(4, 8000.0), &mut sink),
        SampleOutcome::Dropped(DropReason::OutOfOrder)
    );
    assert_eq!(sink.readings().len(), 1);
}

#[test]
fn offline_sink_does_not_stop_the_pipeline() {
    let mut svc = make_service();
    let mut sink = RecordingSink::offline();

    svc.process_sample(at_volume(0, 1000.0), &mut sink);
    svc.process_sample(at_volume(1, 1600.0), &mut sink);
    svc.process_sample(at_volume(2, 1400.0), &mut sink);

    assert!(sink.calls.is_empty());
    assert!(svc.last_event().is_some(), "event kept in memory");
    assert!(svc.pending_order().is_some(), "order kept in memory");

    sink.offline = false;
    svc.process_sample(at_volume(3, 1000.0), &mut sink);
    assert_eq!(sink.readings().len(), 1);
    assert!(sink.orders().is_empty(), "no duplicate order once back online");
    assert!(svc.view().sink_failures > 0);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn config_change_keeps_inflight_event() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();
    svc.process_sample(at_volume(0, 1000.0), &mut sink);
    svc.process_sample(at_volume(1, 1600.0), &mut sink);
    let before = svc.last_event().cloned().unwrap();

    let mut c = config();
    c.min_threshold_l = 5000.0;
    c.nominal_capacity_l = 0.0;
    let out = svc
        .handle_command(TankCommand::UpdateConfig(c), t(2), &mut sink)
        .unwrap();
    assert!(matches!(out, CommandOutcome::ConfigApplied { .. }));
    assert_eq!(svc.last_event(), Some(&before));
    assert_eq!(svc.last_reading().unwrap().status, Status::Critical);

    svc.process_sample(at_volume(3, 1900.0), &mut sink);
    assert_eq!(sink.opened().len(), 1);
    assert_eq!(sink.updated().len(), 1);
}

#[test]
fn geometry_change_reprojects_previous_volume() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();
    let sample = at_volume(0, 5000.0);
    svc.process_sample(sample, &mut sink);

    // Twice as long: the same depth holds twice the volume.
    let mut c = config();
    c.geometry.length_mm *= 2.0;
    svc.handle_command(TankCommand::UpdateConfig(c), t(1), &mut sink)
        .unwrap();
    assert!(close(svc.last_reading().unwrap().volume_l, 10_000.0));

    // Same depth again: no phantom refill from the geometry swap.
    svc.process_sample(TelemetrySample::new(t(2), sample.depth_mm), &mut sink);
    assert!(sink.opened().is_empty());
}

#[test]
fn invalid_config_is_rejected_with_warning() {
    let mut svc = make_service();
    let mut sink = RecordingSink::new();
    let mut c = config();
    c.auto_order.supplier_name.clear();

    let err = svc
        .handle_command(TankCommand::UpdateConfig(c), t(0), &mut sink)
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert_eq!(svc.config(), &config());
    assert_eq!(sink.notifications(Severity::Warning).len(), 1);
}

// ── Warm restart ──────────────────────────────────────────────

#[test]
fn restart_resumes_from_memory_store() {
    let mut store = MemoryStore::new();
    let mut svc = make_service();
    svc.process_sample(at_volume(0, 1000.0), &mut store);
    svc.process_sample(at_volume(1, 1600.0), &mut store);
    svc.process_sample(at_volume(2, 1400.0), &mut store);
    let last = at_volume(3, 1200.0);
    svc.process_sample(last, &mut store);
    let event_id = svc.last_event().unwrap().id.clone();
    drop(svc);

    let mut warm = make_service();
    warm.restore(store.snapshot(TANK));
    assert!(warm.pending_order().is_some());

    // Redelivery of the last sample after the restart is a no-op.
    assert_eq!(
        warm.process_sample(last, &mut store),
        SampleOutcome::Dropped(DropReason::Duplicate)
    );
    warm.process_sample(at_volume(4, 1100.0), &mut store);
    assert_eq!(store.orders(TANK).len(), 1, "order survives the restart");

    warm.handle_command(
        TankCommand::ConfirmSupplier {
            event_id,
            confirmed: true,
        },
        t(5),
        &mut store,
    )
    .unwrap();
    assert_eq!(
        store.events(TANK)[0].confirmed_supplier,
        SupplierConfirmation::Confirmed
    );
}

#[test]
fn restart_drops_redelivered_out_of_range_sample() {
    let mut store = MemoryStore::new();
    let mut svc = make_service();
    let spike = TelemetrySample::new(t(0), 2500.0);
    let out = svc.process_sample(spike, &mut store);
    let SampleOutcome::Processed { clamped, .. } = out else {
        panic!("sample should be processed");
    };
    assert!(clamped);
    drop(svc);

    let mut warm = make_service();
    warm.restore(store.snapshot(TANK));
    assert_eq!(
        warm.process_sample(spike, &mut store),
        SampleOutcome::Dropped(DropReason::Duplicate)
    );

    let history = store.history(TANK);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].raw_depth_mm, 2500.0);
    assert_eq!(history[0].depth_mm, 1900.0);
}
