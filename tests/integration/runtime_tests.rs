//! Integration tests for the per-tank actor and the generator task.
//!
//! Tokio time is paused, so interval ticks fire as soon as every task is
//! idle; the wall clock the generator gates on is a [`ManualClock`].

use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;

use tankwatch::adapters::memory::MemoryStore;
use tankwatch::adapters::time::ManualClock;
use tankwatch::app::commands::TankCommand;
use tankwatch::app::ports::{ConfigStore, SampleSource};
use tankwatch::app::service::TankService;
use tankwatch::config::{EngineConfig, GeneratorConfig, TankConfig};
use tankwatch::error::EngineError;
use tankwatch::model::TelemetrySample;
use tankwatch::runtime::{
    DEFAULT_COMMAND_CAPACITY, TankHandle, follow_config, run_generator, spawn_tank,
};

const TANK: &str = "UNI-01";

/// Wednesday 1 May 2024, 10:00 UTC.
fn wednesday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

/// Saturday 4 May 2024, 10:00 UTC.
fn saturday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap()
}

fn service() -> TankService {
    TankService::new(TANK, TankConfig::default(), &EngineConfig::default()).unwrap()
}

fn generator_config() -> GeneratorConfig {
    GeneratorConfig {
        enabled: true,
        tick_interval_secs: 10,
        inflow_probability: 0.0,
        ..GeneratorConfig::default()
    }
}

/// Round-trip a command so everything queued before it has been processed.
async fn flush(handle: &TankHandle) {
    let out = handle.send(TankCommand::FulfilOrder).await;
    assert_eq!(out, Err(EngineError::NoPendingOrder));
}

#[tokio::test(start_paused = true)]
async fn generator_feeds_pipeline_during_business_hours() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(wednesday_morning());
    let shutdown = CancellationToken::new();
    let (handle, task) = spawn_tank(
        service(),
        store.clone(),
        clock.clone(),
        DEFAULT_COMMAND_CAPACITY,
        shutdown.clone(),
    );

    let stop_generator = CancellationToken::new();
    let producer = handle.claim_producer().unwrap();
    let generator = tokio::spawn(run_generator(
        producer,
        generator_config(),
        clock.clone(),
        StdRng::seed_from_u64(7),
        stop_generator.clone(),
    ));

    tokio::time::sleep(StdDuration::from_secs(35)).await;
    stop_generator.cancel();
    let report = generator.await.unwrap();
    flush(&handle).await;

    assert_eq!(report.ticks, 4, "ticks at 0s, 10s, 20s and 30s");
    assert!(report.emitted > 0, "weekday morning must emit");
    assert_eq!(report.rejected, 0);

    let view = handle.view();
    assert_eq!(view.samples_processed, report.emitted);
    let history = store.history(TANK);
    assert_eq!(history.len() as u64, report.emitted);
    assert!(
        history.windows(2).all(|w| w[1].volume_l < w[0].volume_l),
        "consumption only when inflow is disabled"
    );

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn generator_is_silent_on_weekends() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(saturday_morning());
    let shutdown = CancellationToken::new();
    let (handle, task) = spawn_tank(
        service(),
        store.clone(),
        clock.clone(),
        DEFAULT_COMMAND_CAPACITY,
        shutdown.clone(),
    );

    let stop_generator = CancellationToken::new();
    let generator = tokio::spawn(run_generator(
        handle.claim_producer().unwrap(),
        generator_config(),
        clock,
        StdRng::seed_from_u64(7),
        stop_generator.clone(),
    ));

    tokio::time::sleep(StdDuration::from_secs(60)).await;
    stop_generator.cancel();
    let report = generator.await.unwrap();
    flush(&handle).await;

    assert!(report.ticks > 0);
    assert_eq!(report.emitted, 0);
    assert!(store.history(TANK).is_empty());

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn only_one_producer_per_tank() {
    let (handle, _task) = spawn_tank(
        service(),
        MemoryStore::new(),
        ManualClock::new(wednesday_morning()),
        DEFAULT_COMMAND_CAPACITY,
        CancellationToken::new(),
    );

    let first = handle.claim_producer().unwrap();
    let second = handle.claim_producer();
    assert!(matches!(second, Err(EngineError::ProducerBusy(id)) if id == TANK));

    drop(first);
    assert!(handle.claim_producer().is_ok(), "released on drop");
}

#[tokio::test(start_paused = true)]
async fn handle_refuses_samples_from_outside_the_claim() {
    let store = MemoryStore::new();
    let (handle, _task) = spawn_tank(
        service(),
        store.clone(),
        ManualClock::new(wednesday_morning()),
        DEFAULT_COMMAND_CAPACITY,
        CancellationToken::new(),
    );
    let sample = TelemetrySample::new(wednesday_morning(), 1000.0);

    assert_eq!(
        handle.send(TankCommand::Sample(sample)).await,
        Err(EngineError::ProducerRequired(TANK.into()))
    );

    let guard = handle.claim_producer().unwrap();
    let other = handle.clone();
    assert_eq!(
        other.send(TankCommand::Sample(sample)).await,
        Err(EngineError::ProducerBusy(TANK.into()))
    );
    assert_eq!(
        other.submit(TankCommand::Sample(sample)),
        Err(EngineError::ProducerBusy(TANK.into()))
    );
    flush(&handle).await;
    assert!(store.history(TANK).is_empty());

    guard.send(sample).await.unwrap();
    assert_eq!(store.history(TANK).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stored_config_changes_reach_the_pipeline() {
    let store = MemoryStore::new();
    store.save(TANK, &TankConfig::default()).unwrap();
    let shutdown = CancellationToken::new();
    let (handle, _task) = spawn_tank(
        service(),
        store.clone(),
        ManualClock::new(wednesday_morning()),
        DEFAULT_COMMAND_CAPACITY,
        shutdown.clone(),
    );
    let follower = tokio::spawn(follow_config(
        handle.clone(),
        store.subscribe(TANK),
        shutdown.clone(),
    ));

    let mut updated = TankConfig::default();
    updated.min_threshold_l = 4500.0;
    updated.nominal_capacity_l = 0.0;
    store.save(TANK, &updated).unwrap();

    let mut views = handle.subscribe();
    let view = views
        .wait_for(|v| v.min_threshold_l == 4500.0)
        .await
        .unwrap()
        .clone();
    assert_eq!(view.capacity_l, updated.effective_capacity());

    shutdown.cancel();
    assert_eq!(follower.await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn samples_are_processed_in_submission_order() {
    let store = MemoryStore::new();
    let (handle, _task) = spawn_tank(
        service(),
        store.clone(),
        ManualClock::new(wednesday_morning()),
        DEFAULT_COMMAND_CAPACITY,
        CancellationToken::new(),
    );
    let mut producer = handle.claim_producer().unwrap();

    let start = wednesday_morning();
    let depths = [1200.0, 1180.0, 1160.0, 1140.0];
    for (i, depth) in depths.iter().enumerate() {
        let at = start + chrono::Duration::seconds(i as i64 * 10);
        producer.push(TelemetrySample::new(at, *depth)).unwrap();
    }
    // Redelivery of the last sample is dropped by the pipeline.
    producer
        .push(TelemetrySample::new(
            start + chrono::Duration::seconds(30),
            1140.0,
        ))
        .unwrap();
    flush(&handle).await;

    let recorded: Vec<f64> = store.history(TANK).iter().map(|r| r.depth_mm).collect();
    assert_eq!(recorded, depths);
    assert_eq!(handle.view().samples_processed, 4);
}

#[tokio::test(start_paused = true)]
async fn full_queue_rejects_instead_of_blocking() {
    let (handle, _task) = spawn_tank(
        service(),
        MemoryStore::new(),
        ManualClock::new(wednesday_morning()),
        1,
        CancellationToken::new(),
    );
    let mut producer = handle.claim_producer().unwrap();
    let sample = TelemetrySample::new(wednesday_morning(), 1000.0);

    // The actor has not run yet, so the single slot stays occupied.
    producer.push(sample).unwrap();
    assert_eq!(
        producer.push(sample),
        Err(EngineError::QueueFull(TANK.into()))
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_returns_service_and_closes_handle() {
    let shutdown = CancellationToken::new();
    let (handle, task) = spawn_tank(
        service(),
        MemoryStore::new(),
        ManualClock::new(wednesday_morning()),
        DEFAULT_COMMAND_CAPACITY,
        shutdown.clone(),
    );
    let producer = handle.claim_producer().unwrap();
    producer
        .send(TelemetrySample::new(wednesday_morning(), 900.0))
        .await
        .unwrap();

    shutdown.cancel();
    let service = task.await.unwrap();
    assert_eq!(service.last_reading().map(|r| r.depth_mm), Some(900.0));

    let err = handle.send(TankCommand::FulfilOrder).await.unwrap_err();
    assert_eq!(err, EngineError::PipelineClosed(TANK.into()));
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_config_updates() {
    let (handle, _task) = spawn_tank(
        service(),
        MemoryStore::new(),
        ManualClock::new(wednesday_morning()),
        DEFAULT_COMMAND_CAPACITY,
        CancellationToken::new(),
    );
    let mut views = handle.subscribe();

    let mut config = TankConfig::default();
    config.min_threshold_l = 4500.0;
    handle
        .send(TankCommand::UpdateConfig(config))
        .await
        .unwrap();

    views.changed().await.unwrap();
    assert_eq!(views.borrow().min_threshold_l, 4500.0);
}
