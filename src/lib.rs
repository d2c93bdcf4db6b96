//! TankWatch engine library.
//!
//! Interprets depth telemetry from horizontal cylindrical tanks: converts
//! depth to volume, classifies the level, aggregates refills into discrete
//! events and places automatic reorders.  Exposes the pure-logic modules
//! for integration testing; the tokio runtime lives in [`runtime`].

#![deny(unused_must_use)]

pub mod aggregator;
pub mod analytics;
pub mod app;
pub mod classifier;
pub mod config;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod model;
pub mod reorder;
pub mod runtime;

pub mod adapters;
