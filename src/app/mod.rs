//! Application core: the per-tank pipeline, zero I/O.
//!
//! This module wires the domain pieces (geometry, classifier, aggregator,
//! reorder policy) into one pipeline per tank.  All interaction with the
//! outside world happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without a real data store.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
