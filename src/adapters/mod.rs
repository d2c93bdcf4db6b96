//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements               | Connects to                 |
//! |--------------|--------------------------|-----------------------------|
//! | `memory`     | HistorySink, EventSink   | Shared in-memory store      |
//! |              | ConfigStore              | (postcard config blobs)     |
//! | `json_store` | ConfigStore              | `<tank_id>.json` files      |
//! | `log_sink`   | HistorySink, EventSink   | `log` facade                |
//! | `fanout`     | HistorySink, EventSink   | Two sinks in sequence       |
//! | `time`       | Clock                    | Host clock / manual clock   |
//!
//! Both config stores publish saved values through a shared
//! [`ConfigFeed`](config_feed::ConfigFeed).
//!
//! The [`SampleSource`](crate::app::ports::SampleSource) port is
//! implemented by [`ProducerGuard`](crate::runtime::ProducerGuard).

pub mod config_feed;
pub mod fanout;
pub mod json_store;
pub mod log_sink;
pub mod memory;
pub mod time;
