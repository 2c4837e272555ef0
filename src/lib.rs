//! # streamplt
//!
//! Background ingestion of delimited numeric streams into a bounded,
//! snapshot-readable record buffer.
//!
//! A publisher sends text messages such as `"1700000000.25, 0.5, -1.75"` over a
//! publish/subscribe transport. A [`DataListener`] subscribes, parses every
//! message into a fixed-width [`Record`] on a dedicated thread and keeps the most
//! recent records in a [`RecordBuffer`]. A consumer running on its own schedule
//! (typically a render loop) calls [`DataListener::get_snapshot`] to get an
//! independent copy of the window, most recent first.
//!
//! ## Crate Structure
//!
//! - **`config`**: Figment-based configuration (`AppConfig`, `ListenerConfig`) loaded
//!   from TOML and `STREAMPLT_` environment variables.
//! - **`data`**: The `Record` type, its text codec, and the mutex-guarded
//!   `RecordBuffer`.
//! - **`error`**: The `StreamError` enum used across the crate.
//! - **`ingest`**: The ingestion loop and its `IngestStats` counters.
//! - **`listener`**: The `DataListener` facade: start, stop, snapshot.
//! - **`transport`**: The injected `Transport`/`Subscription` traits with ZeroMQ and
//!   in-process implementations.
//! - **`tracing_init`**: `tracing-subscriber` setup for applications.

pub mod config;
pub mod data;
pub mod error;
pub mod ingest;
pub mod listener;
pub mod tracing_init;
pub mod transport;

pub use config::{AppConfig, ListenerConfig};
pub use data::{Record, RecordBuffer};
pub use error::{AppResult, StreamError};
pub use ingest::IngestStatsSnapshot;
pub use listener::{DataListener, ListenerState};
pub use transport::{ChannelTransport, Subscription, Transport, ZmqTransport};
