//! Observability module.
//!
//! Structured logging through `tracing`, with the subscriber configured from
//! `[observability.logging]` (pretty, compact or JSON output).

mod tracing_init;

pub use tracing_init::*;
