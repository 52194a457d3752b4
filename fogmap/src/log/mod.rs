//! Logger abstraction.
//!
//! The fog engine and service report fallbacks and swallowed failures through
//! an `Arc<dyn Logger>` instead of calling `tracing` directly, so a host can
//! route them elsewhere and tests can assert on them.
//!
//! - `Logger`: the interface
//! - `TracingLogger`: forwards to `tracing`
//! - `NoOpLogger`: discards everything
//! - `MemoryLogger`: keeps everything, for tests
//!
//! Lower-level components (spatial index, cache, boolean operations) log
//! through `tracing` macros with structured fields.

mod memory;
mod noop;
mod tracing_adapter;
mod r#trait;

pub use memory::{LogRecord, MemoryLogger};
pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
