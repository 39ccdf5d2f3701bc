//! Sink decorators: composition by wrapping a value, never by inheritance.
//!
//! Each decorator here wraps an inner [`crate::sink::Sink`] (or
//! [`crate::sink::DurableStore`]) and is itself a `Sink`, so chains compose
//! freely, e.g. `AsyncAuditor::new(Arc::new(MetricsSink::new(store, metrics)), ..)`.

mod async_sink;
mod metrics_sink;
mod multi_sink;
mod ring_sink;

pub use async_sink::{AsyncAuditor, AsyncAuditorConfig};
pub use metrics_sink::MetricsSink;
pub use multi_sink::MultiSink;
pub use ring_sink::{InMemoryRingSink, RingEntry};
