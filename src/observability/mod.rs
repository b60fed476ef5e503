//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Response handler / write tracker produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (failure counters, write latency)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Connection ID flows through every log line of a response
//! - Metrics never feed back into control flow

pub mod logging;
pub mod metrics;
#[cfg(test)]
pub(crate) mod testing;

pub use self::metrics::ResponseMetrics;
