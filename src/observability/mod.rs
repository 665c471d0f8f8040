//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! bridge / pipe / http server produce:
//!     → logging.rs (structured log events, one span per bridged call)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
