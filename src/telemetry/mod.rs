// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry, tracing, and metrics infrastructure.
//!
//! - **Tracing**: structured logging through `tracing`, configured by [`TelemetryConfig`]
//! - **Metrics**: operation latencies, token counts and routing outcomes
//! - **Correlation IDs**: the per-request id linking recorded routing interactions
//!
//! # Usage
//!
//! ```rust,ignore
//! use switchyard::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```

mod correlation;
mod init;
pub mod metrics;
pub mod spans;

pub use correlation::CorrelationId;
pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use metrics::{Metrics, MetricsSnapshot, RoutingOutcome, GLOBAL_METRICS};
pub use spans::{RoutingSpan, TimedOperation};
