// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span helpers for routing instrumentation.

use std::time::Instant;
use tracing::{info_span, Span};

use super::correlation::CorrelationId;
use super::metrics::{RoutingOutcome, GLOBAL_METRICS};

/// Guard for one routing decision.
///
/// Opens a `route` span carrying the session and correlation ids. Finishing
/// it records the delegate, the outcome and the elapsed time to metrics.
pub struct RoutingSpan {
    start: Instant,
    span: Span,
}

impl RoutingSpan {
    /// Start a routing span for a session.
    pub fn start(session_id: &str) -> Self {
        let span = info_span!(
            "route",
            session_id = %session_id,
            correlation_id = tracing::field::Empty,
            delegate = tracing::field::Empty,
            outcome = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        Self {
            start: Instant::now(),
            span,
        }
    }

    /// Get the underlying tracing span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Attach the correlation id once it is generated.
    pub fn record_correlation_id(&self, id: &CorrelationId) {
        self.span.record("correlation_id", id.to_string().as_str());
    }

    /// Record the chosen delegate.
    pub fn record_delegate(&self, agent_id: &str) {
        self.span.record("delegate", agent_id);
    }

    /// Finish the span with the routing outcome.
    pub fn finish(self, outcome: RoutingOutcome) {
        let duration = self.start.elapsed();

        self.span.record("outcome", outcome.to_string().as_str());
        self.span
            .record("duration_ms", duration.as_secs_f64() * 1000.0);

        GLOBAL_METRICS.record_routing(outcome);
        GLOBAL_METRICS.record_operation("orchestrator.route", duration);

        tracing::debug!(parent: &self.span, %outcome, "Routing finished");
    }
}

/// RAII timer for any named operation.
///
/// Records the duration to global metrics when dropped.
pub struct TimedOperation {
    name: &'static str,
    start: Instant,
}

impl TimedOperation {
    /// Start timing.
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for TimedOperation {
    fn drop(&mut self) {
        GLOBAL_METRICS.record_operation(self.name, self.start.elapsed());
    }
}
