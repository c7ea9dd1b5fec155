//! Bounded gate invocation.
//!
//! A gate call races the request's cancellation token and is wrapped in a
//! timeout. A panic inside the gate is caught here and reported as a verdict,
//! so a faulty gate can never take the request task down with it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::obs::PipelineMetrics;

use super::gate::{GateContext, GateOutcome, PolicyGate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    Decided(GateOutcome),
    TimedOut,
    Panicked,
    Cancelled,
}

#[derive(Clone)]
pub struct GateRunner {
    timeout: Duration,
    metrics: Arc<PipelineMetrics>,
}

impl GateRunner {
    pub fn new(timeout: Duration, metrics: Arc<PipelineMetrics>) -> Self {
        Self { timeout, metrics }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(
        &self,
        gate: &dyn PolicyGate,
        ctx: &GateContext,
        cancel: &CancellationToken,
    ) -> GateVerdict {
        let started = Instant::now();
        let call = AssertUnwindSafe(gate.validate(ctx)).catch_unwind();

        let verdict = tokio::select! {
            biased;
            _ = cancel.cancelled() => GateVerdict::Cancelled,
            res = tokio::time::timeout(self.timeout, call) => match res {
                Ok(Ok(outcome)) => GateVerdict::Decided(outcome),
                Ok(Err(_)) => GateVerdict::Panicked,
                Err(_) => GateVerdict::TimedOut,
            },
        };

        let name = gate.name();
        self.metrics.gate_duration.observe(&[("gate", name)], started.elapsed());

        match &verdict {
            GateVerdict::TimedOut => {
                self.metrics.gate_failures.inc(&[("gate", name), ("cause", "timeout")]);
                tracing::warn!(
                    gate = name,
                    correlation_id = %ctx.correlation_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "gate timed out"
                );
            }
            GateVerdict::Panicked => {
                self.metrics.gate_failures.inc(&[("gate", name), ("cause", "panic")]);
                tracing::error!(gate = name, correlation_id = %ctx.correlation_id, "gate panicked");
            }
            GateVerdict::Cancelled => {
                tracing::debug!(gate = name, correlation_id = %ctx.correlation_id, "gate call cancelled");
            }
            GateVerdict::Decided(o) => {
                tracing::debug!(gate = name, correlation_id = %ctx.correlation_id, accepted = o.accepted, "gate decided");
            }
        }

        verdict
    }
}
