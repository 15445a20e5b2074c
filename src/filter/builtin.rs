use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use super::core::ControllerFilter;
use crate::controller::RequestContext;
use crate::error::StrestError;

/// Logs the start and end of every request it wraps.
#[derive(Debug, Default)]
pub struct LoggingFilter;

impl LoggingFilter {
    pub const NAME: &'static str = "logging";
}

impl ControllerFilter for LoggingFilter {
    fn before(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        info!(
            request_id = %ctx.request_id(),
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            controller = %ctx.descriptor().name(),
            txn_id = ?ctx.txn_id(),
            "Request start"
        );
        Ok(())
    }

    fn after(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        info!(
            request_id = %ctx.request_id(),
            controller = %ctx.descriptor().name(),
            status = ctx.response().status(),
            latency_ms = ctx.elapsed().as_millis() as u64,
            "Request complete"
        );
        Ok(())
    }

    fn error(&self, ctx: &mut RequestContext, err: &StrestError) -> anyhow::Result<()> {
        warn!(
            request_id = %ctx.request_id(),
            controller = %ctx.descriptor().name(),
            status = err.code(),
            error = %err,
            cause = ?err.cause().map(ToString::to_string),
            latency_ms = ctx.elapsed().as_millis() as u64,
            "Request failed"
        );
        Ok(())
    }
}

/// Request counters shared by every controller the filter wraps.
///
/// All counters are atomics; reading them never blocks request handling.
#[derive(Debug, Default)]
pub struct MetricsFilter {
    request_count: AtomicUsize,
    completed_count: AtomicUsize,
    error_count: AtomicUsize,
    total_latency_ns: AtomicU64,
}

impl MetricsFilter {
    pub const NAME: &'static str = "metrics";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that entered the filter chain.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Requests whose `after` phase ran.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Mean time from receipt to the `after` phase. Zero before the first
    /// completed request.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.completed_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }
}

impl ControllerFilter for MetricsFilter {
    fn before(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn after(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(ctx.elapsed().as_nanos() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn error(&self, _ctx: &mut RequestContext, _err: &StrestError) -> anyhow::Result<()> {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
