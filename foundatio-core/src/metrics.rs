/// Sink for operational metrics emitted by the lock and queue subsystems.
///
/// The lock and queue subsystems report through this contract but never
/// depend on it: a failing or slow metrics sink must never affect
/// lock/queue correctness.
/// Implementations should treat their own errors as fire-and-forget.
pub trait MetricsSink: Send + Sync {
    /// Increment a named counter by `value`.
    fn increment_counter(&self, name: &str, value: u64);

    /// Report an instantaneous gauge value.
    fn gauge(&self, name: &str, value: f64);

    /// Report a timer/duration sample in milliseconds.
    fn timer(&self, name: &str, millis: f64);
}

/// A [`MetricsSink`] that discards everything. The default when no metrics
/// backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn increment_counter(&self, _name: &str, _value: u64) {}
    fn gauge(&self, _name: &str, _value: f64) {}
    fn timer(&self, _name: &str, _millis: f64) {}
}
