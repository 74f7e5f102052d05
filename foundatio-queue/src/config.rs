use std::time::Duration;

/// Tunables for one queue instance.
///
/// ```
/// use foundatio_queue::QueueConfig;
/// use std::time::Duration;
///
/// let config = QueueConfig::default();
/// assert_eq!(config.retries, 2);
/// assert_eq!(config.work_item_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of redelivery attempts after the first, before an entry moves
    /// to the dead-letter bucket. `retries=2` means three total attempts.
    pub retries: u32,
    /// Delay before a retried entry becomes eligible again. Zero means
    /// immediate re-enqueue. Grows linearly with `attempts`.
    pub retry_delay: Duration,
    /// Lease duration granted on dequeue; also the basis for the default
    /// maintenance sweep period.
    pub work_item_timeout: Duration,
    /// Upper bound on the dead-letter bucket; oldest entries are trimmed.
    pub dead_letter_max_items: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_delay: Duration::ZERO,
            work_item_timeout: Duration::from_secs(60),
            dead_letter_max_items: 100,
        }
    }
}

impl QueueConfig {
    /// Auto-abandon maintenance period: `work_item_timeout / 2`, clamped to
    /// `[100ms, 30s]`.
    #[must_use]
    pub fn maintenance_period(&self) -> Duration {
        (self.work_item_timeout / 2).clamp(Duration::from_millis(100), Duration::from_secs(30))
    }
}
