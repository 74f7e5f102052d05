use std::time::Duration;

/// Delay between iterations of a [`crate::JobRunner::run_continuous`] loop
/// when there was no work to do (spec §4.6: "continuous mode honours ...
/// an inter-iteration interval (with optional jitter)").
///
/// Jitter is deterministic rather than randomized, the same formula
/// `acteon-executor::RetryStrategy::Exponential`'s `jitter: true` arm uses:
/// it spreads out concurrently-started job runners without depending on a
/// random number generator.
#[derive(Debug, Clone, Copy)]
pub struct JobInterval {
    base: Duration,
    jitter: bool,
}

impl JobInterval {
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self { base, jitter: false }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the next iteration, given how many consecutive
    /// no-work iterations have elapsed. Without jitter this is always
    /// `base`; with jitter it varies by +0% to +40% across a 5-iteration
    /// cycle so that many runners started at once don't all wake in
    /// lockstep.
    #[must_use]
    pub fn delay_for(&self, consecutive_idle: u32) -> Duration {
        if !self.jitter {
            return self.base;
        }
        let factor = 1.0 + 0.1 * f64::from(consecutive_idle % 5);
        Duration::from_secs_f64(self.base.as_secs_f64() * factor)
    }
}

impl Default for JobInterval {
    fn default() -> Self {
        Self::new(Duration::from_secs(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_jitter_is_constant() {
        let interval = JobInterval::new(Duration::from_millis(500));
        for i in 0..10 {
            assert_eq!(interval.delay_for(i), Duration::from_millis(500));
        }
    }

    #[test]
    fn jitter_cycles_every_five_iterations() {
        let interval = JobInterval::new(Duration::from_secs(1)).with_jitter(true);
        assert_eq!(interval.delay_for(0), Duration::from_secs(1));
        assert_eq!(interval.delay_for(1), Duration::from_millis(1100));
        assert_eq!(interval.delay_for(4), Duration::from_millis(1400));
        assert_eq!(interval.delay_for(5), interval.delay_for(0));
    }
}
