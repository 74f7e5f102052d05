use chrono::{DateTime, Utc};

/// Abstraction over wall-clock time so tests can inject a fixed or
/// manually-advanced clock instead of depending on `Utc::now()` directly.
///
/// Lease/TTL math inside `foundatio-lock` and `foundatio-queue` still uses
/// `tokio::time::Instant`, which is itself paused/advanced by
/// `#[tokio::test(start_paused = true)]`; this trait only covers the
/// human-readable timestamps stamped onto domain records (`enqueued_at`, …).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
