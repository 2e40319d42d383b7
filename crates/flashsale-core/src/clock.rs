//! Wall-clock seam used when evaluating sale windows.

use chrono::{DateTime, Utc};

/// Source of "now" for eligibility decisions.
///
/// Sale windows are checked against this rather than `Utc::now()` so tests can
/// pin the instant a purchase is evaluated at.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
