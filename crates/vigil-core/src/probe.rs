//! Clock and host performance sampling.

use chrono::{DateTime, Utc};

use crate::error::{Result, VigilError};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Start of the window of length `window` that ends at `now`.
pub fn window_start(now: DateTime<Utc>, window: chrono::Duration) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(window).ok_or_else(|| {
        VigilError::Config(format!(
            "window of {}s reaches past the earliest representable time",
            window.num_seconds()
        ))
    })
}

/// Host CPU sampling.
///
/// Implementations return the CPU utilization percentage (0-100) of the
/// whole host averaged across cores over the window since the previous call.
/// Callers sample once per heartbeat, so the window is one heartbeat interval.
pub trait PerformanceProbe: Send + Sync {
    fn avg_cpu_utilization(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_window_start() {
        let now = Utc::now();
        assert_eq!(
            window_start(now, chrono::Duration::seconds(30)).unwrap(),
            now - chrono::Duration::seconds(30)
        );

        let err = window_start(now, chrono::Duration::MAX).unwrap_err();
        assert!(matches!(err, VigilError::Config(_)));
    }
}
