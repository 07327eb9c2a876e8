//! Monotonic-enough wall-clock source for timestamps and expiry checks.
//!
//! Abstracted behind a trait so tests can control time without sleeping.
//! The command path never calls `Clock` directly — `now` is sampled once
//! by the caller (the leader, before submission) and carried in the
//! command payload, keeping `apply` a pure function (see determinism
//! notes in the crate root docs).

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time, expressed as seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in fractional seconds since the Unix epoch.
    fn now(&self) -> f64;
}

/// Production clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A clock whose value is set explicitly by tests.
    #[derive(Debug, Default)]
    pub struct FakeClock {
        micros: AtomicU64,
    }

    impl FakeClock {
        pub fn new(initial_secs: f64) -> Self {
            Self {
                micros: AtomicU64::new((initial_secs * 1_000_000.0) as u64),
            }
        }

        pub fn advance(&self, secs: f64) {
            self.micros
                .fetch_add((secs * 1_000_000.0) as u64, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> f64 {
            self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
        }
    }
}
