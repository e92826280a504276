//! Tick pacing: turns one tick into wall-clock time.
//!
//! The scheduler has no timing logic of its own. Tempo is whatever delay the
//! injected pacer produces per tick.

/// Blocks the caller for one tick.
pub trait Pacer {
    fn delay_one_tick(&mut self);
}

impl<F: FnMut()> Pacer for F {
    fn delay_one_tick(&mut self) {
        self()
    }
}

/// Zero-length ticks, for tests and offline rendering.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn delay_one_tick(&mut self) {}
}

#[cfg(feature = "std")]
pub use fixed_rate::FixedRatePacer;

#[cfg(feature = "std")]
mod fixed_rate {
    use super::Pacer;
    use std::time::{Duration, Instant};

    /// Remaining time below which the pacer spins instead of sleeping.
    const SPIN_THRESHOLD: Duration = Duration::from_micros(500);

    /// Fixed tick period measured against absolute deadlines.
    ///
    /// Deadlines are `start + n * period`, so time spent between calls does
    /// not accumulate as drift.
    #[derive(Clone, Debug)]
    pub struct FixedRatePacer {
        period: Duration,
        next_deadline: Option<Instant>,
    }

    impl FixedRatePacer {
        pub fn new(period: Duration) -> Self {
            Self {
                period,
                next_deadline: None,
            }
        }

        pub fn period(&self) -> Duration {
            self.period
        }
    }

    impl Pacer for FixedRatePacer {
        fn delay_one_tick(&mut self) {
            let now = Instant::now();
            let deadline = self.next_deadline.unwrap_or(now) + self.period;

            // Fell more than a tick behind: resync instead of bursting.
            let deadline = if deadline + self.period < now {
                now + self.period
            } else {
                deadline
            };

            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let remaining = deadline - now;
                if remaining > SPIN_THRESHOLD {
                    std::thread::sleep(remaining - SPIN_THRESHOLD);
                } else {
                    std::hint::spin_loop();
                }
            }

            self.next_deadline = Some(deadline);
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_pacers() {
        let mut calls = 0;
        {
            let mut pacer = || calls += 1;
            pacer.delay_one_tick();
            pacer.delay_one_tick();
        }
        assert_eq!(calls, 2);
    }
}
