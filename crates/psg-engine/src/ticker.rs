//! The session clock.

/// Monotonic 16-bit tick counter; the only notion of time in a session.
///
/// Advances by exactly one per scheduling cycle and wraps modulo 65536.
/// Tempo lives entirely in the pacer, never in the step size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticker(u16);

impl Ticker {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Current tick.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Advance by one tick.
    pub fn tick(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
