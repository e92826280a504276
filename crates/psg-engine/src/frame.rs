//! Audio frame type.

/// A stereo audio frame (16-bit integer).
///
/// The chip is mono; both sides carry the same level unless a backend
/// pans voices itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Frame from a level in [-1.0, 1.0]; out-of-range levels are clamped.
    pub fn from_level(level: f32) -> Self {
        let value = (level.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        Self::mono(value)
    }

    /// Left channel as a float sample in [-1.0, 1.0).
    pub fn left_f32(self) -> f32 {
        self.left as f32 / 32768.0
    }

    /// Right channel as a float sample in [-1.0, 1.0).
    pub fn right_f32(self) -> f32 {
        self.right as f32 / 32768.0
    }

    pub fn is_silent(self) -> bool {
        self.left == 0 && self.right == 0
    }
}
