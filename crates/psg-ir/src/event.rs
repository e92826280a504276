//! Event types for the tick-driven sequencer.

use core::fmt;

/// Width of a command frame sent to the sound chip.
pub const PAYLOAD_LEN: usize = 3;

/// An opaque 3-byte sound chip command.
///
/// The scheduler never looks inside a payload; it is handed byte-for-byte
/// to the sound device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Payload(pub [u8; PAYLOAD_LEN]);

impl Payload {
    pub const fn new(bytes: [u8; PAYLOAD_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> &[u8; PAYLOAD_LEN] {
        &self.0
    }
}

impl From<[u8; PAYLOAD_LEN]> for Payload {
    fn from(bytes: [u8; PAYLOAD_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{:02X} {:02X} {:02X}", a, b, c)
    }
}

/// A scheduled command on one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Event {
    /// Ticker value at which the event fires
    pub time: u16,
    /// Command forwarded to the sound device
    pub payload: Payload,
}

impl Event {
    /// Create a new event.
    pub const fn new(time: u16, payload: Payload) -> Self {
        Self { time, payload }
    }

    /// Convenience constructor from raw bytes.
    pub const fn from_bytes(time: u16, bytes: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            time,
            payload: Payload(bytes),
        }
    }
}
