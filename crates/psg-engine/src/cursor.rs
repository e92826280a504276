//! Forward-only read position into a channel stream.

use psg_ir::{ChannelStream, Payload, StreamEntry};

/// Per-channel position, owned by the scheduler.
///
/// The cursor holds an index rather than a borrow so the scheduler can own
/// both the streams and their cursors. It only moves forward; a new session
/// starts from [`reset`](Self::reset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelCursor {
    /// Next unconsumed record
    index: usize,
    /// Cleared once END_CHANNEL has been observed
    active: bool,
}

impl ChannelCursor {
    pub const fn new() -> Self {
        Self {
            index: 0,
            active: true,
        }
    }

    /// Next unconsumed entry, without advancing.
    pub fn peek(&self, stream: &ChannelStream) -> StreamEntry {
        stream.entry(self.index)
    }

    /// Consume the current entry, returning its payload if it was an event.
    ///
    /// Sentinels are never consumed: advancing past END_CHANNEL retires the
    /// cursor and END_OF_AUDIO leaves it in place.
    pub fn advance(&mut self, stream: &ChannelStream) -> Option<Payload> {
        match self.peek(stream) {
            StreamEntry::Event(event) => {
                self.index += 1;
                Some(event.payload)
            }
            StreamEntry::EndChannel => {
                self.active = false;
                None
            }
            StreamEntry::EndOfAudio { .. } => None,
        }
    }

    /// Stop checking this channel.
    pub fn retire(&mut self) {
        self.active = false;
    }

    /// False once the channel is exhausted.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Records consumed so far.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
