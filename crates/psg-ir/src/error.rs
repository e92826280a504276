//! Construction-time errors for stream sets.

use thiserror::Error;

/// A stream set breaks one of the invariants the scheduler relies on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream set has no channels")]
    NoChannels,
    #[error("stream set has {count} channels, at most {max} are supported")]
    TooManyChannels { count: usize, max: usize },
    #[error("channel {channel} has no events")]
    EmptyChannel { channel: usize },
    #[error("channel {channel} record {index}: time {time} does not follow {previous}")]
    NonIncreasingTime {
        channel: usize,
        index: usize,
        previous: u16,
        time: u16,
    },
    #[error("channel {channel} record {index}: time 0xFFFF is reserved for END_OF_AUDIO")]
    ReservedTime { channel: usize, index: usize },
    #[error("no channel carries END_OF_AUDIO")]
    NoTerminalChannel,
    #[error("channels {first} and {second} both carry END_OF_AUDIO")]
    MultipleTerminalChannels { first: usize, second: usize },
    #[error("channel {channel} has events up to tick {last}, past the end of audio at tick {end}")]
    EventAfterEnd { channel: usize, last: u16, end: u16 },
    #[error("channel {channel} ties the end tick and must carry END_OF_AUDIO instead of channel {terminal}")]
    TerminalNotLowest { terminal: usize, channel: usize },
}
