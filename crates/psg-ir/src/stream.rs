//! Per-channel event streams and their end markers.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::event::Event;

/// Conventional terminator for a channel that simply runs out of events.
pub const END_CHANNEL: u16 = 0x0000;
/// Terminator reserved for the one channel that ends the whole session.
pub const END_OF_AUDIO: u16 = 0xFFFF;

/// Short display name of a channel ("tone0", "noise", ...).
pub type ChannelName = ArrayString<16>;

/// Build a channel name, truncating anything past the capacity.
pub fn channel_name(name: &str) -> ChannelName {
    let mut out = ChannelName::new();
    for ch in name.chars() {
        if out.try_push(ch).is_err() {
            break;
        }
    }
    out
}

/// How a channel's table ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Terminator {
    /// Non-increasing time value: stop checking this channel.
    #[default]
    EndChannel,
    /// `0xFFFF`: the last record is the session end marker.
    EndOfAudio,
}

/// Decoded meaning of a stream position.
///
/// Sentinels are resolved once when a table is read, so the scheduler
/// branches on the tag instead of comparing raw time values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEntry {
    /// A playable event
    Event(Event),
    /// The channel is exhausted
    EndChannel,
    /// The session ends when the ticker reaches `at`
    EndOfAudio { at: u16 },
}

/// Ordered, read-only event stream for one voice.
///
/// For the terminal channel, the last record is the end marker: its time is
/// the session end tick and its payload is kept only so the table re-encodes
/// byte-for-byte. It is never played.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStream {
    /// Display name
    pub name: ChannelName,
    records: Vec<Event>,
    terminator: Terminator,
}

impl ChannelStream {
    /// Create a stream from decoded records. No ordering checks happen here;
    /// see [`StreamSet::validate`](crate::StreamSet::validate).
    pub fn new(name: &str, records: Vec<Event>, terminator: Terminator) -> Self {
        Self {
            name: channel_name(name),
            records,
            terminator,
        }
    }

    /// All records, including the end marker of a terminal channel.
    pub fn records(&self) -> &[Event] {
        &self.records
    }

    /// Records that actually produce sound.
    pub fn playable(&self) -> &[Event] {
        match self.terminator {
            Terminator::EndOfAudio if !self.records.is_empty() => {
                &self.records[..self.records.len() - 1]
            }
            _ => &self.records,
        }
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// True if this channel carries the END_OF_AUDIO sentinel.
    pub fn is_terminal(&self) -> bool {
        self.terminator == Terminator::EndOfAudio
    }

    /// Time of the last record, marker included.
    pub fn last_time(&self) -> Option<u16> {
        self.records.last().map(|e| e.time)
    }

    /// Session end tick for a terminal channel.
    ///
    /// A terminal table with no records at all ends at `0xFFFF`.
    pub fn end_tick(&self) -> Option<u16> {
        if !self.is_terminal() {
            return None;
        }
        Some(self.last_time().unwrap_or(END_OF_AUDIO))
    }

    /// Resolve the entry at a record index.
    pub fn entry(&self, index: usize) -> StreamEntry {
        match (self.terminator, self.records.get(index)) {
            (Terminator::EndOfAudio, Some(record)) if index + 1 == self.records.len() => {
                StreamEntry::EndOfAudio { at: record.time }
            }
            (_, Some(record)) => StreamEntry::Event(*record),
            (Terminator::EndChannel, None) => StreamEntry::EndChannel,
            (Terminator::EndOfAudio, None) => StreamEntry::EndOfAudio { at: END_OF_AUDIO },
        }
    }

    /// Number of records, marker included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
