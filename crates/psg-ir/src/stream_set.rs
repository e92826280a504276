//! Ordered channel collections and the rules that bind them together.

use alloc::vec::Vec;

use crate::error::StreamError;
use crate::event::Event;
use crate::stream::{channel_name, ChannelName, ChannelStream, Terminator, END_OF_AUDIO};

/// Upper bound on channels in one session.
pub const MAX_CHANNELS: usize = 8;

/// The full set of channel streams for one playback session.
///
/// Channel order is significant: it is the order the scheduler checks
/// channels each tick and the order used to break END_OF_AUDIO ties.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamSet {
    channels: Vec<ChannelStream>,
}

impl StreamSet {
    /// Create a stream set, checking every invariant.
    pub fn new(channels: Vec<ChannelStream>) -> Result<Self, StreamError> {
        let set = Self { channels };
        set.validate()?;
        Ok(set)
    }

    /// Create a stream set, checking only the channel count.
    ///
    /// Ordering and END_OF_AUDIO rules are left to the producer; malformed
    /// sets may never terminate or may terminate early. The channel bound
    /// always holds, so every fired channel fits in a tick report.
    pub fn new_trusted(channels: Vec<ChannelStream>) -> Result<Self, StreamError> {
        check_channel_count(channels.len())?;
        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[ChannelStream] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Index of the first channel carrying END_OF_AUDIO.
    pub fn terminal_channel(&self) -> Option<usize> {
        self.channels.iter().position(ChannelStream::is_terminal)
    }

    /// Tick at which the session finishes.
    pub fn end_tick(&self) -> Option<u16> {
        self.terminal_channel()
            .and_then(|idx| self.channels[idx].end_tick())
    }

    /// Total number of events that will be played.
    pub fn playable_events(&self) -> usize {
        self.channels.iter().map(|c| c.playable().len()).sum()
    }

    /// Check the invariants the scheduler trusts without checking.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.channels.is_empty() {
            return Err(StreamError::NoChannels);
        }
        check_channel_count(self.channels.len())?;

        let mut terminal = None;
        for (channel, stream) in self.channels.iter().enumerate() {
            check_ordering(channel, stream)?;
            if stream.is_terminal() {
                if let Some(first) = terminal {
                    return Err(StreamError::MultipleTerminalChannels {
                        first,
                        second: channel,
                    });
                }
                terminal = Some(channel);
            } else if stream.is_empty() {
                return Err(StreamError::EmptyChannel { channel });
            }
        }

        let terminal = terminal.ok_or(StreamError::NoTerminalChannel)?;
        let end = self.channels[terminal].end_tick().unwrap_or(END_OF_AUDIO);

        for (channel, stream) in self.channels.iter().enumerate() {
            if channel == terminal {
                continue;
            }
            let Some(last) = stream.last_time() else {
                continue;
            };
            if last > end {
                return Err(StreamError::EventAfterEnd { channel, last, end });
            }
            if last == end && channel < terminal {
                return Err(StreamError::TerminalNotLowest { terminal, channel });
            }
        }

        Ok(())
    }
}

fn check_ordering(channel: usize, stream: &ChannelStream) -> Result<(), StreamError> {
    let mut previous: Option<u16> = None;
    for (index, record) in stream.records().iter().enumerate() {
        if record.time == END_OF_AUDIO {
            return Err(StreamError::ReservedTime { channel, index });
        }
        if let Some(previous) = previous {
            if record.time <= previous {
                return Err(StreamError::NonIncreasingTime {
                    channel,
                    index,
                    previous,
                    time: record.time,
                });
            }
        }
        previous = Some(record.time);
    }
    Ok(())
}

/// Assembles a [`StreamSet`] from plain per-channel event lists.
///
/// The builder decides which channel carries END_OF_AUDIO: the one whose
/// last event is latest, lowest index first on a tie. That channel's last
/// event becomes the end marker and is not played.
#[derive(Clone, Debug, Default)]
pub struct StreamSetBuilder {
    channels: Vec<(ChannelName, Vec<Event>)>,
}

impl StreamSetBuilder {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Append a channel. Channels are checked in the order they are added.
    pub fn channel(mut self, name: &str, events: Vec<Event>) -> Self {
        self.channels.push((channel_name(name), events));
        self
    }

    /// Pick the terminal channel and validate the result.
    pub fn build(self) -> Result<StreamSet, StreamError> {
        if self.channels.is_empty() {
            return Err(StreamError::NoChannels);
        }

        let mut last_times = Vec::with_capacity(self.channels.len());
        for (channel, (_, events)) in self.channels.iter().enumerate() {
            let last = events
                .last()
                .map(|e| e.time)
                .ok_or(StreamError::EmptyChannel { channel })?;
            last_times.push(last);
        }

        let terminal = terminal_index(&last_times).ok_or(StreamError::NoChannels)?;

        let channels = self
            .channels
            .into_iter()
            .enumerate()
            .map(|(idx, (name, events))| {
                let terminator = if idx == terminal {
                    Terminator::EndOfAudio
                } else {
                    Terminator::EndChannel
                };
                ChannelStream::new(name.as_str(), events, terminator)
            })
            .collect();

        StreamSet::new(channels)
    }
}

fn check_channel_count(count: usize) -> Result<(), StreamError> {
    if count > MAX_CHANNELS {
        return Err(StreamError::TooManyChannels {
            count,
            max: MAX_CHANNELS,
        });
    }
    Ok(())
}

/// Lowest index holding the maximum value.
fn terminal_index(last_times: &[u16]) -> Option<usize> {
    let max = *last_times.iter().max()?;
    last_times.iter().position(|&t| t == max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamEntry;
    use alloc::vec;

    fn ev(time: u16) -> Event {
        Event::from_bytes(time, [0x9F, 0x00, 0x00])
    }

    #[test]
    fn latest_channel_becomes_terminal() {
        let set = StreamSetBuilder::new()
            .channel("a", vec![ev(0), ev(100)])
            .channel("b", vec![ev(0), ev(50), ev(150)])
            .build()
            .unwrap();

        assert_eq!(set.terminal_channel(), Some(1));
        assert_eq!(set.end_tick(), Some(150));
        assert!(!set.channels()[0].is_terminal());
        assert_eq!(set.channels()[1].entry(2), StreamEntry::EndOfAudio { at: 150 });
    }

    #[test]
    fn tie_breaks_toward_lowest_index() {
        let set = StreamSetBuilder::new()
            .channel("a", vec![ev(10)])
            .channel("b", vec![ev(0), ev(80)])
            .channel("c", vec![ev(80)])
            .channel("d", vec![ev(5), ev(80)])
            .build()
            .unwrap();

        assert_eq!(set.terminal_channel(), Some(1));
        let terminals = set.channels().iter().filter(|c| c.is_terminal()).count();
        assert_eq!(terminals, 1);
    }

    #[test]
    fn builder_rejects_empty_channel() {
        let err = StreamSetBuilder::new()
            .channel("a", vec![ev(0)])
            .channel("b", vec![])
            .build()
            .unwrap_err();
        assert_eq!(err, StreamError::EmptyChannel { channel: 1 });
    }

    #[test]
    fn builder_rejects_unordered_events() {
        let err = StreamSetBuilder::new()
            .channel("a", vec![ev(0), ev(20), ev(20)])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            StreamError::NonIncreasingTime { channel: 0, index: 2, previous: 20, time: 20 }
        );
    }

    #[test]
    fn builder_rejects_reserved_time() {
        let err = StreamSetBuilder::new()
            .channel("a", vec![ev(0), ev(0xFFFF)])
            .build()
            .unwrap_err();
        assert_eq!(err, StreamError::ReservedTime { channel: 0, index: 1 });
    }

    #[test]
    fn no_channels_is_an_error() {
        assert_eq!(StreamSetBuilder::new().build().unwrap_err(), StreamError::NoChannels);
        assert_eq!(StreamSet::new(vec![]).unwrap_err(), StreamError::NoChannels);
    }

    #[test]
    fn too_many_channels() {
        let mut builder = StreamSetBuilder::new();
        for i in 0..=MAX_CHANNELS as u16 {
            builder = builder.channel("x", vec![ev(i)]);
        }
        assert_eq!(
            builder.build().unwrap_err(),
            StreamError::TooManyChannels { count: MAX_CHANNELS + 1, max: MAX_CHANNELS }
        );
    }

    #[test]
    fn validate_requires_a_terminal() {
        let set = StreamSet::new_trusted(vec![ChannelStream::new(
            "a",
            vec![ev(0)],
            Terminator::EndChannel,
        )])
        .unwrap();
        assert_eq!(set.validate(), Err(StreamError::NoTerminalChannel));
    }

    #[test]
    fn validate_rejects_two_terminals() {
        let set = StreamSet::new_trusted(vec![
            ChannelStream::new("a", vec![ev(0), ev(9)], Terminator::EndOfAudio),
            ChannelStream::new("b", vec![ev(0), ev(9)], Terminator::EndOfAudio),
        ])
        .unwrap();
        assert_eq!(
            set.validate(),
            Err(StreamError::MultipleTerminalChannels { first: 0, second: 1 })
        );
    }

    #[test]
    fn validate_rejects_events_after_end() {
        let set = StreamSet::new_trusted(vec![
            ChannelStream::new("a", vec![ev(0), ev(30)], Terminator::EndOfAudio),
            ChannelStream::new("b", vec![ev(0), ev(40)], Terminator::EndChannel),
        ])
        .unwrap();
        assert_eq!(
            set.validate(),
            Err(StreamError::EventAfterEnd { channel: 1, last: 40, end: 30 })
        );
    }

    #[test]
    fn validate_rejects_higher_index_terminal_on_tie() {
        let set = StreamSet::new_trusted(vec![
            ChannelStream::new("a", vec![ev(0), ev(30)], Terminator::EndChannel),
            ChannelStream::new("b", vec![ev(30)], Terminator::EndOfAudio),
        ])
        .unwrap();
        assert_eq!(
            set.validate(),
            Err(StreamError::TerminalNotLowest { terminal: 1, channel: 0 })
        );
    }

    #[test]
    fn trusted_sets_still_bound_channel_count() {
        let channels: Vec<ChannelStream> = (0..=MAX_CHANNELS)
            .map(|_| ChannelStream::new("x", vec![ev(0)], Terminator::EndChannel))
            .collect();
        assert_eq!(
            StreamSet::new_trusted(channels).unwrap_err(),
            StreamError::TooManyChannels { count: MAX_CHANNELS + 1, max: MAX_CHANNELS }
        );

        let channels: Vec<ChannelStream> = (0..MAX_CHANNELS)
            .map(|_| ChannelStream::new("x", vec![ev(0)], Terminator::EndChannel))
            .collect();
        assert_eq!(StreamSet::new_trusted(channels).unwrap().len(), MAX_CHANNELS);
    }

    #[test]
    fn empty_terminal_is_allowed() {
        let set = StreamSet::new(vec![
            ChannelStream::new("a", vec![ev(0), ev(30)], Terminator::EndChannel),
            ChannelStream::new("b", vec![], Terminator::EndOfAudio),
        ])
        .unwrap();
        assert_eq!(set.end_tick(), Some(0xFFFF));
        assert_eq!(set.playable_events(), 2);
    }
}
