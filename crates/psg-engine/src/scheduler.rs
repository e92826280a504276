//! The tick loop.
//!
//! Once per tick the scheduler compares every channel's next entry against
//! the ticker, forwards due payloads to the sound sink, and stops when the
//! terminal channel's END_OF_AUDIO marker comes due.

use alloc::vec::Vec;
use psg_ir::{StreamEntry, StreamSet, MAX_CHANNELS};

use crate::cursor::ChannelCursor;
use crate::pacing::Pacer;
use crate::sink::SoundSink;
use crate::ticker::Ticker;

/// Channel indices that fired on one tick, in checking order.
pub type FiredChannels = heapless::Vec<u8, MAX_CHANNELS>;

/// Lifecycle of one playback session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed or reset, not yet started
    #[default]
    Init,
    /// Ticking
    Running,
    /// END_OF_AUDIO reached; voices silenced
    Finished,
    /// Halted by the host before END_OF_AUDIO; voices silenced
    Stopped,
}

/// What happened on a single tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// Ticker value the channels were compared against
    pub tick: u16,
    /// Channels whose event fired
    pub fired: FiredChannels,
    /// True if END_OF_AUDIO was reached on this tick
    pub finished: bool,
}

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Finished,
    Stopped,
}

/// Totals for a completed session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub outcome: SessionOutcome,
    /// Ticker value when the session ended
    pub final_tick: u16,
    /// Number of completed ticks (pacing delays taken)
    pub ticks_elapsed: u32,
    /// Number of payloads written
    pub events_fired: usize,
}

/// Drives one session over a stream set.
///
/// The scheduler owns the ticker and one cursor per channel; nothing else
/// mutates them while a session runs. It has no error path: the stream set
/// is trusted to be well formed (see [`StreamSet::validate`]).
pub struct Scheduler<S, P> {
    streams: StreamSet,
    cursors: Vec<ChannelCursor>,
    ticker: Ticker,
    state: SchedulerState,
    sink: S,
    pacer: P,
    ticks_elapsed: u32,
    events_fired: usize,
}

impl<S: SoundSink, P: Pacer> Scheduler<S, P> {
    /// Create a scheduler in the INIT state.
    pub fn new(streams: StreamSet, sink: S, pacer: P) -> Self {
        let cursors = alloc::vec![ChannelCursor::new(); streams.len()];
        Self {
            streams,
            cursors,
            ticker: Ticker::new(),
            state: SchedulerState::Init,
            sink,
            pacer,
            ticks_elapsed: 0,
            events_fired: 0,
        }
    }

    /// INIT -> RUNNING: silence the chip, zero the ticker, rewind all cursors.
    ///
    /// Returns false if the scheduler is not in INIT.
    pub fn start(&mut self) -> bool {
        if self.state != SchedulerState::Init {
            tracing::debug!(state = ?self.state, "start ignored outside INIT");
            return false;
        }

        self.sink.silence_all();
        self.ticker.reset();
        for cursor in &mut self.cursors {
            cursor.reset();
        }
        self.ticks_elapsed = 0;
        self.events_fired = 0;
        self.state = SchedulerState::Running;

        tracing::debug!(
            channels = self.streams.len(),
            end_tick = ?self.streams.end_tick(),
            "session started"
        );
        true
    }

    /// Run one tick. Returns `None` unless the scheduler is RUNNING.
    pub fn step(&mut self) -> Option<TickReport> {
        #[cfg(feature = "alloc_check")]
        {
            assert_no_alloc::assert_no_alloc(|| self.step_inner())
        }
        #[cfg(not(feature = "alloc_check"))]
        {
            self.step_inner()
        }
    }

    fn step_inner(&mut self) -> Option<TickReport> {
        if self.state != SchedulerState::Running {
            return None;
        }

        let now = self.ticker.value();
        let mut fired = FiredChannels::new();
        let mut end_reached = false;

        let channels = self.streams.channels();
        for (idx, (stream, cursor)) in channels.iter().zip(self.cursors.iter_mut()).enumerate() {
            if !cursor.is_active() {
                continue;
            }
            match cursor.peek(stream) {
                // Checked ahead of any event: the marker is never played.
                StreamEntry::EndOfAudio { at } if at == now => {
                    end_reached = true;
                    break;
                }
                StreamEntry::Event(event) if event.time == now => {
                    self.sink.write(&event.payload);
                    cursor.advance(stream);
                    self.events_fired += 1;
                    // StreamSet bounds channels to MAX_CHANNELS, the report's capacity.
                    let pushed = fired.push(idx as u8);
                    debug_assert!(pushed.is_ok());
                    tracing::trace!(tick = now, channel = idx, payload = %event.payload, "fire");
                }
                StreamEntry::EndChannel => cursor.retire(),
                _ => {}
            }
        }

        if end_reached {
            self.finish(SchedulerState::Finished);
            return Some(TickReport {
                tick: now,
                fired,
                finished: true,
            });
        }

        self.pacer.delay_one_tick();
        self.ticker.tick();
        self.ticks_elapsed = self.ticks_elapsed.wrapping_add(1);

        Some(TickReport {
            tick: now,
            fired,
            finished: false,
        })
    }

    /// Start (if needed) and tick until END_OF_AUDIO.
    pub fn run(&mut self) -> SessionSummary {
        self.run_until(|| false)
    }

    /// Like [`run`](Self::run), but polls `stop` before every tick.
    ///
    /// A stop request silences the chip and leaves the scheduler STOPPED.
    pub fn run_until(&mut self, mut stop: impl FnMut() -> bool) -> SessionSummary {
        if self.state == SchedulerState::Init {
            self.start();
        }

        while self.state == SchedulerState::Running {
            if stop() {
                self.finish(SchedulerState::Stopped);
                break;
            }
            self.step();
        }

        self.summary()
    }

    /// Host-side halt. Silences the chip if a session was running.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Running {
            self.finish(SchedulerState::Stopped);
        }
    }

    fn finish(&mut self, state: SchedulerState) {
        self.sink.silence_all();
        self.state = state;
        tracing::debug!(
            tick = self.ticker.value(),
            events = self.events_fired,
            ?state,
            "session ended"
        );
    }

    /// Return to INIT so a fresh session can start.
    pub fn reset(&mut self) {
        self.state = SchedulerState::Init;
        self.ticker.reset();
        for cursor in &mut self.cursors {
            cursor.reset();
        }
        self.ticks_elapsed = 0;
        self.events_fired = 0;
    }

    /// Totals so far. `outcome` is only meaningful once the session ended.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            outcome: match self.state {
                SchedulerState::Stopped => SessionOutcome::Stopped,
                _ => SessionOutcome::Finished,
            },
            final_tick: self.ticker.value(),
            ticks_elapsed: self.ticks_elapsed,
            events_fired: self.events_fired,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Current ticker value.
    pub fn ticker(&self) -> u16 {
        self.ticker.value()
    }

    /// True once the session is over, either way.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SchedulerState::Finished | SchedulerState::Stopped)
    }

    pub fn streams(&self) -> &StreamSet {
        &self.streams
    }

    /// Cursor of a channel, for inspection.
    pub fn cursor(&self, channel: usize) -> Option<&ChannelCursor> {
        self.cursors.get(channel)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::NoPacing;
    use crate::sink::{RecordingSink, SinkOp};
    use alloc::vec;
    use psg_ir::{ChannelStream, Event, Payload, StreamSetBuilder, Terminator};

    fn ev(time: u16, tag: u8) -> Event {
        Event::from_bytes(time, [tag, time as u8, (time >> 8) as u8])
    }

    fn scheduler(set: StreamSet) -> Scheduler<RecordingSink, NoPacing> {
        Scheduler::new(set, RecordingSink::new(), NoPacing)
    }

    /// Channel A: {0, 100}; channel B: {0, 50} with END_OF_AUDIO at 150.
    fn two_channel_set() -> StreamSet {
        StreamSetBuilder::new()
            .channel("a", vec![ev(0, 0xA), ev(100, 0xA)])
            .channel("b", vec![ev(0, 0xB), ev(50, 0xB), ev(150, 0xB)])
            .build()
            .unwrap()
    }

    #[test]
    fn starts_in_init_and_does_nothing() {
        let mut sched = scheduler(two_channel_set());
        assert_eq!(sched.state(), SchedulerState::Init);
        assert_eq!(sched.step(), None);
        assert!(sched.sink().ops().is_empty());
    }

    #[test]
    fn start_silences_and_runs() {
        let mut sched = scheduler(two_channel_set());
        assert!(sched.start());
        assert_eq!(sched.state(), SchedulerState::Running);
        assert_eq!(sched.sink().ops(), &[SinkOp::SilenceAll]);
        assert!(!sched.start());
    }

    #[test]
    fn two_channel_scenario() {
        let mut sched = scheduler(two_channel_set());
        sched.start();

        let mut fired_at = vec![];
        while let Some(report) = sched.step() {
            if !report.fired.is_empty() {
                fired_at.push((report.tick, report.fired.clone()));
            }
            if report.finished {
                assert_eq!(report.tick, 150);
                assert!(report.fired.is_empty());
            }
        }

        let expected: Vec<(u16, FiredChannels)> = vec![
            (0, FiredChannels::from_slice(&[0, 1]).unwrap()),
            (50, FiredChannels::from_slice(&[1]).unwrap()),
            (100, FiredChannels::from_slice(&[0]).unwrap()),
        ];
        assert_eq!(fired_at, expected);
        assert_eq!(sched.state(), SchedulerState::Finished);

        let ops = sched.sink().ops();
        assert_eq!(ops.first(), Some(&SinkOp::SilenceAll));
        assert_eq!(ops.last(), Some(&SinkOp::SilenceAll));
        assert_eq!(sched.sink().silence_count(), 2);
        // The 150 marker's payload is never written.
        assert!(sched.sink().writes().all(|p| p.0[1] != 150));
        assert_eq!(sched.sink().writes().count(), 4);
    }

    #[test]
    fn visits_every_tick_in_order() {
        let mut sched = scheduler(two_channel_set());
        sched.start();

        let mut expected_tick = 0u16;
        while let Some(report) = sched.step() {
            assert_eq!(report.tick, expected_tick);
            expected_tick += 1;
        }
        assert_eq!(expected_tick, 151);
    }

    #[test]
    fn finishes_after_end_tick_ticks() {
        let mut sched = scheduler(two_channel_set());
        let summary = sched.run();

        assert_eq!(summary.outcome, SessionOutcome::Finished);
        assert_eq!(summary.final_tick, 150);
        assert_eq!(summary.ticks_elapsed, 150);
        assert_eq!(summary.events_fired, 4);
    }

    #[test]
    fn single_event_channel_fires_once() {
        let set = StreamSetBuilder::new()
            .channel("once", vec![ev(0, 1)])
            .channel("end", vec![ev(5, 2), ev(20, 2)])
            .build()
            .unwrap();
        let mut sched = scheduler(set);
        sched.start();

        let first = sched.step().unwrap();
        assert_eq!(first.fired.as_slice(), &[0]);
        let second = sched.step().unwrap();
        assert!(second.fired.is_empty());
        assert!(!sched.cursor(0).unwrap().is_active());

        let summary = sched.run();
        assert_eq!(summary.events_fired, 2);
        let channel0_writes = sched
            .sink()
            .writes()
            .filter(|p| p.0[0] == 1)
            .count();
        assert_eq!(channel0_writes, 1);
    }

    #[test]
    fn tied_final_events_end_on_lowest_channel() {
        let set = StreamSetBuilder::new()
            .channel("a", vec![ev(0, 1), ev(30, 1)])
            .channel("b", vec![ev(10, 2), ev(30, 2)])
            .build()
            .unwrap();
        let mut sched = scheduler(set);
        let summary = sched.run();

        assert_eq!(summary.final_tick, 30);
        // Channel b's tick-30 event is never reached: the session ends first.
        let writes: Vec<Payload> = sched.sink().writes().copied().collect();
        assert_eq!(writes, vec![ev(0, 1).payload, ev(10, 2).payload]);
    }

    #[test]
    fn silence_all_once_after_last_event() {
        let mut sched = scheduler(two_channel_set());
        sched.run();

        let ops = sched.sink().ops();
        let last_write = ops.iter().rposition(|op| matches!(op, SinkOp::Write(_))).unwrap();
        let silences_after = ops[last_write..]
            .iter()
            .filter(|op| matches!(op, SinkOp::SilenceAll))
            .count();
        assert_eq!(silences_after, 1);
        assert_eq!(ops.len() - 1, last_write + 1);
    }

    #[test]
    fn finished_is_terminal() {
        let mut sched = scheduler(two_channel_set());
        sched.run();
        let ops_before = sched.sink().ops().len();

        assert_eq!(sched.step(), None);
        assert!(!sched.start());
        let summary = sched.run();
        assert_eq!(summary.final_tick, 150);
        assert_eq!(sched.sink().ops().len(), ops_before);
    }

    #[test]
    fn reset_allows_a_fresh_session() {
        let mut sched = scheduler(two_channel_set());
        let first = sched.run();
        sched.reset();
        assert_eq!(sched.state(), SchedulerState::Init);
        assert_eq!(sched.ticker(), 0);

        let second = sched.run();
        assert_eq!(first, second);
        assert_eq!(sched.sink().writes().count(), 8);
    }

    #[test]
    fn stop_request_halts_and_silences() {
        let mut sched = scheduler(two_channel_set());
        let mut polls = 0;
        let summary = sched.run_until(|| {
            polls += 1;
            polls > 60
        });

        assert_eq!(summary.outcome, SessionOutcome::Stopped);
        assert_eq!(summary.final_tick, 60);
        assert_eq!(sched.state(), SchedulerState::Stopped);
        assert_eq!(sched.sink().ops().last(), Some(&SinkOp::SilenceAll));
        // Ticks 0 and 50 fired; tick 100 was never reached.
        assert_eq!(summary.events_fired, 3);
    }

    #[test]
    fn pacer_runs_once_per_completed_tick() {
        let mut delays = 0u32;
        let set = two_channel_set();
        let summary = {
            let mut sched = Scheduler::new(set, RecordingSink::new(), || delays += 1);
            sched.run()
        };
        assert_eq!(delays, summary.ticks_elapsed);
        assert_eq!(delays, 150);
    }

    #[test]
    fn empty_terminal_ends_at_ffff() {
        let set = StreamSet::new(vec![
            ChannelStream::new("a", vec![ev(0, 1), ev(3, 1)], Terminator::EndChannel),
            ChannelStream::new("b", vec![], Terminator::EndOfAudio),
        ])
        .unwrap();
        let mut sched = scheduler(set);
        let summary = sched.run();
        assert_eq!(summary.final_tick, 0xFFFF);
        assert_eq!(summary.ticks_elapsed, 0xFFFF);
        assert_eq!(summary.events_fired, 2);
    }

    #[test]
    fn report_lists_every_channel_of_a_full_set() {
        let mut builder = StreamSetBuilder::new();
        for ch in 0..MAX_CHANNELS as u8 - 1 {
            builder = builder.channel("v", vec![ev(0, ch)]);
        }
        let last = MAX_CHANNELS as u8 - 1;
        let set = builder
            .channel("end", vec![ev(0, last), ev(5, last)])
            .build()
            .unwrap();
        let mut sched = scheduler(set);
        sched.start();

        let report = sched.step().unwrap();
        assert_eq!(report.fired.len(), MAX_CHANNELS);
        assert_eq!(sched.sink().writes().count(), report.fired.len());
    }

    #[test]
    fn premature_end_marker_cuts_the_session() {
        // Trusted: channel 0 carries a stray END_OF_AUDIO before channel 1 is done.
        let set = StreamSet::new_trusted(vec![
            ChannelStream::new("a", vec![ev(0, 1), ev(10, 1)], Terminator::EndOfAudio),
            ChannelStream::new("b", vec![ev(0, 2), ev(40, 2)], Terminator::EndChannel),
        ])
        .unwrap();
        let mut sched = scheduler(set);
        let summary = sched.run();
        assert_eq!(summary.final_tick, 10);
        assert_eq!(summary.events_fired, 2);
    }
}
