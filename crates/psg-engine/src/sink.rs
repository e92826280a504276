//! The sound device seen from the scheduler.

use alloc::vec::Vec;
use psg_ir::Payload;

/// Volume-off commands for the four voices (attenuation 15 on tone 0-2 and noise).
pub const SILENCE_ALL: [u8; 4] = [0x9F, 0xBF, 0xDF, 0xFF];

/// Write-only control port of the sound chip.
///
/// Both operations are synchronous and side-effect-only; the scheduler never
/// reads anything back.
pub trait SoundSink {
    /// Forward a command frame verbatim.
    fn write(&mut self, payload: &Payload);

    /// Turn off all four voices.
    fn silence_all(&mut self);
}

impl<T: SoundSink + ?Sized> SoundSink for &mut T {
    fn write(&mut self, payload: &Payload) {
        (**self).write(payload)
    }

    fn silence_all(&mut self) {
        (**self).silence_all()
    }
}

/// One operation observed by a [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkOp {
    Write(Payload),
    SilenceAll,
}

/// Sink that keeps every operation it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    ops: Vec<SinkOp>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn ops(&self) -> &[SinkOp] {
        &self.ops
    }

    /// Payloads written, in order.
    pub fn writes(&self) -> impl Iterator<Item = &Payload> + '_ {
        self.ops.iter().filter_map(|op| match op {
            SinkOp::Write(payload) => Some(payload),
            SinkOp::SilenceAll => None,
        })
    }

    pub fn silence_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SinkOp::SilenceAll))
            .count()
    }
}

impl SoundSink for RecordingSink {
    fn write(&mut self, payload: &Payload) {
        self.ops.push(SinkOp::Write(*payload));
    }

    fn silence_all(&mut self) {
        self.ops.push(SinkOp::SilenceAll);
    }
}

/// Sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SoundSink for NullSink {
    fn write(&mut self, _payload: &Payload) {}

    fn silence_all(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.silence_all();
        sink.write(&Payload::new([1, 2, 3]));
        sink.write(&Payload::new([4, 5, 6]));

        assert_eq!(sink.ops().len(), 3);
        assert_eq!(sink.ops()[0], SinkOp::SilenceAll);
        let writes: Vec<_> = sink.writes().copied().collect();
        assert_eq!(writes, [Payload::new([1, 2, 3]), Payload::new([4, 5, 6])]);
        assert_eq!(sink.silence_count(), 1);
    }

    #[test]
    fn mutable_reference_is_a_sink() {
        let mut sink = RecordingSink::new();
        {
            let mut borrowed = &mut sink;
            SoundSink::write(&mut borrowed, &Payload::new([7, 7, 7]));
        }
        assert_eq!(sink.writes().count(), 1);
    }

    #[test]
    fn silence_codes_address_each_voice() {
        for (voice, code) in SILENCE_ALL.iter().enumerate() {
            assert_eq!(code & 0x90, 0x90, "latch + volume bits");
            assert_eq!((code >> 5) & 0x03, voice as u8);
            assert_eq!(code & 0x0F, 0x0F);
        }
    }
}
