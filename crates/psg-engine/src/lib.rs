//! Playback engine for the psgseq sequencer.
//!
//! Advances a 16-bit ticker at a fixed rate and, on every tick, forwards the
//! due events of each channel stream to a sound sink.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod cursor;
mod frame;
pub mod pacing;
pub mod psg;
pub mod scheduler;
mod sink;
mod ticker;

pub use cursor::ChannelCursor;
pub use frame::Frame;
#[cfg(feature = "std")]
pub use pacing::FixedRatePacer;
pub use pacing::{NoPacing, Pacer};
pub use psg::{noise_payload, tone_payload, Psg, NTSC_CLOCK};
pub use scheduler::{
    FiredChannels, Scheduler, SchedulerState, SessionOutcome, SessionSummary, TickReport,
};
pub use sink::{NullSink, RecordingSink, SinkOp, SoundSink, SILENCE_ALL};
pub use ticker::Ticker;
