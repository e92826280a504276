//! Core data model for the psgseq sequencer.
//!
//! This crate defines the pre-baked per-channel event streams that drive
//! the scheduler: 16-bit event times, opaque 3-byte chip commands, and the
//! END_CHANNEL / END_OF_AUDIO sentinels decoded into a tagged variant.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod error;
mod event;
mod stream;
mod stream_set;

pub use error::StreamError;
pub use event::{Event, Payload, PAYLOAD_LEN};
pub use stream::{
    channel_name, ChannelName, ChannelStream, StreamEntry, Terminator, END_CHANNEL, END_OF_AUDIO,
};
pub use stream_set::{StreamSet, StreamSetBuilder, MAX_CHANNELS};
