//! Stream table codecs for the psgseq sequencer.
//!
//! A channel table is a flat run of 5-byte records (little-endian `u16`
//! time, 3-byte chip command) closed by a bare 2-byte terminator:
//! `0xFFFF` on the terminal channel, a non-increasing time (`0x0000`) on
//! every other channel. Tables can be stored back to back without a header
//! (as in ROM images) or wrapped in a small `.psgs` container.

mod container;
mod table;

pub use container::{load_psgs, save_psgs, write_psgs, PSGS_MAGIC, PSGS_VERSION};
pub use table::{
    decode_channel, decode_table, default_channel_name, encode_channel, encode_table, RECORD_LEN,
    TERMINATOR_LEN,
};

use psg_ir::StreamError;
use thiserror::Error;

/// Error type for format parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid header")]
    InvalidHeader,
    /// Unexpected end of data inside a channel table
    #[error("unexpected end of data in channel {channel}")]
    UnexpectedEof { channel: usize },
    /// Unsupported container version
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u8),
    /// Bytes left over after the last channel table
    #[error("{0} trailing bytes after the last channel table")]
    TrailingBytes(usize),
    /// The channel count does not fit the container's header byte
    #[error("{0} channels do not fit a container header")]
    ChannelCount(usize),
    /// A channel with no records cannot be told apart from a time-0 event
    #[error("channel {0} has no records and cannot be encoded")]
    EmptyChannel(usize),
    /// The decoded streams break a scheduling invariant
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// Lower-level binrw failure
    #[error(transparent)]
    Binary(#[from] binrw::Error),
}

/// Whether decoded stream sets are checked before being handed out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Validation {
    /// Reject anything [`StreamSet::validate`](psg_ir::StreamSet::validate) rejects.
    #[default]
    Strict,
    /// Trust the producer. Malformed sets may end early or never end.
    Trusted,
}
