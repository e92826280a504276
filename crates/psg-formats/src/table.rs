//! Bit-exact channel table codec.

use binrw::io::Cursor;
use binrw::{binrw, BinReaderExt, BinWrite};
use psg_ir::{
    ChannelStream, Event, StreamSet, Terminator, END_CHANNEL, END_OF_AUDIO, PAYLOAD_LEN,
};

use crate::{FormatError, Validation};

/// Size of one event record on the wire.
pub const RECORD_LEN: usize = 2 + PAYLOAD_LEN;
/// Size of the bare time value that closes a table.
pub const TERMINATOR_LEN: usize = 2;

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RawRecord {
    time: u16,
    payload: [u8; PAYLOAD_LEN],
}

/// Conventional voice names for a four-voice chip.
pub fn default_channel_name(index: usize) -> String {
    match index {
        0..=2 => format!("tone{}", index),
        3 => "noise".to_string(),
        _ => format!("ch{}", index),
    }
}

/// Decode one channel table from the start of `data`.
///
/// Returns the stream and the number of bytes consumed, so tables stored
/// back to back can be walked in sequence. `channel` is used for naming
/// and error reporting only.
pub fn decode_channel(data: &[u8], channel: usize) -> Result<(ChannelStream, usize), FormatError> {
    let mut reader = Cursor::new(data);
    let mut records = Vec::new();
    let mut previous: Option<u16> = None;

    let terminator = loop {
        let time: u16 = reader
            .read_le()
            .map_err(|e| eof_or(e, channel))?;

        if time == END_OF_AUDIO {
            break Terminator::EndOfAudio;
        }
        // The first record is always an event, so time 0 can open a table.
        if previous.is_some_and(|prev| time <= prev) {
            break Terminator::EndChannel;
        }

        let payload: [u8; PAYLOAD_LEN] = reader
            .read_le()
            .map_err(|e| eof_or(e, channel))?;
        records.push(Event::from_bytes(time, payload));
        previous = Some(time);
    };

    let consumed = reader.position() as usize;
    tracing::trace!(channel, records = records.len(), ?terminator, "decoded channel table");

    let stream = ChannelStream::new(&default_channel_name(channel), records, terminator);
    Ok((stream, consumed))
}

/// Decode `channel_count` tables stored back to back with no header.
///
/// The whole of `data` must be used.
pub fn decode_table(
    data: &[u8],
    channel_count: usize,
    validation: Validation,
) -> Result<StreamSet, FormatError> {
    let mut offset = 0;
    let mut channels = Vec::with_capacity(channel_count);

    for channel in 0..channel_count {
        let (stream, consumed) = decode_channel(&data[offset..], channel)?;
        offset += consumed;
        channels.push(stream);
    }

    if offset != data.len() {
        return Err(FormatError::TrailingBytes(data.len() - offset));
    }

    tracing::debug!(
        channels = channel_count,
        bytes = data.len(),
        ?validation,
        "decoded stream table"
    );

    match validation {
        Validation::Strict => Ok(StreamSet::new(channels)?),
        Validation::Trusted => Ok(StreamSet::new_trusted(channels)?),
    }
}

/// Append one channel table to `out`.
pub fn encode_channel(
    stream: &ChannelStream,
    channel: usize,
    out: &mut Vec<u8>,
) -> Result<(), FormatError> {
    if stream.is_empty() && !stream.is_terminal() {
        return Err(FormatError::EmptyChannel(channel));
    }

    let mut writer = Cursor::new(Vec::with_capacity(stream.len() * RECORD_LEN + TERMINATOR_LEN));
    for record in stream.records() {
        RawRecord {
            time: record.time,
            payload: record.payload.0,
        }
        .write(&mut writer)?;
    }

    let terminator = match stream.terminator() {
        Terminator::EndChannel => END_CHANNEL,
        Terminator::EndOfAudio => END_OF_AUDIO,
    };
    terminator.write_le(&mut writer)?;

    out.extend_from_slice(&writer.into_inner());
    Ok(())
}

/// Encode every channel back to back with no header.
pub fn encode_table(set: &StreamSet) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::new();
    for (channel, stream) in set.channels().iter().enumerate() {
        encode_channel(stream, channel, &mut out)?;
    }
    Ok(out)
}

/// Short reads become `UnexpectedEof`; anything else passes through.
fn eof_or(err: binrw::Error, channel: usize) -> FormatError {
    if err.is_eof() {
        FormatError::UnexpectedEof { channel }
    } else {
        FormatError::Binary(err)
    }
}
