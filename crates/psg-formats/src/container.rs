//! `.psgs` container: a 6-byte header in front of a headerless table.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "PSGS"
//! 4       1     version (1)
//! 5       1     channel count
//! 6       ..    channel tables, back to back
//! ```

use binrw::io::{Cursor, Seek, Write};
use binrw::{binrw, BinRead, BinWrite};
use psg_ir::StreamSet;

use crate::table::{decode_table, encode_table};
use crate::{FormatError, Validation};

pub const PSGS_MAGIC: &[u8; 4] = b"PSGS";
pub const PSGS_VERSION: u8 = 1;
const HEADER_LEN: usize = 6;

#[binrw]
#[brw(little, magic = b"PSGS")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ContainerHeader {
    version: u8,
    channel_count: u8,
}

/// Load a `.psgs` file from bytes.
pub fn load_psgs(data: &[u8], validation: Validation) -> Result<StreamSet, FormatError> {
    let header = ContainerHeader::read(&mut Cursor::new(data)).map_err(|e| {
        if e.is_eof() || matches!(e, binrw::Error::BadMagic { .. }) {
            FormatError::InvalidHeader
        } else {
            FormatError::Binary(e)
        }
    })?;

    if header.version != PSGS_VERSION {
        return Err(FormatError::UnsupportedVersion(header.version));
    }

    tracing::debug!(channels = header.channel_count, "loading psgs container");
    decode_table(&data[HEADER_LEN..], header.channel_count as usize, validation)
}

/// Write a stream set as a `.psgs` file.
pub fn write_psgs<W: Write + Seek>(w: &mut W, set: &StreamSet) -> Result<(), FormatError> {
    let channel_count =
        u8::try_from(set.len()).map_err(|_| FormatError::ChannelCount(set.len()))?;
    let header = ContainerHeader {
        version: PSGS_VERSION,
        channel_count,
    };
    header.write(w)?;
    w.write_all(&encode_table(set)?)
        .map_err(|e| FormatError::Binary(e.into()))?;
    Ok(())
}

/// Serialize a stream set to `.psgs` bytes.
pub fn save_psgs(set: &StreamSet) -> Result<Vec<u8>, FormatError> {
    let mut cursor = Cursor::new(Vec::new());
    write_psgs(&mut cursor, set)?;
    Ok(cursor.into_inner())
}
