use std::io::{Read, Seek, SeekFrom};

use crate::parse::{self, ParseError, SIZE_PICKLE_LEN};

/// Hard cap on the JSON header size; anything larger is treated as garbage.
const MAX_HEADER_SIZE: u32 = 256 * 1024 * 1024;

/// The parsed preamble of an asar container.
///
/// The container begins with a size pickle, followed by a header pickle
/// wrapping a JSON document that describes every entry. Entry bytes start
/// immediately after the header pickle.
#[derive(Debug, Clone)]
pub struct AsarHeader {
    /// Byte length of the header pickle.
    pub header_size: u32,
    /// The JSON document describing the archive tree.
    pub json: String,
}

impl AsarHeader {
    /// Parse a header from a buffer holding the size pickle and the header pickle.
    pub fn parse(buf: &[u8]) -> Result<AsarHeader, ParseError> {
        let (header_size, pos) = parse::parse_size_pickle(buf)?;
        let end = pos + header_size as usize;
        if buf.len() < end {
            return Err(ParseError::NeedMoreBytes(end - buf.len()));
        }
        let (json, consumed) = parse::parse_header_pickle(&buf[pos..end])?;
        if consumed > header_size as usize {
            return Err(ParseError::InvalidData("header pickle exceeds declared size"));
        }
        Ok(AsarHeader {
            header_size,
            json: json.to_string(),
        })
    }

    /// Absolute offset of the first content byte in the container.
    #[inline]
    pub fn content_offset(&self) -> u64 {
        SIZE_PICKLE_LEN as u64 + self.header_size as u64
    }
}

/// Read the header from the start of a container.
pub(crate) fn read_header<R: Read + Seek>(
    reader: &mut R,
    container_len: u64,
) -> std::io::Result<AsarHeader> {
    reader.seek(SeekFrom::Start(0))?;

    let mut preamble = [0u8; SIZE_PICKLE_LEN];
    reader.read_exact(&mut preamble)?;
    let (header_size, _) = parse::parse_size_pickle(&preamble)?;

    if header_size > MAX_HEADER_SIZE
        || SIZE_PICKLE_LEN as u64 + header_size as u64 > container_len
    {
        return Err(ParseError::InvalidData("header size exceeds container length").into());
    }

    let mut buf = vec![0u8; SIZE_PICKLE_LEN + header_size as usize];
    buf[..SIZE_PICKLE_LEN].copy_from_slice(&preamble);
    reader.read_exact(&mut buf[SIZE_PICKLE_LEN..])?;

    Ok(AsarHeader::parse(&buf)?)
}
