//! Sans-IO parsing primitives for asar containers and shortcut files.
//!
//! These functions work on byte slices without any I/O traits, so the same
//! code backs the blocking index builder and the tests.
//!
//! All functions return `(value, bytes_consumed)` on success, allowing the
//! caller to manage buffer positions.

/// Error type for parsing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Need more bytes to complete parsing. Contains minimum additional bytes needed.
    #[error("need {0} more bytes")]
    NeedMoreBytes(usize),
    /// Invalid data encountered.
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
    /// Invalid UTF-8 in string.
    #[error("invalid UTF-8")]
    InvalidUtf8,
}

impl From<ParseError> for std::io::Error {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::NeedMoreBytes(_) => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e)
            }
            ParseError::InvalidData(_) | ParseError::InvalidUtf8 => {
                std::io::Error::new(std::io::ErrorKind::InvalidData, e)
            }
        }
    }
}

pub type ParseResult<T> = Result<(T, usize), ParseError>;

/// Byte length of the size pickle that opens every asar container.
pub const SIZE_PICKLE_LEN: usize = 8;

// ============================================================================
// PRIMITIVE PARSERS
// ============================================================================

/// Parse a little-endian u16.
#[inline]
pub fn parse_u16_le(data: &[u8]) -> ParseResult<u16> {
    if data.len() < 2 {
        return Err(ParseError::NeedMoreBytes(2 - data.len()));
    }
    Ok((u16::from_le_bytes([data[0], data[1]]), 2))
}

/// Parse a little-endian u32.
#[inline]
pub fn parse_u32_le(data: &[u8]) -> ParseResult<u32> {
    if data.len() < 4 {
        return Err(ParseError::NeedMoreBytes(4 - data.len()));
    }
    Ok((
        u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
        4,
    ))
}

/// Parse a u32 at an absolute position, failing if it lies outside `data`.
#[inline]
pub fn parse_u32_at(data: &[u8], pos: usize) -> Result<u32, ParseError> {
    let tail = data.get(pos..).ok_or(ParseError::InvalidData("offset out of bounds"))?;
    parse_u32_le(tail).map(|(v, _)| v)
}

/// Parse a NUL-terminated byte string starting at `pos`.
///
/// Non-UTF-8 bytes are replaced, since shortcut files store ANSI code-page text.
pub fn parse_cstr_at(data: &[u8], pos: usize) -> Result<String, ParseError> {
    let tail = data.get(pos..).ok_or(ParseError::InvalidData("offset out of bounds"))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(ParseError::InvalidData("unterminated string"))?;
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

/// Parse a NUL-terminated UTF-16LE string starting at `pos`.
pub fn parse_wstr_at(data: &[u8], pos: usize) -> Result<String, ParseError> {
    let tail = data.get(pos..).ok_or(ParseError::InvalidData("offset out of bounds"))?;
    let units: Vec<u16> = tail
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    if units.len() * 2 >= tail.len() - tail.len() % 2 {
        return Err(ParseError::InvalidData("unterminated wide string"));
    }
    String::from_utf16(&units).map_err(|_| ParseError::InvalidUtf8)
}

// ============================================================================
// PICKLE PARSERS
// ============================================================================

/// Parse the 8-byte size pickle. Returns the byte length of the header pickle.
pub fn parse_size_pickle(data: &[u8]) -> ParseResult<u32> {
    let (payload, _) = parse_u32_le(data)?;
    if payload != 4 {
        return Err(ParseError::InvalidData("size pickle payload must be 4 bytes"));
    }
    let (header_size, _) = parse_u32_le(&data[4..])?;
    Ok((header_size, SIZE_PICKLE_LEN))
}

/// Parse the header pickle, returning the embedded JSON string.
///
/// Layout: `u32 payload_size`, then the payload: `u32 string_len`, the
/// string bytes, padding up to a 4-byte boundary.
pub fn parse_header_pickle(data: &[u8]) -> ParseResult<&str> {
    let (payload_size, pos) = parse_u32_le(data)?;
    let payload_end = pos
        .checked_add(payload_size as usize)
        .ok_or(ParseError::InvalidData("header pickle too large"))?;
    if data.len() < payload_end {
        return Err(ParseError::NeedMoreBytes(payload_end - data.len()));
    }

    let payload = &data[pos..payload_end];
    let (string_len, string_pos) = parse_u32_le(payload)?;
    let string_end = string_pos
        .checked_add(string_len as usize)
        .ok_or(ParseError::InvalidData("header string too large"))?;
    if string_end > payload.len() {
        return Err(ParseError::InvalidData("header string overruns pickle payload"));
    }

    let json = std::str::from_utf8(&payload[string_pos..string_end])
        .map_err(|_| ParseError::InvalidUtf8)?;
    Ok((json, payload_end))
}
