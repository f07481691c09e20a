//! Single-range `Range` header negotiation.
//!
//! Parsing and resolution are separate steps: a header can be parsed as soon
//! as it arrives, but it is only resolved into absolute bounds once the
//! content length is known. Either order yields the same result.

/// Why a `Range` header could not be honoured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("malformed range header: {0}")]
    Malformed(&'static str),
    #[error("multiple ranges are not supported")]
    MultipleRanges,
    #[error("range does not overlap content of length {total_length}")]
    Unsatisfiable { total_length: u64 },
}

/// A parsed, not yet resolved, byte-range-spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// No header: the whole content.
    Full,
    /// `first-last`
    Bounded { first: u64, last: u64 },
    /// `first-`
    From { first: u64 },
    /// `-suffix_len`
    Suffix { len: u64 },
}

/// A resolved, satisfiable byte range.
///
/// Holds the inclusive start position, the number of bytes covered and the
/// total content length it was resolved against. A full range over empty
/// content has zero length and no last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    first: u64,
    len: u64,
    total_length: u64,
}

impl ByteRange {
    /// The range covering all of `total_length`.
    pub fn full(total_length: u64) -> ByteRange {
        ByteRange {
            first: 0,
            len: total_length,
            total_length,
        }
    }

    #[inline]
    pub fn first(&self) -> u64 {
        self.first
    }

    /// Inclusive last byte position, or `None` for an empty range.
    #[inline]
    pub fn last(&self) -> Option<u64> {
        (self.len > 0).then(|| self.first + self.len - 1)
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Does the range cover the content from its first to its last byte?
    #[inline]
    pub fn is_full(&self) -> bool {
        self.first == 0 && self.len == self.total_length
    }
}

fn parse_position(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed("byte position is not a number"));
    }
    s.parse()
        .map_err(|_| RangeError::Malformed("byte position overflows"))
}

/// Parse a `Range` header value. `None` means no header was supplied.
pub fn parse(header: Option<&str>) -> Result<RangeSpec, RangeError> {
    let Some(header) = header else {
        return Ok(RangeSpec::Full);
    };

    let (unit, set) = header
        .trim()
        .split_once('=')
        .ok_or(RangeError::Malformed("missing '='"))?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::Malformed("unsupported range unit"));
    }
    if set.contains(',') {
        return Err(RangeError::MultipleRanges);
    }

    let (first, last) = set
        .trim()
        .split_once('-')
        .ok_or(RangeError::Malformed("missing '-'"))?;
    let (first, last) = (first.trim(), last.trim());

    match (first.is_empty(), last.is_empty()) {
        (true, true) => Err(RangeError::Malformed("empty range")),
        (true, false) => Ok(RangeSpec::Suffix {
            len: parse_position(last)?,
        }),
        (false, true) => Ok(RangeSpec::From {
            first: parse_position(first)?,
        }),
        (false, false) => {
            let first = parse_position(first)?;
            let last = parse_position(last)?;
            if last < first {
                return Err(RangeError::Malformed("last byte precedes first byte"));
            }
            Ok(RangeSpec::Bounded { first, last })
        }
    }
}

impl RangeSpec {
    /// Resolve against a known content length.
    pub fn resolve(self, total_length: u64) -> Result<ByteRange, RangeError> {
        let unsatisfiable = RangeError::Unsatisfiable { total_length };
        match self {
            RangeSpec::Full => Ok(ByteRange::full(total_length)),
            RangeSpec::Bounded { first, last } => {
                if last >= total_length {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange {
                    first,
                    len: last - first + 1,
                    total_length,
                })
            }
            RangeSpec::From { first } => {
                if first >= total_length {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange {
                    first,
                    len: total_length - first,
                    total_length,
                })
            }
            RangeSpec::Suffix { len } => {
                if len == 0 || total_length == 0 {
                    return Err(unsatisfiable);
                }
                let len = len.min(total_length);
                Ok(ByteRange {
                    first: total_length - len,
                    len,
                    total_length,
                })
            }
        }
    }
}

/// Parse `header` and resolve it against `total_length` in one step.
pub fn negotiate(header: Option<&str>, total_length: u64) -> Result<ByteRange, RangeError> {
    parse(header)?.resolve(total_length)
}
