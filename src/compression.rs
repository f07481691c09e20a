//! Transparent decompression for gzip-encoded entries.
//!
//! Some resources are shipped as gzip-compressed variants of a textual format
//! (`.svgz` is SVG). The filter sits between the byte source and the caller:
//! compressed bytes are pushed in as they are read, decoded bytes come out.

use std::io::{Result, Write};

use flate2::write::GzDecoder;

/// File extensions naming a gzip-compressed variant of a textual format.
const GZIP_VARIANT_EXTENSIONS: &[&str] = &["svgz"];

/// Does this file name denote a gzip-compressed variant?
pub fn is_gzip_variant(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => GZIP_VARIANT_EXTENSIONS
            .iter()
            .any(|candidate| ext.eq_ignore_ascii_case(candidate)),
        _ => false,
    }
}

/// Streaming gzip decoder driven by pushed buffers.
pub struct GzipFilter {
    decoder: GzDecoder<Vec<u8>>,
}

impl Default for GzipFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl GzipFilter {
    pub fn new() -> GzipFilter {
        GzipFilter {
            decoder: GzDecoder::new(Vec::new()),
        }
    }

    /// Feed compressed bytes, returning whatever could be decoded so far.
    ///
    /// May return an empty buffer while the decoder waits for more input.
    pub fn push(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.decoder.write_all(input)?;
        Ok(std::mem::take(self.decoder.get_mut()))
    }

    /// Signal end of input, returning the remaining decoded bytes.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        self.decoder.try_finish()?;
        Ok(std::mem::take(self.decoder.get_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn variants() {
        assert!(is_gzip_variant("image.svgz"));
        assert!(is_gzip_variant("IMAGE.SVGZ"));
        assert!(!is_gzip_variant("image.svg"));
        assert!(!is_gzip_variant(".svgz"));
        assert!(!is_gzip_variant("svgz"));
    }

    #[test]
    fn decodes_in_small_pieces() {
        let original = "<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>\n".repeat(50);
        let compressed = gzip(original.as_bytes());

        let mut filter = GzipFilter::new();
        let mut out = Vec::new();
        for chunk in compressed.chunks(5) {
            out.extend(filter.push(chunk).unwrap());
        }
        out.extend(filter.finish().unwrap());
        assert_eq!(out, original.as_bytes());
    }

    #[test]
    fn rejects_garbage() {
        let mut filter = GzipFilter::new();
        let result = filter
            .push(b"definitely not gzip data")
            .and_then(|_| filter.finish());
        assert!(result.is_err());
    }
}
