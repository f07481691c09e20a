//! MIME type guessing.
//!
//! Archive entries are typed from their file name alone. Plain files may also
//! be sniffed, which reads from disk and so must run off the I/O-driving task.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected when sniffing file contents.
const SNIFF_LEN: usize = 512;

/// Guesses content types for served resources.
pub trait MimeSniffer: Send + Sync {
    /// Guess a MIME type from a file name only.
    fn mime_for_name(&self, file_name: &str) -> Option<String>;

    /// Guess a MIME type for a file on disk. May perform blocking I/O.
    fn sniff_file(&self, path: &Path) -> Option<String> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| self.mime_for_name(name))
    }
}

/// Extension table backed sniffer, falling back to magic bytes for plain files.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMimeSniffer;

impl MimeSniffer for DefaultMimeSniffer {
    fn mime_for_name(&self, file_name: &str) -> Option<String> {
        mime_from_file_name(file_name).map(str::to_string)
    }

    fn sniff_file(&self, path: &Path) -> Option<String> {
        if let Some(mime) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(mime_from_file_name)
        {
            return Some(mime.to_string());
        }

        let mut head = Vec::with_capacity(SNIFF_LEN);
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot sniff file");
                return None;
            }
        };
        file.take(SNIFF_LEN as u64).read_to_end(&mut head).ok()?;
        mime_from_bytes(&head).map(str::to_string)
    }
}

pub fn mime_from_file_name(file_name: &str) -> Option<&'static str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    mime_from_extension(&ext.to_ascii_lowercase())
}

pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "html" | "htm" | "shtml" | "shtm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" | "cjs" => "text/javascript",
        "json" | "map" => "application/json",
        "txt" | "text" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "xhtml" | "xht" | "xhtm" => "application/xhtml+xml",
        "svg" | "svgz" => "image/svg+xml",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" | "jpe" | "jfif" | "pjpeg" | "pjp" => "image/jpeg",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        _ => return None,
    };
    Some(mime)
}

/// Guess a MIME type from leading content bytes.
pub fn mime_from_bytes(head: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"%PDF-", "application/pdf"),
        (b"\x00asm", "application/wasm"),
        (b"\x1f\x8b\x08", "application/gzip"),
        (b"PK\x03\x04", "application/zip"),
        (b"wOFF", "font/woff"),
        (b"wOF2", "font/woff2"),
    ];

    if let Some(&(_, mime)) = SIGNATURES.iter().find(|(magic, _)| head.starts_with(magic)) {
        return Some(mime);
    }

    let text = head.trim_ascii_start();
    let lower: Vec<u8> = text.iter().take(16).map(u8::to_ascii_lowercase).collect();
    if lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html") {
        return Some("text/html");
    }
    if lower.starts_with(b"<?xml") {
        return Some("text/xml");
    }
    None
}
