//! Response metadata reported when a job's headers are complete.

use std::path::Path;

use crate::range::ByteRange;
use crate::shortcut::file_url;

pub const STATUS_OK: u16 = 200;
pub const STATUS_MOVED_PERMANENTLY: u16 = 301;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// HTTP-shaped description of a job's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_length: u64,
    pub mime_type: Option<String>,
}

impl ResponseInfo {
    /// Successful (full or partial) content response.
    pub(crate) fn content(range: &ByteRange, mime_type: Option<String>, plain_file: bool) -> Self {
        let content_type = mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE);
        let mut headers = vec![
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
            ("Content-Type".to_string(), content_type.to_string()),
            ("Content-Length".to_string(), range.len().to_string()),
            ("Accept-Ranges".to_string(), "bytes".to_string()),
        ];
        if plain_file {
            headers.push(("Cache-Control".to_string(), "no-cache".to_string()));
        }
        ResponseInfo {
            status: STATUS_OK,
            headers,
            content_length: range.len(),
            mime_type,
        }
    }

    /// Redirect to the target of a shortcut.
    pub(crate) fn redirect(target: &Path) -> Self {
        ResponseInfo {
            status: STATUS_MOVED_PERMANENTLY,
            headers: vec![
                ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
                ("Location".to_string(), file_url(target)),
                ("Content-Length".to_string(), "0".to_string()),
            ],
            content_length: 0,
            mime_type: None,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::negotiate;

    #[test]
    fn content_headers() {
        let range = negotiate(Some("bytes=10-19"), 50).unwrap();
        let info = ResponseInfo::content(&range, Some("text/plain".into()), true);
        assert_eq!(info.status, 200);
        assert_eq!(info.content_length, 10);
        assert_eq!(info.header("content-length"), Some("10"));
        assert_eq!(info.header("Content-Type"), Some("text/plain"));
        assert_eq!(info.header("Cache-Control"), Some("no-cache"));
        assert_eq!(info.header("Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn archive_entries_are_not_cache_controlled() {
        let info = ResponseInfo::content(&ByteRange::full(3), None, false);
        assert_eq!(info.header("Cache-Control"), None);
        assert_eq!(info.header("Content-Type"), Some(DEFAULT_MIME_TYPE));
    }

    #[test]
    fn redirect_location() {
        let info = ResponseInfo::redirect(Path::new("/srv/target.txt"));
        assert_eq!(info.status, 301);
        assert_eq!(info.header("Location"), Some("file:///srv/target.txt"));
    }
}
