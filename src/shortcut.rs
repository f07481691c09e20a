//! Windows shell link (`.lnk`) target extraction.
//!
//! Only the local target path is recovered: the `LinkInfo` structure's local
//! base path joined with its common path suffix. Network targets, environment
//! blocks and ID-list-only links are not resolved.

use std::path::{Path, PathBuf};

use url::Url;

use crate::parse::{self, ParseError, parse_u16_le};

const HEADER_SIZE: u32 = 0x4C;
const LINK_CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const HAS_LINK_TARGET_ID_LIST: u32 = 0x0000_0001;
const HAS_LINK_INFO: u32 = 0x0000_0002;

const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x0000_0001;

#[derive(Debug, thiserror::Error)]
pub enum ShortcutError {
    #[error("not a shell link file")]
    NotAShortcut,
    #[error("shell link has no local target path")]
    NoLocalTarget,
    #[error("malformed shell link")]
    Malformed(#[from] ParseError),
    #[error("failed to read shell link")]
    Io(#[from] std::io::Error),
}

/// Does this path name a shortcut file?
pub fn is_shortcut(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("lnk"))
}

/// Extract the local target path from shell link bytes.
pub fn resolve_shortcut(data: &[u8]) -> Result<PathBuf, ShortcutError> {
    if data.len() < HEADER_SIZE as usize
        || parse::parse_u32_at(data, 0)? != HEADER_SIZE
        || data[4..20] != LINK_CLSID
    {
        return Err(ShortcutError::NotAShortcut);
    }

    let flags = parse::parse_u32_at(data, 0x14)?;
    let mut pos = HEADER_SIZE as usize;

    if flags & HAS_LINK_TARGET_ID_LIST != 0 {
        let tail = data.get(pos..).ok_or(ParseError::InvalidData("missing ID list"))?;
        let (id_list_size, consumed) = parse_u16_le(tail)?;
        pos += consumed + id_list_size as usize;
    }

    if flags & HAS_LINK_INFO == 0 {
        return Err(ShortcutError::NoLocalTarget);
    }

    let info = data
        .get(pos..)
        .ok_or(ParseError::InvalidData("missing link info"))?;
    let info_size = parse::parse_u32_at(info, 0)? as usize;
    let info = info
        .get(..info_size)
        .ok_or(ParseError::InvalidData("link info overruns file"))?;

    let header_size = parse::parse_u32_at(info, 4)?;
    let info_flags = parse::parse_u32_at(info, 8)?;
    if info_flags & VOLUME_ID_AND_LOCAL_BASE_PATH == 0 {
        return Err(ShortcutError::NoLocalTarget);
    }

    let base_offset = parse::parse_u32_at(info, 16)? as usize;
    let suffix_offset = parse::parse_u32_at(info, 24)? as usize;

    let (base, suffix) = if header_size >= 0x24 {
        let base_unicode = parse::parse_u32_at(info, 28)? as usize;
        let suffix_unicode = parse::parse_u32_at(info, 32)? as usize;
        let base = if base_unicode != 0 {
            parse::parse_wstr_at(info, base_unicode)?
        } else {
            parse::parse_cstr_at(info, base_offset)?
        };
        let suffix = if suffix_unicode != 0 {
            parse::parse_wstr_at(info, suffix_unicode)?
        } else {
            parse::parse_cstr_at(info, suffix_offset)?
        };
        (base, suffix)
    } else {
        (
            parse::parse_cstr_at(info, base_offset)?,
            parse::parse_cstr_at(info, suffix_offset)?,
        )
    };

    if base.is_empty() {
        return Err(ShortcutError::NoLocalTarget);
    }

    Ok(PathBuf::from(base + &suffix))
}

/// Render a filesystem path as a `file:` URL for redirect locations.
///
/// Shortcut targets are Windows paths, which are not absolute on other
/// hosts; those are encoded segment by segment under the root instead.
pub fn file_url(path: &Path) -> String {
    if let Ok(url) = Url::from_file_path(path) {
        return url.into();
    }

    let raw = path.to_string_lossy().replace('\\', "/");
    let mut url = match Url::parse("file:///") {
        Ok(url) => url,
        Err(_) => return format!("file:///{}", raw.trim_start_matches('/')),
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .clear()
            .extend(raw.split('/').filter(|segment| !segment.is_empty()));
    }
    url.into()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a minimal shell link pointing at `base` + `suffix`.
    pub(crate) fn shell_link(base: &str, suffix: &str, with_id_list: bool) -> Vec<u8> {
        let mut flags = HAS_LINK_INFO;
        if with_id_list {
            flags |= HAS_LINK_TARGET_ID_LIST;
        }

        let mut out = Vec::new();
        out.extend_from_slice(&HEADER_SIZE.to_le_bytes());
        out.extend_from_slice(&LINK_CLSID);
        out.extend_from_slice(&flags.to_le_bytes());
        out.resize(HEADER_SIZE as usize, 0);

        if with_id_list {
            out.extend_from_slice(&4u16.to_le_bytes());
            out.extend_from_slice(&[0xAA; 4]);
        }

        let volume_id = [0u8; 16];
        let header_len = 0x1Cu32;
        let volume_offset = header_len;
        let base_offset = volume_offset + volume_id.len() as u32;
        let suffix_offset = base_offset + base.len() as u32 + 1;
        let size = suffix_offset + suffix.len() as u32 + 1;

        for value in [
            size,
            header_len,
            VOLUME_ID_AND_LOCAL_BASE_PATH,
            volume_offset,
            base_offset,
            0,
            suffix_offset,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&volume_id);
        out.extend_from_slice(base.as_bytes());
        out.push(0);
        out.extend_from_slice(suffix.as_bytes());
        out.push(0);
        out
    }

    #[test]
    fn extracts_local_target() {
        let data = shell_link("C:\\Users\\me\\", "target.txt", false);
        assert_eq!(
            resolve_shortcut(&data).unwrap(),
            PathBuf::from("C:\\Users\\me\\target.txt")
        );
    }

    #[test]
    fn skips_id_list() {
        let data = shell_link("/srv/", "data.bin", true);
        assert_eq!(resolve_shortcut(&data).unwrap(), PathBuf::from("/srv/data.bin"));
    }

    #[test]
    fn rejects_other_files() {
        assert!(matches!(
            resolve_shortcut(b"plain text, nothing to see"),
            Err(ShortcutError::NotAShortcut)
        ));
    }

    #[test]
    fn truncated_link_info() {
        let data = shell_link("C:\\", "x", false);
        assert!(matches!(
            resolve_shortcut(&data[..data.len() - 4]),
            Err(ShortcutError::Malformed(_))
        ));
    }

    #[test]
    fn detection_by_extension() {
        assert!(is_shortcut(Path::new("Desktop/App.LNK")));
        assert!(!is_shortcut(Path::new("Desktop/App.exe")));
    }

    #[test]
    fn urls() {
        assert_eq!(file_url(Path::new("/a b/c.txt")), "file:///a%20b/c.txt");
        assert_eq!(file_url(Path::new("C:\\x\\y.txt")), "file:///C:/x/y.txt");
    }

    #[test]
    fn url_escaping() {
        assert_eq!(
            file_url(Path::new("C:\\Users\\José\\50% #1.txt")),
            "file:///C:/Users/Jos%C3%A9/50%25%20%231.txt"
        );
        assert_eq!(file_url(Path::new("C:\\a?b\\c.txt")), "file:///C:/a%3Fb/c.txt");
    }

    #[cfg(unix)]
    #[test]
    fn url_escaping_native() {
        assert_eq!(
            file_url(Path::new("/tmp/Ünï cödé/100%.txt")),
            "file:///tmp/%C3%9Cn%C3%AF%20c%C3%B6d%C3%A9/100%25.txt"
        );
    }
}
