use std::path::{Path, PathBuf};

use super::{EntryPath, PATH_ENTRY_SEP, normalize_separators};

/// Default suffix identifying an archive container in a path.
pub const ARCHIVE_SUFFIX: &str = ".asar";

/// Where a filesystem-style path points, decided from the string alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// The path passes through an archive container.
    Archive {
        archive_path: PathBuf,
        entry_path: EntryPath,
    },
    /// No archive ancestor; the whole path is an ordinary file path.
    Plain(PathBuf),
}

/// Splits paths into "archive + entry" or "plain file" without touching disk.
#[derive(Debug, Clone)]
pub struct PathResolver {
    suffix: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        PathResolver::new(ARCHIVE_SUFFIX)
    }
}

impl PathResolver {
    pub fn new(suffix: impl Into<String>) -> PathResolver {
        PathResolver {
            suffix: suffix.into(),
        }
    }

    #[inline]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Does this single path component name an archive container?
    #[inline]
    pub fn is_archive_name(&self, component: &str) -> bool {
        component.len() > self.suffix.len() && component.ends_with(&self.suffix)
    }

    /// Classify `full_path`.
    ///
    /// Components are scanned from the root; the first one ending in the
    /// archive suffix splits the path. Returns `None` for paths that cannot
    /// name anything: non-UTF-8 input, or an entry part that climbs out of
    /// the archive with `..`.
    ///
    /// A path naming the container itself, with nothing below it, is plain.
    pub fn classify(&self, full_path: &Path) -> Option<Location> {
        let raw = full_path.to_str()?;
        if raw.is_empty() {
            return None;
        }
        let normalized = normalize_separators(raw);

        let mut start = 0;
        let mut archive_end = None;
        for component in normalized.split(PATH_ENTRY_SEP) {
            let end = start + component.len();
            if self.is_archive_name(component) {
                archive_end = Some(end);
                break;
            }
            start = end + 1;
        }

        let Some(end) = archive_end else {
            return Some(Location::Plain(PathBuf::from(normalized)));
        };

        let tail = normalized[end..].trim_start_matches(PATH_ENTRY_SEP);
        if tail.is_empty() {
            return Some(Location::Plain(PathBuf::from(&normalized[..end])));
        }

        let entry_path = EntryPath::new(tail).ok()?;
        Some(Location::Archive {
            archive_path: PathBuf::from(&normalized[..end]),
            entry_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(archive: &str, entry: &str) -> Option<Location> {
        Some(Location::Archive {
            archive_path: PathBuf::from(archive),
            entry_path: EntryPath::new(entry).unwrap(),
        })
    }

    #[test]
    fn splits_at_archive() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new("/app/resources/app.asar/sub/file.txt")),
            archive("/app/resources/app.asar", "sub/file.txt")
        );
    }

    #[test]
    fn plain_path() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new("/var/www/index.html")),
            Some(Location::Plain(PathBuf::from("/var/www/index.html")))
        );
    }

    #[test]
    fn shallowest_archive_wins() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new("/a/outer.asar/inner.asar/file.js")),
            archive("/a/outer.asar", "inner.asar/file.js")
        );
    }

    #[test]
    fn alternate_separators() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new(r"C:\app\app.asar\sub\file.txt")),
            archive("C:/app/app.asar", "sub/file.txt")
        );
    }

    #[test]
    fn archive_itself_is_plain() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new("/app/app.asar")),
            Some(Location::Plain(PathBuf::from("/app/app.asar")))
        );
        assert_eq!(
            resolver.classify(Path::new("/app/app.asar/")),
            Some(Location::Plain(PathBuf::from("/app/app.asar")))
        );
    }

    #[test]
    fn suffix_is_case_sensitive() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new("/app/app.ASAR/file")),
            Some(Location::Plain(PathBuf::from("/app/app.ASAR/file")))
        );
    }

    #[test]
    fn bare_suffix_is_not_an_archive() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new("/app/.asar/file")),
            Some(Location::Plain(PathBuf::from("/app/.asar/file")))
        );
    }

    #[test]
    fn escaping_entry_is_invalid() {
        let resolver = PathResolver::default();
        assert_eq!(
            resolver.classify(Path::new("/app/app.asar/../../etc/passwd")),
            None
        );
        assert_eq!(resolver.classify(Path::new("")), None);
    }

    #[test]
    fn custom_suffix() {
        let resolver = PathResolver::new(".pak");
        assert_eq!(
            resolver.classify(Path::new("data/game.pak/levels/1.json")),
            archive("data/game.pak", "levels/1.json")
        );
    }
}
