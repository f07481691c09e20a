use std::{borrow::Borrow, fmt};

mod error;
mod resolver;

pub use self::error::IntoEntryPathError;
pub use self::resolver::{ARCHIVE_SUFFIX, Location, PathResolver};

/// The separator used inside archive entry paths, regardless of platform.
pub const PATH_ENTRY_SEP: char = '/';

/// Replace alternate separator styles with [`PATH_ENTRY_SEP`].
#[inline]
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// A normalized path relative to an archive root.
///
/// Components are joined with `/`; there are no empty, `.` or `..`
/// components and no leading or trailing separator.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EntryPath(String);

pub fn sanitize(path: &str) -> Result<Vec<&str>, IntoEntryPathError> {
    let mut out = vec![];

    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                out.pop().ok_or(IntoEntryPathError::EscapesRoot)?;
            }
            c if c.chars().any(|ch| ch.is_control()) => {
                return Err(IntoEntryPathError::UnrepresentableStr);
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

impl EntryPath {
    pub fn new(path: &str) -> Result<EntryPath, IntoEntryPathError> {
        let out = sanitize(path)?;

        if out.is_empty() {
            return Err(IntoEntryPathError::EmptyPath);
        }

        Ok(EntryPath(out.join("/")))
    }

    /// Append a single already-validated component.
    pub(crate) fn join_component(parent: Option<&EntryPath>, name: &str) -> EntryPath {
        match parent {
            Some(parent) => {
                let mut s = String::with_capacity(parent.0.len() + 1 + name.len());
                s.push_str(&parent.0);
                s.push(PATH_ENTRY_SEP);
                s.push_str(name);
                EntryPath(s)
            }
            None => EntryPath(name.to_string()),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        self.0
            .rsplit(PATH_ENTRY_SEP)
            .next()
            .unwrap_or(self.0.as_str())
    }

    /// The file extension of the last component, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&name[pos + 1..]),
        }
    }

    pub fn iter(&self) -> std::str::Split<'_, char> {
        self.0.split(PATH_ENTRY_SEP)
    }

    /// Convert to a platform path relative to some root.
    pub fn to_relative_path(&self) -> std::path::PathBuf {
        self.iter().collect()
    }
}

impl Borrow<str> for EntryPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitisation() {
        let path = EntryPath::new("/something/../somethingelse/./foo.txt").unwrap();
        assert_eq!(path.as_str(), "somethingelse/foo.txt");

        let path = EntryPath::new(r"something\..\somethingelse\.\foo.txt\.").unwrap();
        assert_eq!(path.as_str(), "somethingelse/foo.txt");
    }

    #[test]
    fn escaping_the_root() {
        assert_eq!(
            EntryPath::new("../foo.txt"),
            Err(IntoEntryPathError::EscapesRoot)
        );
    }

    #[test]
    fn empty() {
        assert_eq!(EntryPath::new(""), Err(IntoEntryPathError::EmptyPath));
        assert_eq!(EntryPath::new("/"), Err(IntoEntryPathError::EmptyPath));
        assert_eq!(EntryPath::new("a/.."), Err(IntoEntryPathError::EmptyPath));
    }

    #[test]
    fn control_characters() {
        assert_eq!(
            EntryPath::new("a/\0b"),
            Err(IntoEntryPathError::UnrepresentableStr)
        );
    }

    #[test]
    fn collapsed_separators() {
        let path = EntryPath::new("/cant/hate//the/path").unwrap();
        assert_eq!(path.as_str(), "cant/hate/the/path");
    }

    #[test]
    fn names() {
        let path = EntryPath::new("sub/image.svgz").unwrap();
        assert_eq!(path.file_name(), "image.svgz");
        assert_eq!(path.extension(), Some("svgz"));

        let path = EntryPath::new(".hidden").unwrap();
        assert_eq!(path.extension(), None);
    }
}
