use std::path::{Path, PathBuf};

use asar_vfs::{ArchiveIndex, Integrity, ServeOptions};

use crate::cli::ServeFlags;
use crate::error::{Error, Result};

/// Build and load an archive's index off the async runtime.
pub async fn open_index(archive: &Path) -> Result<ArchiveIndex> {
    let path = archive.to_path_buf();
    tokio::task::spawn_blocking(move || {
        ArchiveIndex::open(&path).map_err(|source| Error::OpenArchive { path, source })
    })
    .await?
}

impl ServeFlags {
    pub fn to_options(&self) -> ServeOptions {
        ServeOptions {
            archive_suffix: self.suffix.clone(),
            verify_integrity: !self.no_verify,
            resolve_shortcuts: self.shortcuts,
            decompress_gzip_variants: !self.no_decompress,
        }
    }
}

/// Join an entry path onto a directory using the platform separator.
pub fn entry_to_path(root: &Path, entry: &str) -> PathBuf {
    entry.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Format file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    use humansize::{BINARY, FormatSize};
    bytes.format_size(BINARY)
}

/// Short flag column: `u` unpacked, `x` executable, `i` has integrity.
pub fn format_flags(unpacked: bool, executable: bool, integrity: Option<&Integrity>) -> String {
    let mut flags = String::with_capacity(3);
    flags.push(if unpacked { 'u' } else { '-' });
    flags.push(if executable { 'x' } else { '-' });
    flags.push(if integrity.is_some() { 'i' } else { '-' });
    flags
}

/// Abbreviate a hex digest for tabular output.
pub fn format_digest(digest: &[u8], chars: usize) -> String {
    let mut hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex.truncate(chars);
    hex
}
