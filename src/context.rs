//! Process-scoped serving configuration and blocking resolution.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::{Resolution, ResolvedTarget};
use crate::error::{ArchiveError, JobError};
use crate::mime::{DefaultMimeSniffer, MimeSniffer};
use crate::path::{ARCHIVE_SUFFIX, Location, PathResolver};
use crate::registry::ArchiveRegistry;
use crate::shortcut;

/// Options controlling how virtual files are served.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Path component suffix identifying an archive container.
    pub archive_suffix: String,
    /// Check entry content against its recorded block digests while streaming.
    pub verify_integrity: bool,
    /// Answer requests for shell link files with a redirect to their target.
    pub resolve_shortcuts: bool,
    /// Decode gzip-compressed variants (such as `.svgz`) on the fly.
    pub decompress_gzip_variants: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        ServeOptions {
            archive_suffix: ARCHIVE_SUFFIX.to_string(),
            verify_integrity: true,
            resolve_shortcuts: cfg!(windows),
            decompress_gzip_variants: true,
        }
    }
}

/// Shared state handed to every job: the archive registry, the path
/// resolver, the MIME collaborator and the serving options.
pub struct ServeContext {
    registry: Arc<ArchiveRegistry>,
    resolver: PathResolver,
    sniffer: Box<dyn MimeSniffer>,
    options: ServeOptions,
}

impl Default for ServeContext {
    fn default() -> Self {
        ServeContext::new(ServeOptions::default())
    }
}

impl ServeContext {
    pub fn new(options: ServeOptions) -> ServeContext {
        ServeContext::with_registry(Arc::new(ArchiveRegistry::new()), options)
    }

    /// Share an existing registry between contexts.
    pub fn with_registry(registry: Arc<ArchiveRegistry>, options: ServeOptions) -> ServeContext {
        ServeContext {
            registry,
            resolver: PathResolver::new(options.archive_suffix.clone()),
            sniffer: Box::new(DefaultMimeSniffer),
            options,
        }
    }

    /// Replace the MIME collaborator.
    pub fn with_mime_sniffer(mut self, sniffer: impl MimeSniffer + 'static) -> ServeContext {
        self.sniffer = Box::new(sniffer);
        self
    }

    #[inline]
    pub fn registry(&self) -> &Arc<ArchiveRegistry> {
        &self.registry
    }

    #[inline]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    #[inline]
    pub fn options(&self) -> &ServeOptions {
        &self.options
    }

    /// Resolve a request path to something that can be opened.
    ///
    /// This probes the filesystem, may build an archive index and may sniff
    /// file contents, so it must not run on a task driving I/O.
    pub fn resolve(&self, path: &Path) -> Result<Resolution, JobError> {
        let location = self
            .resolver
            .classify(path)
            .ok_or_else(|| JobError::NotFound(path.to_path_buf()))?;

        let (archive_path, entry_path) = match location {
            Location::Plain(plain) => return self.resolve_plain(plain),
            Location::Archive {
                archive_path,
                entry_path,
            } => (archive_path, entry_path),
        };

        match std::fs::metadata(&archive_path) {
            Ok(meta) if meta.is_dir() => {
                tracing::debug!(
                    path = %archive_path.display(),
                    "archive candidate is a directory, serving as plain file"
                );
                return self.resolve_plain(archive_path.join(entry_path.to_relative_path()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(JobError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ArchiveError::Open(e, archive_path).into()),
        }

        let index = self.registry.get_or_build(&archive_path)?;
        let record = index
            .lookup(&entry_path)
            .cloned()
            .ok_or_else(|| JobError::NotFound(path.to_path_buf()))?;
        let mime_type = self.sniffer.mime_for_name(entry_path.file_name());

        Ok(Resolution {
            target: ResolvedTarget::ArchiveEntry {
                index,
                record,
                entry: entry_path,
            },
            mime_type,
            redirect: None,
        })
    }

    fn resolve_plain(&self, path: PathBuf) -> Result<Resolution, JobError> {
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(JobError::NotFound(path)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "plain file not found");
                return Err(JobError::NotFound(path));
            }
        }

        if self.options.resolve_shortcuts && shortcut::is_shortcut(&path) {
            match std::fs::read(&path)
                .map_err(shortcut::ShortcutError::from)
                .and_then(|data| shortcut::resolve_shortcut(&data))
            {
                Ok(target) => {
                    return Ok(Resolution {
                        target: ResolvedTarget::PlainFile(path),
                        mime_type: None,
                        redirect: Some(target),
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unresolvable shortcut");
                }
            }
        }

        let mime_type = self.sniffer.sniff_file(&path);
        Ok(Resolution {
            target: ResolvedTarget::PlainFile(path),
            mime_type,
            redirect: None,
        })
    }
}

impl std::fmt::Debug for ServeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeContext")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
