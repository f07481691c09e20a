use std::path::{Path, PathBuf};
use std::sync::Arc;

use asar_vfs::{EntryPath, ServeContext, stream_to};

use crate::cli::ExtractArgs;
use crate::error::{Error, Result};
use crate::util::{entry_to_path, format_size, open_index};

pub async fn run(args: ExtractArgs) -> Result<()> {
    let index = open_index(&args.archive).await?;
    let output = args.output.clone().unwrap_or_else(|| PathBuf::from("."));
    let context = Arc::new(ServeContext::new(args.serve.to_options()));

    // Entries are served by path, so the archive itself must carry the suffix.
    let archive_name = args
        .archive
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    if !context.resolver().is_archive_name(archive_name) {
        return Err(Error::InvalidPath(args.archive.display().to_string()));
    }

    let selected: Vec<EntryPath> = if args.files.is_empty() {
        index
            .iter()
            .map(|(path, _)| path.clone())
            .chain(index.links().map(|(path, _)| path.clone()))
            .collect()
    } else {
        args.files
            .iter()
            .map(|f| EntryPath::new(f).map_err(|_| Error::InvalidPath(f.clone())))
            .collect::<Result<_>>()?
    };

    let mut total = 0u64;
    for entry in &selected {
        let record = index
            .lookup(entry)
            .ok_or_else(|| Error::FileNotFound(entry.to_string()))?;

        let dest = entry_to_path(&output, entry.as_str());
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let source = args.archive.join(entry.to_relative_path());
        let mut file = tokio::fs::File::create(&dest)
            .await
            .map_err(|source| Error::WriteFile {
                path: dest.clone(),
                source,
            })?;
        let info = stream_to(Arc::clone(&context), &source, None, &mut file)
            .await
            .map_err(|e| Error::Serve {
                path: source.clone(),
                source: e,
            })?;

        if record.executable {
            set_executable(&dest).await?;
        }

        total += info.content_length;
        if !args.quiet {
            println!("{}", entry);
        }
    }

    if !args.quiet {
        println!(
            "Extracted {} files ({}) to {}",
            selected.len(),
            format_size(total),
            output.display()
        );
    }
    Ok(())
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    tokio::fs::set_permissions(path, perms)
        .await
        .map_err(|source| Error::WriteFile {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
