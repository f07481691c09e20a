use asar_vfs::ArchiveIndex;
use serde::Serialize;

use crate::cli::ListArgs;
use crate::error::Result;
use crate::util::{format_digest, format_flags, format_size, open_index};

#[derive(Serialize)]
struct JsonEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    unpacked: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    executable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    integrity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

pub async fn run(args: ListArgs) -> Result<()> {
    let index = open_index(&args.archive).await?;

    if args.json {
        list_json(&index)
    } else if args.long {
        list_long(&index)
    } else {
        list_compact(&index)
    }
}

fn list_compact(index: &ArchiveIndex) -> Result<()> {
    println!("{:>12}  Path", "Size");
    println!("{}", "-".repeat(60));

    let mut total = 0u64;
    for (path, record) in index.iter() {
        println!("{:>12}  {}", format_size(record.size), path);
        total += record.size;
    }
    for (path, target) in index.links() {
        println!("{:>12}  {} -> {}", "-", path, target);
    }

    println!("{}", "-".repeat(60));
    println!("{:>12}  Total ({} files)", format_size(total), index.len());
    Ok(())
}

fn list_long(index: &ArchiveIndex) -> Result<()> {
    println!(
        "Archive: {} (header: {} bytes, content at {})",
        index.container_path().display(),
        index.header_size(),
        index.content_offset()
    );
    println!();
    println!(
        "{:5}  {:>12}  {:>12}  {:>16}  Path",
        "Flags", "Offset", "Size", "Integrity"
    );
    println!("{}", "-".repeat(80));

    for (path, record) in index.iter() {
        let offset = if record.unpacked {
            "-".to_string()
        } else {
            record.offset.to_string()
        };
        let digest = record
            .integrity
            .as_ref()
            .map(|i| format_digest(&i.hash, 16))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:5}  {:>12}  {:>12}  {:>16}  {}",
            format_flags(record.unpacked, record.executable, record.integrity.as_ref()),
            offset,
            record.size,
            digest,
            path
        );
    }
    for (path, target) in index.links() {
        println!(
            "{:5}  {:>12}  {:>12}  {:>16}  {} -> {}",
            "<lnk>", "-", "-", "-", path, target
        );
    }
    Ok(())
}

fn list_json(index: &ArchiveIndex) -> Result<()> {
    let files = index.iter().map(|(path, record)| JsonEntry {
        path: path.to_string(),
        entry_type: "file",
        size: Some(record.size),
        offset: (!record.unpacked).then_some(record.offset),
        unpacked: record.unpacked,
        executable: record.executable,
        integrity: record
            .integrity
            .as_ref()
            .map(|i| format!("{}:{}", i.algorithm, format_digest(&i.hash, usize::MAX))),
        target: None,
    });
    let links = index.links().map(|(path, target)| JsonEntry {
        path: path.to_string(),
        entry_type: "link",
        size: None,
        offset: None,
        unpacked: false,
        executable: false,
        integrity: None,
        target: Some(target.to_string()),
    });

    let entries: Vec<JsonEntry> = files.chain(links).collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
