use asar_vfs::EntryPath;

use crate::cli::InfoArgs;
use crate::error::{Error, Result};
use crate::util::{format_digest, format_size, open_index};

pub async fn run(args: InfoArgs) -> Result<()> {
    let index = open_index(&args.archive).await?;

    // If an entry path is provided, show info for that entry
    if let Some(file) = args.file {
        let entry = EntryPath::new(&file).map_err(|_| Error::InvalidPath(file.clone()))?;
        let record = index
            .lookup(&entry)
            .ok_or_else(|| Error::FileNotFound(file.clone()))?;

        println!("Path:       {}", entry);
        if let Some((_, target)) = index.links().find(|(path, _)| **path == entry) {
            println!("Link to:    {}", target);
        }
        println!("Size:       {} ({} bytes)", format_size(record.size), record.size);
        if record.unpacked {
            println!("Location:   {}", index.unpacked_path(&entry).display());
        } else {
            println!("Offset:     {}", record.offset);
        }
        println!("Executable: {}", if record.executable { "yes" } else { "no" });

        match &record.integrity {
            Some(integrity) => {
                println!("Integrity:  {}", integrity.algorithm);
                println!("  Hash:       {}", format_digest(&integrity.hash, usize::MAX));
                println!(
                    "  Blocks:     {} x {}",
                    integrity.blocks.len(),
                    format_size(integrity.block_size as u64)
                );
            }
            None => println!("Integrity:  none"),
        }
        return Ok(());
    }

    let total: u64 = index.iter().map(|(_, r)| r.size).sum();
    let unpacked = index.iter().filter(|(_, r)| r.unpacked).count();
    let with_integrity = index.iter().filter(|(_, r)| r.integrity.is_some()).count();

    println!("Archive:        {}", index.container_path().display());
    println!(
        "Container size: {} ({} bytes)",
        format_size(index.container_len()),
        index.container_len()
    );
    println!("Header size:    {} bytes", index.header_size());
    println!("Content offset: {}", index.content_offset());
    println!("Files:          {}", index.len());
    println!("Links:          {}", index.links().count());
    println!("Unpacked:       {}", unpacked);
    println!("With integrity: {}", with_integrity);
    println!("Total size:     {}", format_size(total));
    Ok(())
}
