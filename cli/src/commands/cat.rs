use std::sync::Arc;

use asar_vfs::{ServeContext, stream_to};
use tokio::io::AsyncWriteExt;

use crate::cli::CatArgs;
use crate::error::{Error, Result};

pub async fn run(args: CatArgs) -> Result<()> {
    let context = Arc::new(ServeContext::new(args.serve.to_options()));
    let mut stdout = tokio::io::stdout();

    let info = stream_to(context, &args.path, args.range.as_deref(), &mut stdout)
        .await
        .map_err(|source| Error::Serve {
            path: args.path.clone(),
            source,
        })?;
    stdout.flush().await?;

    tracing::debug!(status = info.status, length = info.content_length, "served");
    if args.include_headers {
        eprintln!("Status: {}", info.status);
        for (name, value) in &info.headers {
            eprintln!("{}: {}", name, value);
        }
    }
    Ok(())
}
