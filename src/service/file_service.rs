use crate::prelude::*;
use serde::Serialize;
use std::path::Path;
use tokio::{
    fs::{create_dir_all, rename, File},
    io::{AsyncWriteExt, BufWriter},
};

/// Writes `value` as UTF-8 JSON with non-ASCII text left unescaped, through a
/// sibling temp file renamed over `path`.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).await?;
        }
    }

    let json = serde_json::to_string(value)?;
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");

    let mut file = BufWriter::new(File::create(&tmp_path).await?);
    file.write_all(json.as_bytes()).await?;
    file.flush().await?;
    file.into_inner().sync_all().await?;
    rename(&tmp_path, path).await?;

    tracing::info!("Wrote {} ({} bytes)", path.display(), json.len());
    Ok(())
}
