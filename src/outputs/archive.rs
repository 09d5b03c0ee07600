//! Gzipped copies of downloaded page HTML.

use crate::error::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;

fn gzip(html: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(html.len() / 4), Compression::default());
    encoder.write_all(html.as_bytes())?;
    encoder.finish()
}

/// Write `html` gzip-compressed to `path`. Compression runs on the blocking
/// pool.
pub async fn write_gzip_html(path: &Path, html: String) -> Result<()> {
    let compressed = tokio::task::spawn_blocking(move || gzip(&html)).await??;
    tokio::fs::write(path, compressed).await?;
    Ok(())
}
