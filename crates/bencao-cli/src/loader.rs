//! Document source for publishing.
//!
//! Every file under the source directory with a matching extension becomes
//! one document. No chunking happens here.

use async_walkdir::WalkDir;
use bencao_core::{Error, Result};
use bencao_vector::Document;
use futures::StreamExt;
use std::path::Path;

/// Load all matching files under `source_dir`, ordered by relative path.
///
/// Each document carries `source` (path relative to `source_dir`) and
/// `file_name` metadata. Blank and non-UTF-8 files are skipped. Extensions
/// are compared case-insensitively and given without the dot.
pub async fn load_documents(source_dir: &Path, extensions: &[String]) -> Result<Vec<Document>> {
    if !source_dir.is_dir() {
        return Err(Error::not_found(format!(
            "document source {} is not a directory",
            source_dir.display()
        )));
    }

    let mut documents = Vec::new();
    let mut walker = WalkDir::new(source_dir);
    while let Some(entry) = walker.next().await {
        let entry = entry.map_err(|e| {
            Error::operation(format!("Failed to walk {}: {e}", source_dir.display()))
        })?;
        let path = entry.path();
        if !path.is_file() || !has_extension(&path, extensions) {
            continue;
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!("Skipping non UTF-8 file {}", path.display());
                continue;
            }
            Err(e) => return Err(Error::io_with_path(e, &path)),
        };
        if content.trim().is_empty() {
            tracing::debug!("Skipping blank file {}", path.display());
            continue;
        }

        let relative = path.strip_prefix(source_dir).unwrap_or(&path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        documents.push(
            Document::new(content)
                .with_metadata("source", relative.to_string_lossy())
                .with_metadata("file_name", file_name),
        );
    }

    documents.sort_by(|a, b| a.source().cmp(&b.source()));
    tracing::info!(
        "Loaded {} documents from {}",
        documents.len(),
        source_dir.display()
    );
    Ok(documents)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}
