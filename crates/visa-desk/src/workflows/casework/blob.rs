use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Opaque reference returned by the blob store; for the in-memory store it is the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobRef(pub String);

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("blob '{0}' not found")]
    NotFound(String),
    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

/// Document content storage collaborator.
pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<BlobRef, BlobError>;
    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError>;
    /// Removes the blob at `prefix_or_ref` or everything beneath it; returns how many went.
    fn delete(&self, prefix_or_ref: &str) -> Result<usize, BlobError>;
}

/// Strips accents and replaces whitespace runs with `_`.
pub fn sanitize_segment(value: &str) -> String {
    let stripped: String = value.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "_")
}

/// `{owner}/{visa}/{requirement}/v{version}_{stem}_{attempt}.{ext}`
///
/// `attempt` is unique per upload call, so two uploads racing for the same version number
/// never write to the same path.
pub fn document_path(
    owner: &str,
    visa_type: &str,
    requirement: &str,
    version: u32,
    attempt: &str,
    original_name: &str,
) -> String {
    let file = Path::new(original_name);
    let stem = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(original_name);
    let base = format!(
        "v{version}_{}_{}",
        sanitize_segment(stem),
        sanitize_segment(attempt)
    );
    let file_name = match file.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{base}.{}", sanitize_segment(ext).to_lowercase()),
        None => base,
    };

    format!(
        "{}/{}/{}/{}",
        sanitize_segment(owner),
        sanitize_segment(visa_type),
        sanitize_segment(requirement),
        file_name
    )
}

pub fn content_type(original_name: &str) -> String {
    mime_guess::from_path(original_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Process-local blob store keyed by path.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        match self.blobs.lock() {
            Ok(blobs) => blobs.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    fn with_blobs<T>(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> Result<T, BlobError>,
    ) -> Result<T, BlobError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| BlobError::Unavailable("blob store lock poisoned".to_string()))?;
        apply(&mut blobs)
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<BlobRef, BlobError> {
        self.with_blobs(|blobs| {
            blobs.insert(path.to_string(), bytes.to_vec());
            Ok(BlobRef(path.to_string()))
        })
    }

    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, BlobError> {
        self.with_blobs(|blobs| {
            blobs
                .get(&blob.0)
                .cloned()
                .ok_or_else(|| BlobError::NotFound(blob.0.clone()))
        })
    }

    fn delete(&self, prefix_or_ref: &str) -> Result<usize, BlobError> {
        self.with_blobs(|blobs| {
            let prefix = format!("{}/", prefix_or_ref.trim_end_matches('/'));
            let before = blobs.len();
            blobs.retain(|path, _| path != prefix_or_ref && !path.starts_with(&prefix));
            Ok(before - blobs.len())
        })
    }
}
