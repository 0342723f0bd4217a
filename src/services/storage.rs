//! File storage buckets
//!
//! Each bucket is a directory under the configured storage root. Stored
//! files are renamed to `<uuid>.<ext>` so uploads never collide and names
//! carry nothing the uploader chose beyond the extension.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use uuid::Uuid;

/// Most entries returned by [`StorageService::list`]
pub const LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    BookCovers,
    BookPdfs,
    EventImages,
    ActivityFiles,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::BookCovers,
        Bucket::BookPdfs,
        Bucket::EventImages,
        Bucket::ActivityFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::BookCovers => "book_covers",
            Bucket::BookPdfs => "book_pdfs",
            Bucket::EventImages => "event_images",
            Bucket::ActivityFiles => "activity_files",
        }
    }

    /// Readable without a session
    pub fn is_public(&self) -> bool {
        matches!(self, Bucket::BookCovers | Bucket::EventImages)
    }

    /// Readers (not only staff) may upload here
    pub fn accepts_reader_uploads(&self) -> bool {
        matches!(self, Bucket::ActivityFiles)
    }

    pub fn accepts(&self, content_type: &str) -> bool {
        let content_type = content_type.to_ascii_lowercase();
        match self {
            Bucket::BookCovers | Bucket::EventImages => content_type.starts_with("image/"),
            Bucket::BookPdfs => content_type == "application/pdf",
            Bucket::ActivityFiles => true,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| format!("Unknown bucket: {}", s))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File too large. Maximum size: {0} bytes")]
    TooLarge(u64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A stored file as reported after upload
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// A directory entry of a bucket
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub name: String,
    pub url: String,
    pub size: u64,
}

pub struct StorageService {
    root: PathBuf,
    max_file_size: u64,
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Create the bucket directories
    pub async fn init(&self) -> anyhow::Result<()> {
        for bucket in Bucket::ALL {
            let dir = self.bucket_dir(bucket);
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create bucket directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub async fn upload(
        &self,
        bucket: Bucket,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile, StorageError> {
        if data.is_empty() {
            return Err(StorageError::ValidationError("File is empty".to_string()));
        }
        if data.len() as u64 > self.max_file_size {
            return Err(StorageError::TooLarge(self.max_file_size));
        }
        if !bucket.accepts(content_type) {
            return Err(StorageError::ValidationError(format!(
                "Invalid file type for {}: {}",
                bucket, content_type
            )));
        }

        let name = format!("{}.{}", Uuid::new_v4(), extension(original_name, content_type));
        let dir = self.bucket_dir(bucket);
        fs::create_dir_all(&dir)
            .await
            .context("Failed to create bucket directory")?;
        fs::write(dir.join(&name), data)
            .await
            .with_context(|| format!("Failed to write {}/{}", bucket, name))?;

        tracing::info!("Stored {} bytes as {}/{}", data.len(), bucket, name);
        Ok(StoredFile {
            url: object_url(bucket, &name),
            name,
            size: data.len() as u64,
            content_type: content_type.to_string(),
        })
    }

    /// File bytes and the content type implied by the extension
    pub async fn read(&self, bucket: Bucket, name: &str) -> Result<(Vec<u8>, &'static str), StorageError> {
        let path = self.object_path(bucket, name)?;
        match fs::read(&path).await {
            Ok(data) => Ok((data, content_type_for(name))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{}/{}", bucket, name)))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}/{}", bucket, name))
                .into()),
        }
    }

    /// First [`LIST_LIMIT`] files of a bucket by name
    pub async fn list(&self, bucket: Bucket) -> Result<Vec<StoredObject>, StorageError> {
        let dir = self.bucket_dir(bucket);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to read bucket").into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("Failed to read bucket entry")? {
            let metadata = entry.metadata().await.context("Failed to read file metadata")?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            objects.push(StoredObject {
                url: object_url(bucket, &name),
                name,
                size: metadata.len(),
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        objects.truncate(LIST_LIMIT);
        Ok(objects)
    }

    pub async fn remove(&self, bucket: Bucket, name: &str) -> Result<(), StorageError> {
        let path = self.object_path(bucket, name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Removed {}/{}", bucket, name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{}/{}", bucket, name)))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to remove {}/{}", bucket, name))
                .into()),
        }
    }

    fn bucket_dir(&self, bucket: Bucket) -> PathBuf {
        self.root.join(bucket.as_str())
    }

    fn object_path(&self, bucket: Bucket, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.bucket_dir(bucket).join(Path::new(name)))
    }
}

/// Public URL of a stored object
pub fn object_url(bucket: Bucket, name: &str) -> String {
    format!("/api/v1/storage/{}/{}", bucket, name)
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StorageError::ValidationError(format!("Invalid file name: {}", name)));
    }
    Ok(())
}

/// Extension from the uploaded name, else from the content type
fn extension(original_name: &str, content_type: &str) -> String {
    if let Some((_, ext)) = original_name.rsplit_once('.') {
        if !ext.is_empty() && ext.len() < 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return ext.to_ascii_lowercase();
        }
    }

    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    }
    .to_string()
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
