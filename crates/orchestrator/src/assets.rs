//! Asset storage
//!
//! Uploaded files are stored once under an identifier derived from the upload
//! time and the sanitized filename, and never modified afterwards.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use video_edit_common::{file_extension, Asset, AssetId, ProcessingError};

use crate::config::ServiceConfig;

/// Attempts at finding a free identifier when two uploads collide
const MAX_ID_ATTEMPTS: usize = 5;

/// Resolves asset identifiers to stored files
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn get(&self, id: &AssetId) -> Result<Asset, ProcessingError>;
}

/// Assets stored as plain files in one directory
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    max_bytes: u64,
    formats: Vec<String>,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64, formats: Vec<String>) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            formats: formats
                .into_iter()
                .map(|f| f.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Store rooted at the configured upload directory
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.upload_dir.clone(),
            config.max_upload_bytes(),
            config.supported_formats.clone(),
        )
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    #[must_use]
    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    /// Extension of `filename` if it is an accepted container format
    pub fn check_format(&self, filename: &str) -> Result<String, ProcessingError> {
        let ext = file_extension(Path::new(filename))
            .ok_or_else(|| ProcessingError::UnsupportedFormat(format!("{filename} has no extension")))?;
        if self.formats.iter().any(|f| *f == ext) {
            Ok(ext)
        } else {
            Err(ProcessingError::UnsupportedFormat(format!(
                "{ext} (supported: {})",
                self.formats.join(", ")
            )))
        }
    }

    pub fn check_size(&self, size: u64) -> Result<(), ProcessingError> {
        if size > self.max_bytes {
            return Err(ProcessingError::FileTooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Store uploaded bytes as a new asset
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<Asset, ProcessingError> {
        let format = self.check_format(filename)?;
        self.check_size(bytes.len() as u64)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let (id, path, mut file) = self.create_unique(filename).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        info!("Stored upload {} ({} bytes)", id, bytes.len());
        Ok(Asset {
            id,
            path,
            format,
            size_bytes: bytes.len() as u64,
        })
    }

    /// Copy an existing local file into the store
    pub async fn import(&self, source: &Path) -> Result<Asset, ProcessingError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProcessingError::AssetNotFound(source.display().to_string()))?;
        let format = self.check_format(filename)?;
        let size = tokio::fs::metadata(source)
            .await
            .map_err(|_| ProcessingError::AssetNotFound(source.display().to_string()))?
            .len();
        self.check_size(size)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let (id, path, file) = self.create_unique(filename).await?;
        drop(file);
        tokio::fs::copy(source, &path).await?;

        info!("Imported {} as {}", source.display(), id);
        Ok(Asset {
            id,
            path,
            format,
            size_bytes: size,
        })
    }

    /// Map an identifier to its file, refusing anything that is not a plain file name
    pub fn path_for(&self, id: &AssetId) -> Result<PathBuf, ProcessingError> {
        let raw = id.as_str();
        let is_plain = !raw.is_empty()
            && !raw.starts_with('.')
            && !raw.contains(['/', '\\'])
            && Path::new(raw).file_name().and_then(|n| n.to_str()) == Some(raw);
        if !is_plain {
            return Err(ProcessingError::AssetNotFound(raw.to_string()));
        }
        Ok(self.root.join(raw))
    }

    async fn create_unique(
        &self,
        filename: &str,
    ) -> Result<(AssetId, PathBuf, tokio::fs::File), ProcessingError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = AssetId::from_upload(filename, Utc::now());
            let path = self.root.join(id.as_str());
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((id, path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Asset id {} taken, retrying", id);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ProcessingError::Other(format!(
            "could not allocate an asset id for {filename}"
        )))
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn get(&self, id: &AssetId) -> Result<Asset, ProcessingError> {
        let path = self.path_for(id)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| ProcessingError::AssetNotFound(id.to_string()))?;
        if !meta.is_file() {
            return Err(ProcessingError::AssetNotFound(id.to_string()));
        }
        Ok(Asset {
            id: id.clone(),
            format: file_extension(&path).unwrap_or_default(),
            path,
            size_bytes: meta.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> LocalAssetStore {
        LocalAssetStore::new(
            dir,
            1024,
            vec!["mp4".to_string(), ".MOV".to_string()],
        )
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let asset = store.save("My Clip.MP4", b"video bytes").await.unwrap();
        assert!(asset.id.as_str().ends_with("_My_Clip.MP4"));
        assert_eq!(asset.format, "mp4");
        assert_eq!(asset.size_bytes, 11);

        let fetched = store.get(&asset.id).await.unwrap();
        assert_eq!(fetched.path, asset.path);
        assert_eq!(std::fs::read(&fetched.path).unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn test_same_name_uploads_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let a = store.save("clip.mp4", b"a").await.unwrap();
        let b = store.save("clip.mp4", b"b").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_rejects_format_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(matches!(
            store.save("notes.txt", b"x").await,
            Err(ProcessingError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            store.save("noext", b"x").await,
            Err(ProcessingError::UnsupportedFormat(_))
        ));
        assert!(store.check_format("clip.mov").is_ok());

        let big = vec![0u8; 2048];
        assert!(matches!(
            store.save("big.mp4", &big).await,
            Err(ProcessingError::FileTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_get_refuses_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path().join("uploads").as_path());
        std::fs::write(dir.path().join("secret.mp4"), b"x").unwrap();

        for id in ["../secret.mp4", "", "..", "a/b.mp4", "a\\b.mp4"] {
            assert!(matches!(
                store.get(&AssetId::from(id)).await,
                Err(ProcessingError::AssetNotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_import_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mp4");
        std::fs::write(&source, b"frames").unwrap();
        let store = store(&dir.path().join("store"));

        let asset = store.import(&source).await.unwrap();
        assert!(asset.path.starts_with(store.root()));
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"frames");
        assert!(source.exists());
    }
}
