use crate::config::StorageConfig;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::instrument;

const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpeg", "jpg"];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Unsupported file type `{0}`, expected one of png, jpeg, jpg")]
    UnsupportedFileType(String),
    #[error("Failed to persist upload to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub original_name: String,
    pub content_type: Option<String>,
    pub size: usize,
}

/// Single-slot store: every upload lands on the same path and replaces the
/// previous one.
#[derive(Debug)]
pub struct UploadStore {
    upload_dir: PathBuf,
    upload_path: PathBuf,
    last_upload: RwLock<Option<UploadRecord>>,
}

impl UploadStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            upload_path: config.get_upload_path(),
            last_upload: RwLock::new(None),
        }
    }

    pub fn upload_path(&self) -> &Path {
        &self.upload_path
    }

    pub fn last_upload(&self) -> Option<UploadRecord> {
        self.last_upload.read().clone()
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn save(
        &self,
        original_name: &str,
        content_type: Option<String>,
        data: &[u8],
    ) -> Result<UploadRecord, StorageError> {
        check_extension(original_name)?;

        if let Err(source) = fs::create_dir_all(&self.upload_dir).await {
            *self.last_upload.write() = None;
            return Err(StorageError::Io {
                path: self.upload_dir.clone(),
                source,
            });
        }

        // A failed write may leave the previous upload truncated.
        if let Err(source) = fs::write(&self.upload_path, data).await {
            *self.last_upload.write() = None;
            return Err(StorageError::Io {
                path: self.upload_path.clone(),
                source,
            });
        }

        let record = UploadRecord {
            original_name: original_name.to_string(),
            content_type,
            size: data.len(),
        };
        *self.last_upload.write() = Some(record.clone());

        tracing::info!(
            "Saved upload `{}` to {}",
            original_name,
            self.upload_path.display()
        );

        Ok(record)
    }

    pub async fn read(&self) -> Option<Vec<u8>> {
        self.last_upload()?;
        fs::read(&self.upload_path).await.ok()
    }
}

fn check_extension(name: &str) -> Result<(), StorageError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    if ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(StorageError::UnsupportedFileType(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> UploadStore {
        UploadStore::new(&StorageConfig {
            upload_dir: dir.join("uploaded_images"),
            upload_filename: "image_to_predict.png".to_string(),
        })
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_keeps_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        let data = vec![0x89, b'P', b'N', b'G', 1, 2, 3];

        let record = store.save("sign.png", None, &data).await.unwrap();

        assert_eq!(record.size, data.len());
        assert_eq!(
            store.upload_path(),
            tmp.path().join("uploaded_images/image_to_predict.png")
        );
        assert_eq!(std::fs::read(store.upload_path()).unwrap(), data);
        assert_eq!(store.last_upload(), Some(record));
    }

    #[tokio::test]
    async fn test_second_upload_overwrites_first() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        store
            .save("first.jpg", None, b"a much longer first payload")
            .await
            .unwrap();
        store.save("second.JPEG", None, b"short").await.unwrap();

        let entries = std::fs::read_dir(tmp.path().join("uploaded_images"))
            .unwrap()
            .count();
        assert_eq!(entries, 1);
        assert_eq!(std::fs::read(store.upload_path()).unwrap(), b"short");
        assert_eq!(store.last_upload().unwrap().original_name, "second.JPEG");
    }

    #[tokio::test]
    async fn test_rejects_unaccepted_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        let result = store.save("notes.gif", None, b"GIF89a").await;

        assert!(matches!(result, Err(StorageError::UnsupportedFileType(ext)) if ext == "gif"));
        assert!(!store.upload_path().exists());
        assert!(store.last_upload().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_forgets_previous_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());
        store.save("first.png", None, b"first").await.unwrap();

        std::fs::remove_file(store.upload_path()).unwrap();
        std::fs::create_dir(store.upload_path()).unwrap();
        let result = store.save("second.png", None, b"second").await;

        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert!(store.last_upload().is_none());
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn test_read_without_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(tmp.path());

        assert!(store.read().await.is_none());
    }
}
