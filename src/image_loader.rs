use bytes::Bytes;
use image::{DynamicImage, ImageFormat, ImageReader};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("Failed to open image: {0}")]
    Open(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub png: Bytes,
}

impl LoadedImage {
    fn from_image(image: &DynamicImage) -> Result<Self, ImageLoadError> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(Self {
            width: image.width(),
            height: image.height(),
            png: Bytes::from(buf),
        })
    }
}

struct CacheEntry {
    stamp: FileStamp,
    image: Arc<LoadedImage>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok()?,
            len: metadata.len(),
        })
    }
}

/// Memoised image loads. An entry is reused only while the file on disk keeps
/// the modification time and length it had when it was decoded. Callers that
/// know a file was rewritten in place call `invalidate` first.
#[derive(Default)]
pub struct ImageLoader {
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when the file is missing or cannot be decoded.
    /// Blocking: decodes and re-encodes the whole image.
    pub fn load(&self, path: &Path) -> Option<Arc<LoadedImage>> {
        let stamp = FileStamp::of(path);

        if let (Some(stamp), Some(entry)) = (stamp, self.cache.lock().get(path)) {
            if entry.stamp == stamp {
                return Some(entry.image.clone());
            }
        }

        match decode(path) {
            Ok(image) => {
                let image = Arc::new(image);
                match stamp {
                    Some(stamp) => {
                        self.cache.lock().insert(
                            path.to_path_buf(),
                            CacheEntry {
                                stamp,
                                image: image.clone(),
                            },
                        );
                    }
                    None => {
                        self.cache.lock().remove(path);
                    }
                }
                Some(image)
            }
            Err(e) => {
                tracing::warn!("Could not load image {}: {}", path.display(), e);
                self.cache.lock().remove(path);
                None
            }
        }
    }

    pub fn invalidate(&self, path: &Path) {
        self.cache.lock().remove(path);
    }
}

fn decode(path: &Path) -> Result<LoadedImage, ImageLoadError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    LoadedImage::from_image(&image)
}
