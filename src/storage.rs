use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::entities::product_image::ImageExtension;

static UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

const MAX_STEM_LEN: usize = 40;

/// Blob store for product images, rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        ImageStore {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// `products/{product_id}/images/{stem}-{suffix}.{ext}` with the client's file stem
    /// reduced to `[A-Za-z0-9_-]`.
    pub fn image_path(&self, product_id: i32, file_name: &str, extension: ImageExtension) -> String {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let mut stem = UNSAFE_FILE_CHARS
            .replace_all(stem, "_")
            .trim_matches('_')
            .to_string();
        stem.truncate(MAX_STEM_LEN);
        if stem.is_empty() {
            stem.push_str("image");
        }
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "products/{product_id}/images/{stem}-{}.{extension}",
            &suffix[..8]
        )
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub async fn write(&self, relative: &str, bytes: &[u8]) -> io::Result<()> {
        let target = self.absolute(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(target, bytes).await
    }

    pub async fn remove(&self, relative: &str) -> io::Result<()> {
        match fs::remove_file(self.absolute(relative)).await {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
