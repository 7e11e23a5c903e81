//! # rr-storage-local
//!
//! Local filesystem implementation of `MediaStore`.
//! Features: content-addressable storage, per-kind folders, directory
//! sharding, and WebP thumbnails for image uploads.

use async_trait::async_trait;
use image::io::Reader as ImageReader;
use rr_core::traits::MediaStore;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const THUMBNAIL_EDGE: u32 = 250;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("invalid storage folder: {0}")]
    InvalidFolder(String),
}

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Generates a sharded key: "folder/ab/cd/abcd...hash.ext"
    fn sharded_key(folder: &str, hash: &str, ext: &str) -> String {
        format!("{}/{}/{}/{}.{}", folder, &hash[0..2], &hash[2..4], hash, ext)
    }

    /// Resolves a key to a path below the root, refusing anything that
    /// would escape it.
    fn resolve(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()).into());
        }
        Ok(self.root_path.join(relative))
    }

    fn thumbnail_path(path: &Path) -> Option<PathBuf> {
        let stem = path.file_stem()?.to_str()?;
        Some(path.with_file_name(format!("thumb_{}.webp", stem)))
    }

    /// Writes a `THUMBNAIL_EDGE`px WebP next to the original.
    async fn generate_thumbnail(&self, source_path: &Path) -> anyhow::Result<()> {
        let data = fs::read(source_path).await?;
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()?;

        let thumb = img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE);
        let thumb_path = Self::thumbnail_path(source_path)
            .ok_or_else(|| anyhow::anyhow!("no file name in {}", source_path.display()))?;
        thumb.save_with_format(thumb_path, image::ImageFormat::WebP)?;
        Ok(())
    }
}

/// Folder names are fixed by callers, but are still checked.
fn valid_folder(folder: &str) -> bool {
    !folder.is_empty()
        && folder
            .split('/')
            .all(|part| !part.is_empty() && part != ".." && part != ".")
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
}

/// Picks a file extension from the client filename, falling back to the
/// content type, then to `bin`.
pub fn extension_for(filename: Option<&str>, content_type: &str) -> String {
    let from_name = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }

    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "audio/mpeg" => "mp3",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/aac" => "aac",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/3gpp" | "video/3gpp" => "3gp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
    .to_string()
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    /// Saves an upload using its SHA-256 hash as the filename.
    /// This automatically deduplicates files.
    async fn save_upload(
        &self,
        folder: &str,
        data: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> anyhow::Result<String> {
        if !valid_folder(folder) {
            return Err(StorageError::InvalidFolder(folder.to_string()).into());
        }

        let mut hasher = Sha256::new();
        hasher.update(&data);
        let hash = format!("{:x}", hasher.finalize());

        let key = Self::sharded_key(folder, &hash, &extension_for(filename, content_type));
        let target_path = self.resolve(&key)?;
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if !fs::try_exists(&target_path).await? {
            fs::write(&target_path, &data).await?;

            if content_type.starts_with("image/") {
                if let Err(e) = self.generate_thumbnail(&target_path).await {
                    log::warn!("Thumbnail generation failed for {}: {:#}", key, e);
                }
            }
        }

        Ok(key)
    }

    fn get_url(&self, key: &str) -> String {
        format!("{}/{}", self.url_prefix, key)
    }

    fn get_thumbnail_url(&self, key: &str) -> Option<String> {
        let path = self.resolve(key).ok()?;
        let thumb = Self::thumbnail_path(&path)?;
        if !thumb.exists() {
            return None;
        }
        let name = thumb.file_name()?.to_str()?;
        let dir = key.rsplit_once('/').map(|(dir, _)| dir)?;
        Some(format!("{}/{}/{}", self.url_prefix, dir, name))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.resolve(key)?;
        for candidate in std::iter::once(path.clone()).chain(Self::thumbnail_path(&path)) {
            match fs::remove_file(&candidate).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
