// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! On-disk storage layout and upload filename handling

use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::Result;

/// Process-wide storage layout, created once at startup
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub upload_dir: PathBuf,
    pub report_dir: PathBuf,
    pub progress_dir: PathBuf,
    pub static_root: PathBuf,
}

impl StorageLayout {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            report_dir: config.report_dir.clone(),
            progress_dir: config.progress_dir.clone(),
            static_root: config.static_root.clone(),
        }
    }

    /// Create all storage directories. Idempotent; call before serving.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.report_dir, &self.progress_dir] {
            std::fs::create_dir_all(dir)?;
        }
        info!("Storage layout ready: uploads={:?} reports={:?} progress={:?}",
            self.upload_dir, self.report_dir, self.progress_dir);
        Ok(())
    }

    /// Write uploaded bytes under the uploads directory
    pub async fn store_upload(&self, stored_name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.upload_dir.join(stored_name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Write uploaded bytes under the progress directory
    pub async fn store_progress(&self, stored_name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.progress_dir.join(stored_name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    /// Deterministic report path for a stored upload
    pub fn report_path(&self, stored_name: &str) -> PathBuf {
        self.report_dir.join(format!("{}.pdf", stored_name))
    }
}

/// Check whether a client-supplied filename carries an allowed extension.
/// Dotfile names like `.png` count: only the final extension matters.
pub fn allowed_file(filename: &str, allowed: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Sanitize a client-supplied filename for safe storage.
///
/// Strips any path components, keeps only alphanumerics, `_`, `-` and `.`,
/// collapses runs of underscores, and lowercases the extension.
pub fn sanitize_filename(raw: &str) -> String {
    // Drop everything up to the last path separator
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let mut clean: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while clean.contains("__") {
        clean = clean.replace("__", "_");
    }
    while clean.contains("_.") {
        clean = clean.replace("_.", ".");
    }
    let clean = clean.trim_matches('_').trim_matches('.');

    match clean.rsplit_once('.') {
        Some((stem, ext)) => format!("{}.{}", stem, ext.to_lowercase()),
        None => clean.to_string(),
    }
}

/// Produce a collision-resistant stored name for an upload.
///
/// Two concurrent uploads sharing an original name get distinct tokens, so
/// stored files never collide and existing files are never overwritten.
pub fn unique_filename(original: &str) -> String {
    format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(original))
}

/// Uploaded file persisted under its uniquified name
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub id: String,
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
}

impl UploadedAsset {
    pub fn new(original_name: &str, stored_name: String, path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_name: original_name.to_string(),
            stored_name,
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_disallowed_extensions() {
        let allowed = vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()];
        assert!(allowed_file("field.png", &allowed));
        assert!(allowed_file("field.JPG", &allowed));
        assert!(!allowed_file("notes.txt", &allowed));
        assert!(!allowed_file("no_extension", &allowed));
    }

    #[test]
    fn dotfile_extension_counts() {
        let allowed = vec!["png".to_string()];
        assert!(allowed_file(".png", &allowed));
        assert!(!allowed_file(".txt", &allowed));
    }

    #[test]
    fn sanitizes_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
    }

    #[test]
    fn sanitizes_unsafe_characters() {
        assert_eq!(sanitize_filename("my field photo!.PNG"), "my_field_photo.png");
        assert_eq!(sanitize_filename("a  b   c.jpg"), "a_b_c.jpg");
    }

    #[test]
    fn unique_names_never_collide() {
        let a = unique_filename("flood1.png");
        let b = unique_filename("flood1.png");
        assert_ne!(a, b);
        assert!(a.ends_with("_flood1.png"));
    }

    #[test]
    fn layout_ensure_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::StorageConfig {
            static_root: dir.path().to_path_buf(),
            upload_dir: dir.path().join("uploads"),
            report_dir: dir.path().join("reports"),
            progress_dir: dir.path().join("uploads_progress"),
            history_path: dir.path().join("history.jsonl"),
        };
        let layout = StorageLayout::new(&config);
        layout.ensure().unwrap();
        layout.ensure().unwrap();
        assert!(config.upload_dir.is_dir());
        assert!(config.report_dir.is_dir());
        assert!(config.progress_dir.is_dir());
    }

    #[tokio::test]
    async fn store_upload_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::StorageConfig {
            static_root: dir.path().to_path_buf(),
            upload_dir: dir.path().join("uploads"),
            report_dir: dir.path().join("reports"),
            progress_dir: dir.path().join("uploads_progress"),
            history_path: dir.path().join("history.jsonl"),
        };
        let layout = StorageLayout::new(&config);
        layout.ensure().unwrap();

        let path = layout.store_upload("abc_flood1.png", b"pngdata").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"pngdata");
    }
}
