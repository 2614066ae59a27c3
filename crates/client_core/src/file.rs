use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use shared::error::{EMPTY_FILE, FILE_TOO_LARGE, UNSUPPORTED_FORMAT};

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 3] = ["wav", "mp3", "mp4"];
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

#[derive(Debug, Clone)]
enum Source {
    Memory(Bytes),
    Disk(PathBuf),
}

/// A file the user picked. Files on disk are only sized up front; their
/// contents are read when the upload actually starts.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    size: u64,
    source: Source,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: Source::Memory(bytes),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("'{}' does not name a file", path.display()))?
            .to_string();
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to inspect '{}'", path.display()))?;
        if !metadata.is_file() {
            bail!("'{}' is not a regular file", path.display());
        }
        Ok(Self {
            name,
            size: metadata.len(),
            source: Source::Disk(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes, as reported when the file was selected.
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// In-memory contents are shared, not copied.
    pub async fn contents(&self) -> Result<Bytes> {
        match &self.source {
            Source::Memory(bytes) => Ok(bytes.clone()),
            Source::Disk(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .with_context(|| format!("failed to read '{}'", path.display())),
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        (!stem.is_empty() && !ext.is_empty()).then_some(ext)
    }

    pub fn mime_type(&self) -> &'static str {
        mime_guess::from_path(&self.name)
            .first_raw()
            .unwrap_or("application/octet-stream")
    }
}

/// Client-side checks applied before anything is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    /// Returns the user-facing rejection message when the file may not be uploaded.
    pub fn check(&self, file: &SelectedFile) -> Result<(), &'static str> {
        if file.name().trim().is_empty() {
            return Err(EMPTY_FILE);
        }
        let allowed = file.extension().is_some_and(|ext| {
            self.allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        });
        if !allowed {
            return Err(UNSUPPORTED_FORMAT);
        }
        if file.len() > self.max_bytes {
            return Err(FILE_TOO_LARGE);
        }
        Ok(())
    }
}
