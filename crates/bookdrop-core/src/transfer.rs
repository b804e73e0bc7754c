use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::{
    domain::StoredArtifact,
    errors::Error,
    Result,
};

/// Streams files from a source URL into the storage root, enforcing
/// type and size policy.
///
/// Size is checked twice per transfer: against the advertised content length
/// before any bytes are written, and against the actual byte count once the
/// copy finishes. A file that passes the first check but fails the second is
/// deleted; no partially-valid oversize file survives.
pub struct FileTransfer {
    storage_root: PathBuf,
    allowed_file_types: Vec<String>,
    max_file_size_mb: u64,
    http: reqwest::Client,
}

impl FileTransfer {
    /// `allowed_file_types` are lowercased extensions including the dot
    /// (`.pdf`); an empty list means unrestricted.
    pub fn new(
        storage_root: impl Into<PathBuf>,
        allowed_file_types: Vec<String>,
        max_file_size_mb: u64,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            storage_root: storage_root.into(),
            allowed_file_types,
            max_file_size_mb,
            http,
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb
    }

    pub fn is_type_allowed(&self, filename: &str) -> bool {
        if self.allowed_file_types.is_empty() {
            return true; // no restrictions if no types configured
        }

        let ext = file_extension(filename);
        if self.allowed_file_types.iter().any(|a| *a == ext) {
            return true;
        }

        info!(
            filename,
            extension = %ext,
            allowed = ?self.allowed_file_types,
            "file type not allowed"
        );
        false
    }

    pub fn is_size_allowed(&self, size: u64) -> bool {
        let max_bytes = self.max_file_size_mb * 1024 * 1024;
        if size > max_bytes {
            info!(size, max_bytes, "file size exceeds limit");
            return false;
        }
        true
    }

    /// Downloads `source_url` into the storage root under `declared_name`,
    /// picking a `name_1.ext`-style suffix if the name is already taken.
    ///
    /// Connection failures are surfaced as [`Error::Transport`]; this layer
    /// does not retry them.
    pub async fn download(&self, source_url: &str, declared_name: &str) -> Result<StoredArtifact> {
        if !self.is_type_allowed(declared_name) {
            return Err(Error::TypeRejected {
                extension: file_extension(declared_name),
            });
        }

        let resp = self
            .http
            .get(source_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!(url = source_url, error = %e, "failed to fetch file");
                Error::Transport(e.to_string())
            })?;

        // Advertised-size check: abort before writing any bytes.
        if let Some(len) = resp.content_length() {
            if !self.is_size_allowed(len) {
                return Err(Error::SizeRejected {
                    size: len,
                    limit_mb: self.max_file_size_mb,
                });
            }
        }

        let (path, mut file) = create_unique_file(&self.storage_root, declared_name).await?;

        let mut resp = resp;
        let mut bytes_written: u64 = 0;
        loop {
            let chunk = match resp.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "transfer interrupted");
                    return Err(Error::Transport(e.to_string()));
                }
            };
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        // Final size check against the bytes actually written.
        if !self.is_size_allowed(bytes_written) {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(Error::SizeRejected {
                size: bytes_written,
                limit_mb: self.max_file_size_mb,
            });
        }

        info!(
            filename = declared_name,
            path = %path.display(),
            size = bytes_written,
            "file downloaded successfully"
        );

        Ok(StoredArtifact {
            path,
            bytes_written,
        })
    }
}

/// Exclusively creates a fresh file for `declared_name` under `root`.
///
/// The name is reduced to its final path component, so a declared name
/// containing separators cannot escape the storage root. On a name collision
/// the numeric suffix is bumped and creation retried, so two concurrent
/// transfers of the same name cannot both win the same path.
pub(crate) async fn create_unique_file(
    root: &Path,
    declared_name: &str,
) -> Result<(PathBuf, File)> {
    let file_name = Path::new(declared_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let base = root.join(file_name);

    let mut counter: u32 = 0;
    loop {
        let candidate = if counter == 0 {
            base.clone()
        } else {
            with_suffix(&base, counter)
        };

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter += 1;
            }
            Err(e) => {
                error!(path = %candidate.display(), error = %e, "failed to create file");
                return Err(Error::Io(e));
            }
        }
    }
}

/// `root/name.ext` -> `root/name_2.ext` for n = 2.
fn with_suffix(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    path.with_file_name(name)
}

/// Lowercased extension including the dot, or empty if the name has none.
fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
