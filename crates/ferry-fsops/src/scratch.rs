//! Uniquely named scratch files with guaranteed cleanup.
//!
//! # Design
//! - Names are `ferry-<uuid>[.<ext>]` opened with create-new semantics, so
//!   concurrent acquisitions never share a file.
//! - `ScratchFile` removes its backing file exactly once: on `release`, or in
//!   `Drop` when the owner never got that far (panic, cancelled future).
//! - Removal failures are logged and swallowed.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FsOpsError, FsOpsResult};

const NAME_PREFIX: &str = "ferry-";
const MAX_EXTENSION_LEN: usize = 16;
const MAX_NAME_ATTEMPTS: u32 = 8;

/// Directory that hands out scratch files.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    /// Use `root` for scratch files. The directory is not created here.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding scratch files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the scratch directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory cannot be created.
    pub async fn ensure(&self) -> FsOpsResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| FsOpsError::io("scratch.ensure", &self.root, err))
    }

    /// Create a new empty scratch file.
    ///
    /// `suggested_extension` is sanitised with [`sanitize_extension`].
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file cannot be created, or
    /// [`FsOpsError::NamesExhausted`] when every candidate name collided.
    pub async fn acquire(&self, suggested_extension: Option<&str>) -> FsOpsResult<ScratchFile> {
        let extension = suggested_extension.and_then(sanitize_extension);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.root.join(candidate_name(extension.as_deref()));
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(_) => {
                    debug!(path = %path.display(), "scratch file acquired");
                    return Ok(ScratchFile {
                        path,
                        released: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(FsOpsError::io("scratch.acquire", path, err)),
            }
        }
        Err(FsOpsError::NamesExhausted {
            dir: self.root.clone(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}

fn candidate_name(extension: Option<&str>) -> String {
    let id = Uuid::new_v4();
    extension.map_or_else(
        || format!("{NAME_PREFIX}{id}"),
        |ext| format!("{NAME_PREFIX}{id}.{ext}"),
    )
}

/// Reduce a declared extension to at most 16 ASCII alphanumerics.
///
/// Leading dots are ignored; `None` is returned when nothing usable remains.
#[must_use]
pub fn sanitize_extension(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXTENSION_LEN)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Exclusive owner of one scratch file.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    released: bool,
}

impl ScratchFile {
    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently on disk.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file cannot be inspected.
    pub async fn len(&self) -> FsOpsResult<u64> {
        fs::metadata(&self.path)
            .await
            .map(|meta| meta.len())
            .map_err(|err| FsOpsError::io("scratch.len", &self.path, err))
    }

    /// Discard any bytes written so far.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file cannot be truncated.
    pub async fn truncate(&self) -> FsOpsResult<()> {
        OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map(drop)
            .map_err(|err| FsOpsError::io("scratch.truncate", &self.path, err))
    }

    /// Delete the backing file. A file that is already gone is not an error.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "scratch file released"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "failed to remove scratch file");
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "scratch file removed on drop"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(error = %err, path = %self.path.display(), "failed to remove scratch file on drop");
            }
        }
    }
}
