// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Workspace Materializer
//!
//! Filesystem side of tenant provisioning: loads the shared skill reference
//! and writes rendered documents into a tenant directory. Every write
//! replaces the whole file; nothing is merged with what was there before.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::workspace::{strip_front_matter, WorkspaceBundle};

/// Filesystem failure with the path that caused it.
#[derive(Debug, Error)]
#[error("{}: {source}", .path.display())]
pub struct FsWriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FsWriteError {
    fn at(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self { path: path.to_path_buf(), source }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceMaterializer;

impl WorkspaceMaterializer {
    pub fn new() -> Self {
        Self
    }

    /// Read a skill document and return its body without front matter.
    /// A missing or unreadable file yields empty text.
    pub async fn load_external_skill(&self, path: &Path) -> String {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => strip_front_matter(&raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Skill reference not found, continuing without it");
                String::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skill reference unreadable, continuing without it");
                String::new()
            }
        }
    }

    /// Create `dir` (and parents) and overwrite each document in it.
    pub async fn write(&self, dir: &Path, bundle: &WorkspaceBundle) -> Result<(), FsWriteError> {
        tokio::fs::create_dir_all(dir).await.map_err(FsWriteError::at(dir))?;

        for document in &bundle.documents {
            let path = dir.join(document.file_name);
            write_file(&path, &document.content).await?;
        }

        debug!(dir = %dir.display(), files = bundle.documents.len(), "Workspace written");
        Ok(())
    }
}

/// Replace a file's contents, creating its parent directory if needed.
pub async fn write_file(path: &Path, content: &str) -> Result<(), FsWriteError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(FsWriteError::at(parent))?;
    }
    tokio::fs::write(path, content).await.map_err(FsWriteError::at(path))
}

/// Remove a directory tree; an absent directory is not an error.
pub async fn remove_dir_if_present(dir: &Path) -> Result<(), FsWriteError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FsWriteError { path: dir.to_path_buf(), source: e }),
    }
}
