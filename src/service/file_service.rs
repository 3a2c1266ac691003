//! Upload storage on the local filesystem.
//!
//! Files live at `<root>/<folder>/<uuid><ext>` and are addressed by
//! `/uploads/<folder>/<file>`. Every URL coming back from a client is
//! re-parsed through [`UploadLocation`] so it can never point outside the
//! upload root.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::file::{
    NewFile, StoredFile, UploadFolder, UploadLocation, allowed_extension, content_type_for,
};
use crate::error::AppError;
use crate::persistence::Store;

/// A file ready to be streamed back to a client.
#[derive(Debug, Clone)]
pub struct Download {
    /// Name suggested in `Content-Disposition`.
    pub file_name: String,
    /// MIME type derived from the extension.
    pub content_type: &'static str,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// Stores, serves and deletes uploaded files.
#[derive(Debug, Clone)]
pub struct FileService {
    store: Arc<dyn Store>,
    root: PathBuf,
    max_bytes: usize,
}

impl FileService {
    /// Creates a new `FileService` rooted at `root`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, root: PathBuf, max_bytes: usize) -> Self {
        Self {
            store,
            root,
            max_bytes,
        }
    }

    /// Largest accepted upload in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Writes an upload to disk and records it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for an unknown folder, an empty
    /// file or a disallowed extension, [`AppError::PayloadTooLarge`] above
    /// the size limit, and [`AppError::Internal`] on I/O failure.
    pub async fn upload(
        &self,
        caller: &AuthUser,
        folder: Option<&str>,
        original_name: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<StoredFile, AppError> {
        let folder = match folder.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) => name.parse::<UploadFolder>().map_err(|_| {
                AppError::invalid(
                    "folder must be one of avatars, cvs, logos, certificates, general",
                )
            })?,
            None => UploadFolder::default(),
        };
        if bytes.is_empty() {
            return Err(AppError::invalid("file is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "file exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        let ext = allowed_extension(original_name)?;

        let location = UploadLocation {
            folder,
            file_name: format!("{}{ext}", Uuid::new_v4()),
        };
        let path = location.path_under(&self.root);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_error)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;

        let record = NewFile {
            original_name: original_name.to_string(),
            url: location.url(),
            folder,
            size_bytes: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
            content_type,
            uploaded_by: caller.id,
        };
        match self.store.insert_file(record).await {
            Ok(stored) => {
                tracing::info!(url = %stored.url, size = stored.size_bytes, by = %caller.id, "file uploaded");
                Ok(stored)
            }
            Err(err) => {
                if let Err(io) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %io, "failed to remove orphaned upload");
                }
                Err(err)
            }
        }
    }

    /// Reads a stored file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] for URLs outside the upload
    /// root and [`AppError::NotFound`] when the file does not exist.
    pub async fn download(&self, url: &str) -> Result<Download, AppError> {
        let location = UploadLocation::parse(url)?;
        let bytes = match tokio::fs::read(location.path_under(&self.root)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::not_found("file")),
            Err(e) => return Err(io_error(e)),
        };
        let file_name = self
            .store
            .file_by_url(&location.url())
            .await?
            .map_or_else(|| location.file_name.clone(), |f| f.original_name);
        Ok(Download {
            content_type: content_type_for(&location.file_name),
            file_name,
            bytes,
        })
    }

    /// Removes a file and its record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown files and
    /// [`AppError::Forbidden`] unless the caller uploaded the file or is an
    /// administrator.
    pub async fn delete(&self, url: &str, caller: &AuthUser) -> Result<(), AppError> {
        let location = UploadLocation::parse(url)?;
        let record = self
            .store
            .file_by_url(&location.url())
            .await?
            .ok_or_else(|| AppError::not_found("file"))?;
        if !caller.is_admin() && record.uploaded_by != caller.id {
            return Err(AppError::forbidden("only the uploader can delete this file"));
        }
        match tokio::fs::remove_file(location.path_under(&self.root)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(url = %record.url, "file already missing on disk");
            }
            Err(e) => return Err(io_error(e)),
        }
        self.store.delete_file(record.id).await?;
        tracing::info!(url = %record.url, by = %caller.id, "file deleted");
        Ok(())
    }
}

fn io_error(err: std::io::Error) -> AppError {
    AppError::Internal(format!("file storage: {err}"))
}
