//! Uploaded file records and the rules that keep uploads inside their
//! folders.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileId, UserId};
use crate::error::AppError;

/// URL prefix under which uploads are addressed.
pub const UPLOAD_URL_PREFIX: &str = "/uploads/";

/// Accepted file extensions, lower-case with the leading dot.
pub const ALLOWED_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".pdf", ".doc", ".docx"];

/// Whitelisted upload folders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadFolder {
    /// Profile pictures.
    Avatars,
    /// Resumes.
    Cvs,
    /// Company logos.
    Logos,
    /// Certificates and diplomas.
    Certificates,
    /// Everything else.
    #[default]
    General,
}

text_enum!(UploadFolder {
    Avatars => "avatars",
    Cvs => "cvs",
    Logos => "logos",
    Certificates => "certificates",
    General => "general",
});

/// Returns the lower-cased extension of `file_name` if it is whitelisted.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for a missing or disallowed
/// extension.
pub fn allowed_extension(file_name: &str) -> Result<String, AppError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else if ext.is_empty() {
        Err(AppError::invalid("file has no extension"))
    } else {
        Err(AppError::invalid(format!("file type {ext} is not allowed")))
    }
}

/// MIME type served for a stored file, derived from its extension.
#[must_use]
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

/// A file URL split into its validated parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLocation {
    /// Whitelisted folder.
    pub folder: UploadFolder,
    /// Bare file name, free of separators and parent references.
    pub file_name: String,
}

impl UploadLocation {
    /// Parses `/uploads/<folder>/<file>` (leading prefix optional).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] when the URL has the wrong
    /// shape, names an unknown folder, or tries to escape the upload root.
    pub fn parse(url: &str) -> Result<Self, AppError> {
        let relative = url
            .strip_prefix(UPLOAD_URL_PREFIX)
            .unwrap_or_else(|| url.trim_start_matches('/'));
        let mut parts = relative.split('/');
        let (Some(folder), Some(file_name), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AppError::invalid("invalid file path"));
        };
        let folder: UploadFolder = folder
            .parse()
            .map_err(|_| AppError::invalid("invalid file path"))?;
        if file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains(['\\', '\0', ':'])
            || file_name.starts_with('.')
        {
            return Err(AppError::invalid("invalid file path"));
        }
        Ok(Self {
            folder,
            file_name: file_name.to_string(),
        })
    }

    /// Public URL of the file.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{UPLOAD_URL_PREFIX}{}/{}", self.folder, self.file_name)
    }

    /// Location on disk below `root`.
    #[must_use]
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(self.folder.as_str()).join(&self.file_name)
    }
}

/// Metadata row for an uploaded file.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredFile {
    /// Row id.
    pub id: FileId,
    /// Name supplied by the client.
    pub original_name: String,
    /// Public URL, unique.
    pub url: String,
    /// Folder the file lives in.
    pub folder: UploadFolder,
    /// Size in bytes.
    pub size_bytes: i64,
    /// MIME type reported at upload.
    pub content_type: Option<String>,
    /// Uploader.
    pub uploaded_by: UserId,
    /// Upload time.
    pub uploaded_at: DateTime<Utc>,
}

/// Fields needed to insert a [`StoredFile`].
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Name supplied by the client.
    pub original_name: String,
    /// Public URL.
    pub url: String,
    /// Folder.
    pub folder: UploadFolder,
    /// Size in bytes.
    pub size_bytes: i64,
    /// MIME type reported at upload.
    pub content_type: Option<String>,
    /// Uploader.
    pub uploaded_by: UserId,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn folder_is_case_insensitive() {
        let Ok(folder) = "CVs".parse::<UploadFolder>() else {
            panic!("folder should parse");
        };
        assert_eq!(folder, UploadFolder::Cvs);
        assert!("secrets".parse::<UploadFolder>().is_err());
    }

    #[test]
    fn extension_whitelist() {
        assert!(allowed_extension("resume.PDF").is_ok_and(|e| e == ".pdf"));
        assert!(allowed_extension("photo.jpeg").is_ok());
        assert!(allowed_extension("script.sh").is_err());
        assert!(allowed_extension("README").is_err());
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type_for("a.pdf"), "application/pdf");
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }

    #[test]
    fn parse_accepts_well_formed_urls() {
        let Ok(loc) = UploadLocation::parse("/uploads/cvs/abc.pdf") else {
            panic!("url should parse");
        };
        assert_eq!(loc.folder, UploadFolder::Cvs);
        assert_eq!(loc.file_name, "abc.pdf");
        assert_eq!(loc.url(), "/uploads/cvs/abc.pdf");
        assert_eq!(
            loc.path_under(Path::new("/srv/up")),
            PathBuf::from("/srv/up/cvs/abc.pdf")
        );
        assert!(UploadLocation::parse("logos/x.png").is_ok());
    }

    #[test]
    fn parse_rejects_traversal() {
        for bad in [
            "/uploads/../etc/passwd",
            "/uploads/cvs/../../etc/passwd",
            "/uploads/cvs/..",
            "/uploads/cvs/.env",
            "/uploads/cvs/a\\..\\b",
            "/uploads/unknown/a.pdf",
            "/uploads/cvs/",
            "/uploads/cvs",
        ] {
            assert!(UploadLocation::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
