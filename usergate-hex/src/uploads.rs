//! Stores multipart uploads on local disk under random names.

use std::path::{Path, PathBuf};

use serde::Serialize;

use usergate_types::{AppError, UploadedFile};

const OCTET_STREAM: &str = "application/octet-stream";

/// Where a stored upload ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadDescriptor {
    /// Generated file name: `<uuid-v4><original extension>`.
    pub name: String,
    pub path: PathBuf,
    /// Sniffed from the content, not taken from the client.
    pub mime_type: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("empty file")]
    Empty,

    #[error("file type {0} not allowed")]
    NotAllowed(String),

    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Empty | UploadError::NotAllowed(_) => AppError::BadRequest(err.to_string()),
            UploadError::Io(e) => AppError::Internal(format!("upload storage: {e}")),
        }
    }
}

/// MIME type from the leading bytes of `bytes`.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', b'V', b'P', ..] => "image/webp",
        [b'%', b'P', b'D', b'F', b'-', ..] => "application/pdf",
        _ => OCTET_STREAM,
    }
}

/// Writes `file` into `folder` (created if missing).
///
/// `allowed` holds MIME prefixes such as `"image/"`; an empty list admits
/// every type.
pub async fn save_single(
    file: &UploadedFile,
    folder: &Path,
    allowed: &[&str],
) -> Result<UploadDescriptor, UploadError> {
    if file.is_empty() {
        return Err(UploadError::Empty);
    }

    let mime_type = sniff_mime(&file.bytes);
    if !allowed.is_empty() && !allowed.iter().any(|prefix| mime_type.starts_with(prefix)) {
        return Err(UploadError::NotAllowed(mime_type.to_string()));
    }

    let name = format!(
        "{}{}",
        uuid::Uuid::new_v4(),
        file.extension().unwrap_or_default()
    );
    let path = folder.join(&name);

    tokio::fs::create_dir_all(folder).await?;
    tokio::fs::write(&path, &file.bytes).await?;

    tracing::debug!(path = %path.display(), mime_type, size = file.len(), "upload stored");

    Ok(UploadDescriptor {
        name,
        path,
        mime_type: mime_type.to_string(),
    })
}

/// Removes a stored upload. Failures are logged, not returned.
pub async fn discard(stored: &UploadDescriptor) {
    if let Err(e) = tokio::fs::remove_file(&stored.path).await {
        tracing::warn!(path = %stored.path.display(), error = %e, "failed to remove upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn upload(name: &str, declared: &str, bytes: &'static [u8]) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: Some(declared.into()),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[test]
    fn test_sniffing() {
        assert_eq!(sniff_mime(PNG), "image/png");
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_mime(b"RIFF\x10\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime(b"%PDF-1.7"), "application/pdf");
        assert_eq!(sniff_mime(b"hello"), OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_saves_under_random_name() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("users/avatar");

        let stored = save_single(&upload("../../me.png", "image/png", PNG), &folder, &["image/"])
            .await
            .unwrap();

        assert_eq!(stored.mime_type, "image/png");
        assert!(stored.name.ends_with(".png"));
        assert_eq!(stored.path, folder.join(&stored.name));
        assert_eq!(std::fs::read(&stored.path).unwrap(), PNG);
    }

    #[tokio::test]
    async fn test_declared_type_is_not_trusted() {
        let dir = tempfile::tempdir().unwrap();

        let err = save_single(
            &upload("script.png", "image/png", b"#!/bin/sh\necho hi"),
            dir.path(),
            &["image/"],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::NotAllowed(ref m) if m == OCTET_STREAM));
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_empty_allow_list_admits_anything() {
        let dir = tempfile::tempdir().unwrap();

        let stored = save_single(&upload("notes", "text/plain", b"plain text"), dir.path(), &[])
            .await
            .unwrap();

        assert_eq!(stored.mime_type, OCTET_STREAM);
        assert_eq!(stored.name.len(), 36);
    }

    #[tokio::test]
    async fn test_discard_removes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let stored = save_single(&upload("me.png", "image/png", PNG), dir.path(), &["image/"])
            .await
            .unwrap();

        discard(&stored).await;
        assert!(!stored.path.exists());

        // Already gone: logged only.
        discard(&stored).await;
    }
}
