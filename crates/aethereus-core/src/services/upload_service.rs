use std::path::Path;

use anyhow::{Context, Result};

use crate::api::UploadFile;

/// Read a local file into an upload payload
pub async fn read_upload_file(path: &Path) -> Result<UploadFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    Ok(UploadFile {
        file_name,
        mime_type,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_upload_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let file = read_upload_file(&path).await.unwrap();
        assert_eq!(file.file_name, "photo.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.data.len(), 3);
    }

    #[tokio::test]
    async fn test_mime_type_beyond_common_images() {
        let dir = tempfile::tempdir().unwrap();
        let svg = dir.path().join("diagram.SVG");
        std::fs::write(&svg, b"<svg/>").unwrap();
        let unknown = dir.path().join("blob.zzqx");
        std::fs::write(&unknown, [0u8]).unwrap();

        assert_eq!(read_upload_file(&svg).await.unwrap().mime_type, "image/svg+xml");
        assert_eq!(
            read_upload_file(&unknown).await.unwrap().mime_type,
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_upload_file(&dir.path().join("nope.png")).await.is_err());
    }
}
