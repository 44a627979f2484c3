//! Source classification: local file vs. remote object reference, and
//! compression detection.

use std::path::Path;

use sluice_core::CompressionType;
use url::Url;

use crate::error::StagingError;

/// Schemes accepted as references to objects already in remote storage.
const REMOTE_SCHEMES: &[&str] = &["https", "s3", "gs", "az", "abfss"];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// True for an existing local file, false for a remote object reference.
///
/// Plain `http://` references and paths that are neither an existing file
/// nor a remote reference are rejected.
pub fn is_local_path(path: &str) -> Result<bool, StagingError> {
    let invalid = |reason: &str| StagingError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if let Ok(url) = Url::parse(path) {
        let scheme = url.scheme();
        if REMOTE_SCHEMES.contains(&scheme) {
            return Ok(false);
        }
        if scheme == "http" {
            return Err(invalid("remote references must use https, not http"));
        }
    }

    if Path::new(path).is_file() {
        Ok(true)
    } else {
        Err(invalid(
            "not an existing local file and not a remote object reference",
        ))
    }
}

/// Compression implied by the file extension.
///
/// For URLs only the path component is considered, so query strings carrying
/// access tokens do not hide the extension.
pub fn compression_discovery(path: &str) -> CompressionType {
    if path.is_empty() {
        return CompressionType::Unknown;
    }

    let name = match Url::parse(path) {
        Ok(url) if REMOTE_SCHEMES.contains(&url.scheme()) => url.path().to_string(),
        _ => path.to_string(),
    };

    let ext = Path::new(&name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("gz") => CompressionType::Gzip,
        Some("zip") => CompressionType::Zip,
        _ => CompressionType::None,
    }
}

/// Compression recognized from the leading bytes of a payload.
pub fn sniff_compression(head: &[u8]) -> CompressionType {
    if head.starts_with(&GZIP_MAGIC) {
        CompressionType::Gzip
    } else if head.starts_with(&ZIP_MAGIC) {
        CompressionType::Zip
    } else if head.len() < GZIP_MAGIC.len() {
        CompressionType::Unknown
    } else {
        CompressionType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_references_are_not_local() {
        assert!(!is_local_path("https://acct.blob.example.net/c/data.csv?sig=x").unwrap());
        assert!(!is_local_path("s3://bucket/data/part-0.parquet").unwrap());
        assert!(!is_local_path("abfss://fs@acct.dfs.example.net/x.csv").unwrap());
    }

    #[test]
    fn http_is_rejected() {
        let err = is_local_path("http://acct.blob.example.net/c/data.csv").unwrap_err();
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn existing_file_is_local() {
        let tmp = std::env::temp_dir().join(format!("sluice-path-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, b"a,b\n").unwrap();
        assert!(is_local_path(tmp.to_str().unwrap()).unwrap());
        std::fs::remove_file(&tmp).ok();
    }

    #[test]
    fn missing_file_is_invalid() {
        let err = is_local_path("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, StagingError::InvalidPath { .. }));
    }

    #[test]
    fn discovery_by_extension() {
        assert_eq!(compression_discovery("/data/a.csv.gz"), CompressionType::Gzip);
        assert_eq!(compression_discovery("/data/a.ZIP"), CompressionType::Zip);
        assert_eq!(compression_discovery("/data/a.csv"), CompressionType::None);
        assert_eq!(compression_discovery(""), CompressionType::Unknown);
        assert_eq!(
            compression_discovery("https://acct.blob.example.net/c/a.json.gz?sv=1&sig=abc.csv"),
            CompressionType::Gzip
        );
    }

    #[test]
    fn sniff_magic_numbers() {
        assert_eq!(sniff_compression(&[0x1f, 0x8b, 0x08, 0x00]), CompressionType::Gzip);
        assert_eq!(sniff_compression(b"PK\x03\x04rest"), CompressionType::Zip);
        assert_eq!(sniff_compression(b"a,b,c\n"), CompressionType::None);
        assert_eq!(sniff_compression(b""), CompressionType::Unknown);
    }
}
