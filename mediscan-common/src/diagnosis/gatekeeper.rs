//! Upload gatekeeper
//!
//! Decides whether a candidate file is accepted for analysis, based on its
//! extension and byte size.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 50 MiB
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Extensions accepted by default (matched case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 5] = [".dcm", ".dicom", ".jpg", ".jpeg", ".png"];

/// A file offered for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub file_name: String,
    pub size_bytes: u64,
}

impl UploadCandidate {
    pub fn new(file_name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            file_name: file_name.into(),
            size_bytes,
        }
    }

    /// Lowercase extension without the leading dot, if the name has one
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Why a candidate was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("File name is empty")]
    EmptyName,

    #[error("Unsupported file type: {file_name}. Please upload DICOM, JPEG, or PNG files.")]
    UnsupportedExtension { file_name: String },

    #[error("File {file_name} is {size_bytes} bytes, exceeding the {limit_bytes} byte limit")]
    TooLarge {
        file_name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },
}

/// Acceptance rules (`[upload]` in the TOML file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadPolicy {
    /// Lowercase extensions including the leading dot
    pub allowed_extensions: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_file_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadPolicy {
    /// Allowed suffix that `file_name` ends with, lowercase and without the dot
    ///
    /// The longest match wins, so `.dicom` beats a configured `.com`.
    pub fn matched_extension(&self, file_name: &str) -> Option<String> {
        let lower = file_name.to_ascii_lowercase();
        self.allowed_extensions
            .iter()
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| !ext.trim_start_matches('.').is_empty() && lower.ends_with(ext.as_str()))
            .max_by_key(|ext| ext.len())
            .map(|ext| ext.trim_start_matches('.').to_string())
    }

    /// Accept or refuse `candidate`
    ///
    /// On success returns the matched extension (lowercase, no dot), which is
    /// what storage keys and content types must be derived from.
    pub fn check(&self, candidate: &UploadCandidate) -> Result<String, UploadRejection> {
        if candidate.file_name.trim().is_empty() {
            return Err(UploadRejection::EmptyName);
        }

        let extension = self
            .matched_extension(&candidate.file_name)
            .ok_or_else(|| UploadRejection::UnsupportedExtension {
                file_name: candidate.file_name.clone(),
            })?;

        if candidate.size_bytes > self.max_file_bytes {
            return Err(UploadRejection::TooLarge {
                file_name: candidate.file_name.clone(),
                size_bytes: candidate.size_bytes,
                limit_bytes: self.max_file_bytes,
            });
        }

        Ok(extension)
    }

    pub fn admits(&self, candidate: &UploadCandidate) -> bool {
        self.check(candidate).is_ok()
    }

    /// Keep only admitted candidates, preserving order
    pub fn filter<I>(&self, candidates: I) -> Vec<UploadCandidate>
    where
        I: IntoIterator<Item = UploadCandidate>,
    {
        candidates.into_iter().filter(|c| self.admits(c)).collect()
    }
}

/// Gatekeeper predicate with the default policy
pub fn admits(file_name: &str, size_bytes: u64) -> bool {
    UploadPolicy::default().admits(&UploadCandidate::new(file_name, size_bytes))
}

/// MIME type for an accepted extension (without the dot)
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "dcm" | "dicom" => "application/dicom",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dicom_size_boundary() {
        assert!(admits("scan.DCM", MAX_UPLOAD_BYTES));
        assert!(!admits("scan.DCM", MAX_UPLOAD_BYTES + 1));
    }

    #[test]
    fn test_extensions_case_insensitive() {
        for name in ["a.dcm", "b.DICOM", "c.Jpg", "d.jpeg", "e.PNG"] {
            assert!(admits(name, 1024), "{} should be admitted", name);
        }
        for name in ["notes.txt", "scan.png.exe", "png", "archive.zip"] {
            assert!(!admits(name, 1024), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_check_reports_reason() {
        let policy = UploadPolicy::default();

        let err = policy.check(&UploadCandidate::new("x.gif", 10)).unwrap_err();
        assert!(matches!(err, UploadRejection::UnsupportedExtension { .. }));

        let err = policy
            .check(&UploadCandidate::new("x.png", MAX_UPLOAD_BYTES + 1))
            .unwrap_err();
        assert!(matches!(err, UploadRejection::TooLarge { .. }));

        let err = policy.check(&UploadCandidate::new("  ", 10)).unwrap_err();
        assert_eq!(err, UploadRejection::EmptyName);
    }

    #[test]
    fn test_filter_drops_rejected() {
        let policy = UploadPolicy::default();
        let kept = policy.filter(vec![
            UploadCandidate::new("chest.png", 2_000_000),
            UploadCandidate::new("chest.bmp", 2_000_000),
            UploadCandidate::new("huge.dcm", MAX_UPLOAD_BYTES * 2),
            UploadCandidate::new("lateral.jpeg", 10),
        ]);
        let names: Vec<_> = kept.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names, vec!["chest.png", "lateral.jpeg"]);
    }

    #[test]
    fn test_extension() {
        assert_eq!(UploadCandidate::new("Scan.DCM", 1).extension().as_deref(), Some("dcm"));
        assert_eq!(UploadCandidate::new("noext", 1).extension(), None);
        assert_eq!(UploadCandidate::new(".png", 1).extension(), None);
    }

    #[test]
    fn test_check_returns_matched_extension() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.check(&UploadCandidate::new("Chest.PNG", 10)).unwrap(), "png");
        assert_eq!(policy.check(&UploadCandidate::new("scan.dicom", 10)).unwrap(), "dicom");

        // A bare ".png" has no stem, but the allow-list still matched it
        assert_eq!(UploadCandidate::new(".png", 10).extension(), None);
        assert_eq!(policy.check(&UploadCandidate::new(".png", 10)).unwrap(), "png");
    }

    #[test]
    fn test_matched_extension_prefers_longest() {
        let policy = UploadPolicy {
            allowed_extensions: vec![".com".to_string(), ".dicom".to_string()],
            max_file_bytes: 100,
        };
        assert_eq!(policy.matched_extension("a.DICOM").as_deref(), Some("dicom"));
        assert_eq!(policy.matched_extension("a.com").as_deref(), Some("com"));
        assert_eq!(policy.matched_extension("a.png"), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for_extension("DCM"), "application/dicom");
        assert_eq!(content_type_for_extension("jpg"), "image/jpeg");
        assert_eq!(content_type_for_extension("png"), "image/png");
    }
}
