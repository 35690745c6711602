//! File validation worker.
//!
//! Runs the full pre-flight battery over a submitted artifact: content type,
//! checksum shape, file access, size bounds, extension consistency, magic
//! numbers, and path hygiene. All findings are collected; a single failing
//! check fails the job with every collected error attached.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use crate::config::ValidationConfig;
use crate::job::{JobState, JobStatus};
use crate::worker::WorkerHandler;

/// Rough per-pixel ceiling used to flag absurdly large images by size alone.
const MAX_IMAGE_DIMENSION: u64 = 10_000;

/// Longest plausible video, used for the bitrate-based duration estimate.
const MAX_VIDEO_DURATION_SECS: f64 = 3600.0;

pub struct ValidationWorker {
    config: ValidationConfig,
}

impl ValidationWorker {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    fn check_basic_metadata(&self, state: &JobState) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.config.allowed_types.contains_key(&state.content_type) {
            let allowed: Vec<&str> = self.config.allowed_types.keys().map(String::as_str).collect();
            errors.push(format!(
                "Unsupported file type: {}. Allowed types: {}",
                state.content_type,
                allowed.join(", ")
            ));
        }

        let checksum = state.checksum_sha256.as_str();
        if checksum.is_empty() {
            errors.push("Missing checksum".to_string());
        } else if checksum.len() != 64 {
            errors.push("Invalid checksum format: must be 64 characters for SHA256".to_string());
        } else if self.config.reject_trailing_zero_checksum && checksum.ends_with('0') {
            errors.push("Checksum validation failed: checksum ends with 0".to_string());
        }

        errors
    }

    fn check_file_access(&self, state: &JobState) -> Vec<String> {
        let mut errors = Vec::new();
        let path = Path::new(&state.file_path);

        if !path.exists() {
            errors.push(format!("File does not exist: {}", state.file_path));
            return errors;
        }
        if !path.is_file() {
            errors.push(format!("Path is not a file: {}", state.file_path));
        }
        if fs::File::open(path).is_err() {
            errors.push(format!("No read permission for file: {}", state.file_path));
        }

        errors
    }

    fn check_file_size(&self, state: &mut JobState) -> Vec<String> {
        let mut errors = Vec::new();

        match fs::metadata(&state.file_path) {
            Ok(meta) => {
                let file_size = meta.len();
                if file_size > self.config.max_file_size {
                    errors.push(format!(
                        "File size {file_size} exceeds maximum allowed size {}",
                        self.config.max_file_size
                    ));
                }
                if file_size == 0 {
                    errors.push("File is empty".to_string());
                }
                // Recorded even when a bound fails, for downstream diagnostics.
                state.merge_metadata("file_size", json!(file_size));
            }
            Err(e) => errors.push(format!("File size validation failed: {e}")),
        }

        errors
    }

    fn check_file_extension(&self, state: &JobState) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(allowed) = self.config.allowed_types.get(&state.content_type) else {
            return errors;
        };

        let extension = Path::new(&state.file_path)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if !allowed.iter().any(|a| a == &extension) {
            errors.push(format!(
                "File extension {} does not match content type {}. Allowed extensions: {}",
                extension,
                state.content_type,
                allowed.join(", ")
            ));
        }

        errors
    }

    fn check_content_rules(&self, state: &JobState) -> Vec<String> {
        let content_type = state.content_type.as_str();
        let path = Path::new(&state.file_path);

        let result = if content_type.starts_with("image/") {
            validate_image_file(path)
        } else if content_type.starts_with("video/") {
            validate_video_file(path)
        } else if content_type == "application/pdf" {
            validate_pdf_file(path)
        } else {
            return Vec::new();
        };

        result.unwrap_or_else(|e| vec![format!("Content-specific validation failed: {e}")])
    }

    fn check_security(&self, state: &JobState) -> Vec<String> {
        let mut errors = Vec::new();
        let file_path = state.file_path.as_str();

        if file_path.contains([';', '|', '&', '$', '`']) {
            errors.push("File path contains potentially dangerous characters".to_string());
        }
        if file_path.contains("..") {
            errors.push("Invalid file path: potential path traversal attack".to_string());
        }

        errors
    }
}

#[async_trait]
impl WorkerHandler for ValidationWorker {
    fn task_name(&self) -> &str {
        "validate_file"
    }

    async fn process(&self, mut state: JobState) -> anyhow::Result<JobState> {
        let mut errors = Vec::new();

        errors.extend(self.check_basic_metadata(&state));
        errors.extend(self.check_file_access(&state));
        errors.extend(self.check_file_size(&mut state));
        errors.extend(self.check_file_extension(&state));
        errors.extend(self.check_content_rules(&state));
        errors.extend(self.check_security(&state));

        if errors.is_empty() {
            state.step = "validate_file_done".to_string();
            state.merge_metadata("validation", json!("passed"));
            state.touch();
        } else {
            state.status = JobStatus::Failed;
            state.step = "validate_file_failed".to_string();
            state.push_errors(errors);
            state.touch();
        }

        Ok(state)
    }
}

fn read_header(path: &Path, len: usize) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(path)?;
    let mut header = vec![0u8; len];
    let n = file.read(&mut header)?;
    header.truncate(n);
    Ok(header)
}

fn validate_image_file(path: &Path) -> std::io::Result<Vec<String>> {
    let mut errors = Vec::new();
    let file_size = fs::metadata(path)?.len();
    let header = read_header(path, 100)?;

    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        if file_size < 100 {
            errors.push("JPEG file appears to be too small or corrupted".to_string());
        }
    } else if header.starts_with(b"\x89PNG\r\n\x1a\n") {
        if file_size < 67 {
            errors.push("PNG file appears to be too small or corrupted".to_string());
        }
    } else if header.starts_with(b"GIF8") {
        if file_size < 35 {
            errors.push("GIF file appears to be too small or corrupted".to_string());
        }
    } else if header.starts_with(b"RIFF") && header.get(8..12) == Some(&b"WEBP"[..]) {
        if file_size < 45 {
            errors.push("WebP file appears to be too small or corrupted".to_string());
        }
    } else {
        errors.push("File does not appear to be a valid image format".to_string());
    }

    if file_size > MAX_IMAGE_DIMENSION * MAX_IMAGE_DIMENSION * 4 {
        errors.push(format!(
            "Image file size suggests dimensions may exceed maximum allowed \
             {MAX_IMAGE_DIMENSION}x{MAX_IMAGE_DIMENSION}"
        ));
    }

    Ok(errors)
}

fn validate_video_file(path: &Path) -> std::io::Result<Vec<String>> {
    let mut errors = Vec::new();
    let file_size = fs::metadata(path)?.len();

    if file_size < 1024 {
        errors.push("Video file appears to be too small or corrupted".to_string());
    }

    let header = read_header(path, 100)?;
    let signatures: [&[u8]; 4] = [b"ftyp", b"RIFF", b"\x1a\x45\xdf\xa3", b"\x00\x00\x01\xba"];
    if !signatures
        .iter()
        .any(|sig| header.windows(sig.len()).any(|w| w == *sig))
    {
        errors.push("File does not appear to be a valid video format".to_string());
    }

    // Rough duration estimate assuming ~1.5 Mbps compressed video.
    let estimated_duration = file_size as f64 * 8.0 / (1.5 * 1024.0 * 1024.0);
    if estimated_duration > MAX_VIDEO_DURATION_SECS {
        errors.push(format!(
            "Estimated video duration ({estimated_duration:.1}s) may exceed maximum allowed \
             {MAX_VIDEO_DURATION_SECS}s"
        ));
    }

    Ok(errors)
}

fn validate_pdf_file(path: &Path) -> std::io::Result<Vec<String>> {
    let mut errors = Vec::new();

    let mut file = fs::File::open(path)?;
    let mut header = [0u8; 10];
    let n = file.read(&mut header)?;
    if !header[..n].starts_with(b"%PDF-") {
        errors.push("Invalid PDF file: missing PDF header".to_string());
    }

    let len = file.metadata()?.len();
    let tail_len = len.min(10);
    file.seek(SeekFrom::End(-(tail_len as i64)))?;
    let mut footer = vec![0u8; tail_len as usize];
    file.read_exact(&mut footer)?;
    if !footer.windows(5).any(|w| w == b"%%EOF") {
        errors.push("Invalid PDF file: missing EOF marker".to_string());
    }

    Ok(errors)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::job::IngestionJobRequest;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> String {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn state(file_path: &str, content_type: &str, checksum: &str) -> JobState {
        JobState::queued(IngestionJobRequest {
            job_id: "test_job".to_string(),
            file_path: file_path.to_string(),
            content_type: content_type.to_string(),
            checksum_sha256: checksum.to_string(),
            submitted_by: Some("TestUser".to_string()),
        })
    }

    fn pdf_bytes() -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
        bytes.extend_from_slice(b"%%EOF");
        bytes
    }

    #[tokio::test]
    async fn valid_pdf_passes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc.pdf", &pdf_bytes());
        let worker = ValidationWorker::new(ValidationConfig::default());

        let result = worker
            .process(state(&path, "application/pdf", &"a".repeat(64)))
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Queued);
        assert_eq!(result.step, "validate_file_done");
        assert_eq!(result.metadata["validation"], json!("passed"));
        assert!(result.metadata["file_size"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn trailing_zero_checksum_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc.pdf", &pdf_bytes());
        let worker = ValidationWorker::new(ValidationConfig::default());

        let checksum = format!("{}0", "a".repeat(63));
        let result = worker
            .process(state(&path, "application/pdf", &checksum))
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.step, "validate_file_failed");
        let errors = result.metadata["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| {
            e.as_str()
                .is_some_and(|s| s.contains("checksum ends with 0"))
        }));
    }

    #[tokio::test]
    async fn trailing_zero_checksum_allowed_when_sentinel_disabled() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc.pdf", &pdf_bytes());
        let config = ValidationConfig {
            reject_trailing_zero_checksum: false,
            ..ValidationConfig::default()
        };
        let worker = ValidationWorker::new(config);

        let checksum = format!("{}0", "a".repeat(63));
        let result = worker
            .process(state(&path, "application/pdf", &checksum))
            .await
            .unwrap();
        assert_eq!(result.step, "validate_file_done");
    }

    #[tokio::test]
    async fn unsupported_content_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.txt", b"hello");
        let worker = ValidationWorker::new(ValidationConfig::default());

        let result = worker
            .process(state(&path, "text/plain", &"a".repeat(64)))
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        let errors = result.metadata["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| {
            e.as_str()
                .is_some_and(|s| s.contains("Unsupported file type: text/plain"))
        }));
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let worker = ValidationWorker::new(ValidationConfig::default());
        let result = worker
            .process(state("/nowhere/doc.pdf", "application/pdf", &"a".repeat(64)))
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        let errors = result.metadata["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| {
            e.as_str()
                .is_some_and(|s| s.contains("File does not exist"))
        }));
    }

    #[tokio::test]
    async fn wrong_magic_number_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "fake.png", b"this is not a png at all");
        let worker = ValidationWorker::new(ValidationConfig::default());

        let result = worker
            .process(state(&path, "image/png", &"a".repeat(64)))
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        let errors = result.metadata["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| {
            e.as_str()
                .is_some_and(|s| s.contains("valid image format"))
        }));
    }

    #[tokio::test]
    async fn traversal_path_is_rejected() {
        let worker = ValidationWorker::new(ValidationConfig::default());
        let result = worker
            .process(state(
                "storage/../../etc/passwd.pdf",
                "application/pdf",
                &"a".repeat(64),
            ))
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        let errors = result.metadata["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| {
            e.as_str()
                .is_some_and(|s| s.contains("path traversal"))
        }));
    }

    #[tokio::test]
    async fn valid_png_passes() {
        let dir = TempDir::new().unwrap();
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.resize(128, 0);
        let path = write_file(&dir, "pic.png", &png);
        let worker = ValidationWorker::new(ValidationConfig::default());

        let result = worker
            .process(state(&path, "image/png", &"a".repeat(64)))
            .await
            .unwrap();
        assert_eq!(result.step, "validate_file_done");
    }
}
