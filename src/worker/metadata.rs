//! Metadata extraction worker.
//!
//! Collects universal file metadata plus whatever can be read honestly from
//! the artifact's own bytes: image dimensions (PNG, GIF, and JPEG), the PDF
//! version and page count, the video container family. Results are merged
//! under the `file_metadata` key.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::job::JobState;
use crate::worker::WorkerHandler;

pub struct MetadataWorker;

#[async_trait]
impl WorkerHandler for MetadataWorker {
    fn task_name(&self) -> &str {
        "extract_metadata"
    }

    async fn process(&self, mut state: JobState) -> anyhow::Result<JobState> {
        let path = Path::new(&state.file_path);
        let meta = fs::metadata(path)?;
        let bytes = fs::read(path)?;
        let header = &bytes[..bytes.len().min(64)];

        let mut file_metadata = Map::new();
        file_metadata.insert("file_size".to_string(), json!(meta.len()));
        file_metadata.insert(
            "file_extension".to_string(),
            json!(
                path.extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                    .unwrap_or_default()
            ),
        );
        if let Ok(modified) = meta.modified() {
            let stamp: DateTime<Utc> = modified.into();
            file_metadata.insert("modified_timestamp".to_string(), json!(stamp.to_rfc3339()));
        }
        file_metadata.insert(
            "magic_number_verified".to_string(),
            json!(magic_matches(header, &state.content_type)),
        );

        if state.content_type.starts_with("image/") {
            if let Some(dimensions) = image_dimensions(&bytes) {
                file_metadata.insert("dimensions".to_string(), dimensions);
            }
        } else if state.content_type == "application/pdf" {
            if let Some(version) = pdf_version(header) {
                file_metadata.insert("pdf_version".to_string(), json!(version));
            }
            file_metadata.insert("page_count".to_string(), json!(pdf_page_count(&bytes)));
        } else if state.content_type.starts_with("video/") {
            if let Some(container) = video_container(header) {
                file_metadata.insert("container".to_string(), json!(container));
            }
        }

        state.merge_metadata("file_metadata", Value::Object(file_metadata));
        state.step = "extract_metadata_done".to_string();
        state.touch();
        Ok(state)
    }
}

fn magic_matches(header: &[u8], content_type: &str) -> bool {
    match content_type {
        "application/pdf" => header.starts_with(b"%PDF-"),
        "image/jpeg" => header.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => header.starts_with(b"\x89PNG\r\n\x1a\n"),
        "image/gif" => header.starts_with(b"GIF8"),
        "image/webp" => header.starts_with(b"RIFF") && header.get(8..12) == Some(&b"WEBP"[..]),
        t if t.starts_with("video/") => {
            let signatures: [&[u8]; 4] =
                [b"ftyp", b"RIFF", b"\x1a\x45\xdf\xa3", b"\x00\x00\x01\xba"];
            signatures
                .iter()
                .any(|sig| header.windows(sig.len()).any(|w| w == *sig))
        }
        _ => false,
    }
}

/// Width/height for the formats that expose them without a full decode.
fn image_dimensions(bytes: &[u8]) -> Option<Value> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        // IHDR is always the first chunk: width/height are big-endian u32s
        // at offsets 16 and 20.
        let width = u32::from_be_bytes(bytes.get(16..20)?.try_into().ok()?);
        let height = u32::from_be_bytes(bytes.get(20..24)?.try_into().ok()?);
        return Some(json!({ "width": width, "height": height }));
    }
    if bytes.starts_with(b"GIF8") {
        // Logical screen descriptor: little-endian u16s at offsets 6 and 8.
        let width = u16::from_le_bytes(bytes.get(6..8)?.try_into().ok()?);
        let height = u16::from_le_bytes(bytes.get(8..10)?.try_into().ok()?);
        return Some(json!({ "width": width, "height": height }));
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return jpeg_dimensions(bytes);
    }
    None
}

/// Walk JPEG segments to the first start-of-frame marker.
fn jpeg_dimensions(bytes: &[u8]) -> Option<Value> {
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        // Standalone markers carry no length.
        if (0xD0..=0xD9).contains(&marker) {
            pos += 2;
            continue;
        }
        let length = u16::from_be_bytes(bytes.get(pos + 2..pos + 4)?.try_into().ok()?) as usize;
        if matches!(marker, 0xC0 | 0xC1 | 0xC2) {
            // Frame header: precision(1), height(2), width(2).
            let height = u16::from_be_bytes(bytes.get(pos + 5..pos + 7)?.try_into().ok()?);
            let width = u16::from_be_bytes(bytes.get(pos + 7..pos + 9)?.try_into().ok()?);
            return Some(json!({ "width": width, "height": height }));
        }
        pos += 2 + length;
    }
    None
}

fn pdf_version(header: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(header.get(..8)?).ok()?;
    text.strip_prefix("%PDF-").map(|v| v.to_string())
}

/// Count page objects, skipping the page-tree node (`/Type /Pages`).
fn pdf_page_count(bytes: &[u8]) -> usize {
    let mut count = 0;
    for pattern in [b"/Type /Page".as_slice(), b"/Type/Page".as_slice()] {
        let mut offset = 0;
        while let Some(pos) = bytes[offset..]
            .windows(pattern.len())
            .position(|w| w == pattern)
        {
            let end = offset + pos + pattern.len();
            if bytes.get(end) != Some(&b's') {
                count += 1;
            }
            offset = end;
        }
    }
    count
}

fn video_container(header: &[u8]) -> Option<&'static str> {
    if header.windows(4).any(|w| w == b"ftyp") {
        Some("mp4")
    } else if header.starts_with(b"RIFF") {
        Some("avi")
    } else if header.starts_with(b"\x1a\x45\xdf\xa3") {
        Some("webm")
    } else {
        None
    }
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

    fn state(file_path: &str, content_type: &str) -> JobState {
        JobState::queued(IngestionJobRequest {
            job_id: "test_job".to_string(),
            file_path: file_path.to_string(),
            content_type: content_type.to_string(),
            checksum_sha256: "f".repeat(64),
            submitted_by: None,
        })
    }

    fn png_with_dimensions(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.resize(64, 0);
        bytes
    }

    fn jpeg_with_dimensions(width: u16, height: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        // APP0 segment, 16 bytes long.
        bytes.extend_from_slice(&16u16.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 14]);
        // SOF0 marker.
        bytes.extend_from_slice(&[0xFF, 0xC0]);
        bytes.extend_from_slice(&11u16.to_be_bytes());
        bytes.push(8);
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&[1, 0x11, 0, 0]);
        bytes
    }

    #[tokio::test]
    async fn extracts_universal_metadata_for_pdf() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "doc.pdf",
            b"%PDF-1.7\n<< /Type /Page >>\nsome content\n%%EOF",
        );

        let result = MetadataWorker
            .process(state(&path, "application/pdf"))
            .await
            .unwrap();

        assert_eq!(result.step, "extract_metadata_done");
        let fm = &result.metadata["file_metadata"];
        assert_eq!(fm["file_extension"], json!(".pdf"));
        assert_eq!(fm["magic_number_verified"], json!(true));
        assert_eq!(fm["pdf_version"], json!("1.7"));
        assert_eq!(fm["page_count"], json!(1));
        assert!(fm["file_size"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn extracts_png_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "pic.png", &png_with_dimensions(640, 480));

        let result = MetadataWorker
            .process(state(&path, "image/png"))
            .await
            .unwrap();

        let dims = &result.metadata["file_metadata"]["dimensions"];
        assert_eq!(dims["width"], json!(640));
        assert_eq!(dims["height"], json!(480));
    }

    #[tokio::test]
    async fn extracts_jpeg_dimensions_from_frame_header() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "photo.jpg", &jpeg_with_dimensions(1920, 1080));

        let result = MetadataWorker
            .process(state(&path, "image/jpeg"))
            .await
            .unwrap();

        let dims = &result.metadata["file_metadata"]["dimensions"];
        assert_eq!(dims["width"], json!(1920));
        assert_eq!(dims["height"], json!(1080));
    }

    #[tokio::test]
    async fn mismatched_magic_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc.pdf", b"plain text pretending to be pdf");

        let result = MetadataWorker
            .process(state(&path, "application/pdf"))
            .await
            .unwrap();

        assert_eq!(
            result.metadata["file_metadata"]["magic_number_verified"],
            json!(false)
        );
        assert_eq!(result.step, "extract_metadata_done");
    }

    #[tokio::test]
    async fn missing_file_is_a_handler_error() {
        let result = MetadataWorker
            .process(state("/nowhere/gone.pdf", "application/pdf"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn merge_preserves_validation_results() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "doc.pdf", b"%PDF-1.4\n%%EOF");

        let mut input = state(&path, "application/pdf");
        input.merge_metadata("validation", json!("passed"));

        let result = MetadataWorker.process(input).await.unwrap();
        assert_eq!(result.metadata["validation"], json!("passed"));
        assert!(result.metadata.contains_key("file_metadata"));
    }
}
