//! Text extraction worker (pdf branch).
//!
//! Pulls the readable text out of a PDF, writes it to the processed-artifact
//! directory, and merges an analysis summary under `text_extraction`.
//! Extraction here is a byte-level scan for printable runs; a deployment
//! that needs layout-aware extraction swaps this worker body out, the
//! surrounding protocol is unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::job::{JobState, JobStatus};
use crate::worker::WorkerHandler;

/// Characters shown in the stored preview.
const PREVIEW_CHARS: usize = 500;

/// Shortest printable run kept by the scanner.
const MIN_RUN_LEN: usize = 4;

pub struct TextExtractionWorker {
    processed_dir: PathBuf,
}

#[derive(Debug, Default)]
struct ExtractionResult {
    text: String,
    character_count: usize,
    page_count: usize,
}

impl TextExtractionWorker {
    pub fn new(processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
        }
    }

    fn save_text(&self, job_id: &str, text: &str) -> std::io::Result<(PathBuf, Value)> {
        fs::create_dir_all(&self.processed_dir)?;
        let path = self
            .processed_dir
            .join(format!("{job_id}_extracted_text.txt"));
        fs::write(&path, text)?;
        let stats = json!({
            "saved_at": Utc::now().to_rfc3339(),
            "file_size_bytes": fs::metadata(&path)?.len(),
            "character_count": text.chars().count(),
            "file_path": path.to_string_lossy(),
        });
        Ok((path, stats))
    }
}

#[async_trait]
impl WorkerHandler for TextExtractionWorker {
    fn task_name(&self) -> &str {
        "extract_text"
    }

    async fn process(&self, mut state: JobState) -> anyhow::Result<JobState> {
        let mut errors = Vec::new();
        let mut extraction = ExtractionResult::default();
        let mut result_doc: Option<Value> = None;

        let path = Path::new(&state.file_path);
        if !path.exists() {
            errors.push(format!("File not found: {}", state.file_path));
        } else if state.content_type != "application/pdf" {
            errors.push(format!(
                "Text extraction only supported for PDF files. Got: {}",
                state.content_type
            ));
        } else {
            match fs::read(path) {
                Ok(bytes) => extraction = extract_from_pdf(&bytes),
                Err(e) => errors.push(format!("Text extraction process failed: {e}")),
            }

            if errors.is_empty() {
                if extraction.character_count > 0 {
                    match self.save_text(&state.job_id, &extraction.text) {
                        Ok((text_path, file_stats)) => {
                            let analysis = analyze_text(&extraction.text);
                            let mut preview: String =
                                extraction.text.chars().take(PREVIEW_CHARS).collect();
                            if extraction.text.chars().count() > PREVIEW_CHARS {
                                preview.push_str("...");
                            }
                            result_doc = Some(json!({
                                "success": true,
                                "extracted_character_count": extraction.character_count,
                                "total_pages": extraction.page_count,
                                "pages_with_text": extraction.page_count,
                                "text_file_path": text_path.to_string_lossy(),
                                "file_stats": file_stats,
                                "content_analysis": analysis,
                                "extraction_time": Utc::now().to_rfc3339(),
                                "text_preview": preview,
                            }));
                        }
                        Err(e) => errors.push(format!("Failed to save extracted text: {e}")),
                    }
                } else {
                    errors.push("No text could be extracted from the PDF".to_string());
                }
            }
        }

        if errors.is_empty() {
            // result_doc is always present when no error was collected.
            if let Some(doc) = result_doc {
                state.merge_metadata("text_extraction", doc);
            }
            state.merge_metadata("extract_text", json!("passed"));
            state.step = "extract_text_done".to_string();
            state.touch();
        } else {
            state.status = JobStatus::Failed;
            state.step = "extract_text_failed".to_string();
            if extraction.character_count > 0 || extraction.page_count > 0 {
                state.merge_metadata(
                    "text_extraction",
                    json!({
                        "success": false,
                        "errors": errors.clone(),
                        "partial_results": {
                            "extracted_character_count": extraction.character_count,
                            "total_pages": extraction.page_count,
                        },
                    }),
                );
            }
            state.push_errors(errors);
            state.touch();
        }

        Ok(state)
    }
}

/// Pull printable runs and a page count out of raw PDF bytes.
fn extract_from_pdf(bytes: &[u8]) -> ExtractionResult {
    let mut text = String::new();
    let mut run = String::new();

    for &byte in bytes {
        if (0x20..0x7F).contains(&byte) {
            run.push(byte as char);
        } else {
            flush_run(&mut text, &mut run);
        }
    }
    flush_run(&mut text, &mut run);

    ExtractionResult {
        character_count: text.chars().count(),
        page_count: count_pages(bytes),
        text,
    }
}

fn flush_run(text: &mut String, run: &mut String) {
    // Structural runs (object/dictionary syntax, header and trailer comments)
    // carry no prose.
    if run.len() >= MIN_RUN_LEN && !run.contains(['<', '/', '%']) {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(run);
    }
    run.clear();
}

fn count_pages(bytes: &[u8]) -> usize {
    let mut count = 0;
    for pattern in [b"/Type /Page".as_slice(), b"/Type/Page".as_slice()] {
        let mut offset = 0;
        while let Some(pos) = find(&bytes[offset..], pattern) {
            let end = offset + pos + pattern.len();
            // Skip "/Type /Pages", the page-tree node.
            if bytes.get(end) != Some(&b's') {
                count += 1;
            }
            offset = end;
        }
    }
    count
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn analyze_text(text: &str) -> Value {
    let words: Vec<&str> = text.split_whitespace().collect();
    let paragraphs = text.split("\n\n").filter(|p| !p.trim().is_empty()).count();

    let lower = text.to_lowercase();
    let technical_terms = ["microcontroller", "datasheet", "voltage", "circuit", "processor"];
    let categories: Vec<&str> = if technical_terms.iter().any(|t| lower.contains(t)) {
        vec!["technical_document", "datasheet"]
    } else if words.len() > 1000 {
        vec!["long_document"]
    } else {
        vec!["general_document"]
    };

    json!({
        "word_count": words.len(),
        "paragraph_count": paragraphs,
        "content_categories": categories,
    })
}
