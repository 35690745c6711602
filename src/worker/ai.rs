//! AI worker: image analysis for the image branch, document summarization
//! for the pdf branch.
//!
//! Like the media worker, its channel serves more than one pipeline node, so
//! the operation is derived from `(branch, step)`. The bodies here are
//! deliberately model-free: analysis is assembled from already-extracted
//! metadata, and the summary is extractive over the extracted text.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::job::{Branch, JobState};
use crate::worker::WorkerHandler;

/// Sentences kept in the extractive summary.
const SUMMARY_SENTENCES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AiTask {
    AnalyzeImage,
    SummarizeDocument,
}

fn dispatch(state: &JobState) -> Option<AiTask> {
    match (state.branch, state.step.as_str()) {
        (Branch::Image, "generate_thumbnails") => Some(AiTask::AnalyzeImage),
        (Branch::Pdf, "extract_text_done") => Some(AiTask::SummarizeDocument),
        _ => None,
    }
}

pub struct AiWorker;

#[async_trait]
impl WorkerHandler for AiWorker {
    fn task_name(&self) -> &str {
        "ai"
    }

    async fn process(&self, mut state: JobState) -> anyhow::Result<JobState> {
        let Some(task) = dispatch(&state) else {
            anyhow::bail!(
                "no ai task for branch '{}' at step '{}'",
                state.branch.as_str(),
                state.step
            );
        };

        match task {
            AiTask::AnalyzeImage => {
                let analysis = analyze_image(&state);
                state.merge_metadata("image_analysis", analysis);
                state.step = "analyze_image_with_ai".to_string();
            }
            AiTask::SummarizeDocument => {
                let summary = summarize_document(&state);
                state.merge_metadata("document_summary", summary);
                state.step = "summarize_document".to_string();
            }
        }

        state.touch();
        Ok(state)
    }
}

fn analyze_image(state: &JobState) -> Value {
    let subtype = state
        .content_type
        .strip_prefix("image/")
        .unwrap_or("unknown");
    let dimensions = state
        .metadata
        .get("file_metadata")
        .and_then(|m| m.get("dimensions"))
        .cloned();

    let description = match &dimensions {
        Some(d) => format!(
            "{} image, {}x{}",
            subtype,
            d.get("width").and_then(Value::as_u64).unwrap_or(0),
            d.get("height").and_then(Value::as_u64).unwrap_or(0),
        ),
        None => format!("{subtype} image"),
    };

    json!({
        "description": description,
        "dimensions": dimensions,
        "analyzed_at": Utc::now().to_rfc3339(),
    })
}

fn summarize_document(state: &JobState) -> Value {
    let source = state
        .metadata
        .get("text_extraction")
        .and_then(|t| t.get("text_preview"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let summary = extractive_summary(source, SUMMARY_SENTENCES);
    json!({
        "summary": summary,
        "method": "extractive",
        "source_characters": source.chars().count(),
        "generated_at": Utc::now().to_rfc3339(),
    })
}

/// First `limit` sentences of the text, whitespace-normalized.
fn extractive_summary(text: &str, limit: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut summary = String::new();
    let mut sentences = 0;

    for ch in normalized.chars() {
        summary.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            sentences += 1;
            if sentences == limit {
                break;
            }
        }
    }

    summary.trim().to_string()
}
