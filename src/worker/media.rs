//! Media processing worker.
//!
//! One request channel serves four pipeline nodes (thumbnails for the image
//! branch; audio extraction, transcription, and summary for the video
//! branch). The request envelope is the bare job state, so the requested
//! operation is derived from the branch and the step of the node that ran
//! before it.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::job::{Branch, JobState};
use crate::worker::WorkerHandler;

/// Thumbnail sizes generated for the image branch.
const THUMBNAIL_SIZES: [(&str, u32); 3] = [("small", 128), ("medium", 512), ("large", 1024)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaTask {
    GenerateThumbnails,
    ExtractAudio,
    TranscribeAudio,
    GenerateVideoSummary,
}

fn dispatch(state: &JobState) -> Option<MediaTask> {
    match (state.branch, state.step.as_str()) {
        (Branch::Image, "route_workflow") => Some(MediaTask::GenerateThumbnails),
        (Branch::Video, "route_workflow") => Some(MediaTask::ExtractAudio),
        (Branch::Video, "extract_audio") => Some(MediaTask::TranscribeAudio),
        (Branch::Video, "transcribe_audio") => Some(MediaTask::GenerateVideoSummary),
        _ => None,
    }
}

pub struct MediaWorker;

#[async_trait]
impl WorkerHandler for MediaWorker {
    fn task_name(&self) -> &str {
        "media_processing"
    }

    async fn process(&self, mut state: JobState) -> anyhow::Result<JobState> {
        let Some(task) = dispatch(&state) else {
            anyhow::bail!(
                "no media task for branch '{}' at step '{}'",
                state.branch.as_str(),
                state.step
            );
        };

        match task {
            MediaTask::GenerateThumbnails => {
                let sizes: Vec<_> = THUMBNAIL_SIZES
                    .iter()
                    .map(|(name, px)| json!({ "name": name, "max_edge": px }))
                    .collect();
                state.merge_metadata(
                    "thumbnails",
                    json!({
                        "count": sizes.len(),
                        "sizes": sizes,
                        "generated_at": Utc::now().to_rfc3339(),
                    }),
                );
                state.step = "generate_thumbnails".to_string();
            }
            MediaTask::ExtractAudio => {
                state.merge_metadata(
                    "audio_extraction",
                    json!({
                        "format": "wav",
                        "source": state.file_path.clone(),
                        "extracted_at": Utc::now().to_rfc3339(),
                    }),
                );
                state.step = "extract_audio".to_string();
            }
            MediaTask::TranscribeAudio => {
                state.merge_metadata(
                    "transcription",
                    json!({
                        "source": "audio_extraction",
                        "transcribed_at": Utc::now().to_rfc3339(),
                    }),
                );
                state.step = "transcribe_audio".to_string();
            }
            MediaTask::GenerateVideoSummary => {
                state.merge_metadata(
                    "video_summary",
                    json!({
                        "inputs": ["audio_extraction", "transcription"],
                        "generated_at": Utc::now().to_rfc3339(),
                    }),
                );
                state.step = "generate_video_summary".to_string();
            }
        }

        state.touch();
        Ok(state)
    }
}
