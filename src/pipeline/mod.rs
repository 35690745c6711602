//! The static workflow graph.
//!
//! Nodes are pipeline steps; every node except `route_workflow` is a remote
//! worker invocation. The graph is acyclic with a single entry
//! (`validate_file`); reaching the sink is expressed as `None`.
//!
//! ```text
//! validate_file ─(failed)─► END
//!       │
//! extract_metadata ─► route_workflow ─┬─ image ─► generate_thumbnails ─► analyze_image_with_ai ─► END
//!                                     ├─ video ─► extract_audio ─► transcribe_audio ─► generate_video_summary ─► END
//!                                     └─ pdf ───► extract_text ─► summarize_document ─► END
//! ```

use crate::job::{Branch, JobState, JobStatus};

/// One step of the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    ValidateFile,
    ExtractMetadata,
    RouteWorkflow,
    GenerateThumbnails,
    AnalyzeImageWithAi,
    ExtractAudio,
    TranscribeAudio,
    GenerateVideoSummary,
    ExtractText,
    SummarizeDocument,
}

impl Node {
    /// The node's wire/step tag.
    pub fn name(&self) -> &'static str {
        match self {
            Node::ValidateFile => "validate_file",
            Node::ExtractMetadata => "extract_metadata",
            Node::RouteWorkflow => "route_workflow",
            Node::GenerateThumbnails => "generate_thumbnails",
            Node::AnalyzeImageWithAi => "analyze_image_with_ai",
            Node::ExtractAudio => "extract_audio",
            Node::TranscribeAudio => "transcribe_audio",
            Node::GenerateVideoSummary => "generate_video_summary",
            Node::ExtractText => "extract_text",
            Node::SummarizeDocument => "summarize_document",
        }
    }

    /// Where every run starts.
    pub fn entry() -> Self {
        Node::ValidateFile
    }

    /// The next node given the state the current node produced, or `None`
    /// at the sink. A failed state short-circuits every transition.
    pub fn successor(&self, state: &JobState) -> Option<Node> {
        if state.status == JobStatus::Failed {
            return None;
        }
        match self {
            Node::ValidateFile => Some(Node::ExtractMetadata),
            Node::ExtractMetadata => Some(Node::RouteWorkflow),
            Node::RouteWorkflow => match state.branch {
                Branch::Video => Some(Node::ExtractAudio),
                Branch::Pdf => Some(Node::ExtractText),
                Branch::Image | Branch::Unrouted => Some(Node::GenerateThumbnails),
            },
            Node::GenerateThumbnails => Some(Node::AnalyzeImageWithAi),
            Node::AnalyzeImageWithAi => None,
            Node::ExtractAudio => Some(Node::TranscribeAudio),
            Node::TranscribeAudio => Some(Node::GenerateVideoSummary),
            Node::GenerateVideoSummary => None,
            Node::ExtractText => Some(Node::SummarizeDocument),
            Node::SummarizeDocument => None,
        }
    }
}

/// The in-process routing node.
///
/// Picks the branch from the content type and stamps the routed status.
/// Unknown content types fall back to the image branch, preserving upstream
/// behavior; validation rejects unsupported types before routing is reached.
pub fn route_workflow(mut state: JobState) -> JobState {
    let content_type = state.content_type.as_str();
    state.branch = if content_type.starts_with("image/") {
        Branch::Image
    } else if content_type.starts_with("video/") {
        Branch::Video
    } else if content_type == "application/pdf" {
        Branch::Pdf
    } else {
        Branch::Image
    };
    state.status = JobStatus::routed_to(state.branch);
    state.step = Node::RouteWorkflow.name().to_string();
    state.touch();
    state
}
