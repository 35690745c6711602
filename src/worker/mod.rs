//! Worker clients, the worker service skeleton, and the worker bodies.

mod ai;
mod client;
mod media;
mod metadata;
mod service;
mod text;
mod validation;

pub use ai::AiWorker;
pub use client::{WorkerClient, WorkerClientConfig};
pub use media::MediaWorker;
pub use metadata::MetadataWorker;
pub use service::{WorkerHandler, WorkerService, health_router};
pub use text::TextExtractionWorker;
pub use validation::ValidationWorker;
