//! Environment-driven configuration.
//!
//! Everything is overridable via environment variables (a `.env` file is
//! honored at startup). Channel names default to the values the worker
//! services ship with, so a bare deployment works without any configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for quick workers (validation, metadata).
pub const QUICK_WORKER_TIMEOUT_SECS: u64 = 30;

/// Default timeout for heavy workers (text extraction, AI, media).
pub const HEAVY_WORKER_TIMEOUT_SECS: u64 = 300;

/// Request/callback channel pair plus invocation deadline for one worker.
#[derive(Debug, Clone)]
pub struct WorkerChannelConfig {
    pub request_channel: String,
    pub callback_channel: String,
    pub timeout: Duration,
}

impl WorkerChannelConfig {
    fn from_env(prefix: &str, request: &str, callback: &str, default_timeout: u64) -> Self {
        let timeout = env_var(&format!("{prefix}_TIMEOUT_SECS"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_timeout);
        Self {
            request_channel: env_var(&format!("{prefix}_QUEUE")).unwrap_or_else(|| request.into()),
            callback_channel: env_var(&format!("{prefix}_CALLBACK_QUEUE"))
                .unwrap_or_else(|| callback.into()),
            timeout: Duration::from_secs(timeout),
        }
    }
}

/// Channel configuration for every worker the orchestrator talks to.
#[derive(Debug, Clone)]
pub struct WorkerChannels {
    pub validation: WorkerChannelConfig,
    pub metadata: WorkerChannelConfig,
    pub text: WorkerChannelConfig,
    pub ai: WorkerChannelConfig,
    pub media: WorkerChannelConfig,
}

impl Default for WorkerChannels {
    fn default() -> Self {
        Self {
            validation: WorkerChannelConfig {
                request_channel: "validation_queue".into(),
                callback_channel: "validation_callback_queue".into(),
                timeout: Duration::from_secs(QUICK_WORKER_TIMEOUT_SECS),
            },
            metadata: WorkerChannelConfig {
                request_channel: "extract_metadata_queue".into(),
                callback_channel: "extract_metadata_callback_queue".into(),
                timeout: Duration::from_secs(QUICK_WORKER_TIMEOUT_SECS),
            },
            text: WorkerChannelConfig {
                request_channel: "extract_text_queue".into(),
                callback_channel: "extract_text_callback_queue".into(),
                timeout: Duration::from_secs(HEAVY_WORKER_TIMEOUT_SECS),
            },
            ai: WorkerChannelConfig {
                request_channel: "ai_queue".into(),
                callback_channel: "ai_callback_queue".into(),
                timeout: Duration::from_secs(HEAVY_WORKER_TIMEOUT_SECS),
            },
            media: WorkerChannelConfig {
                request_channel: "media_processing_queue".into(),
                callback_channel: "media_processing_callback_queue".into(),
                timeout: Duration::from_secs(HEAVY_WORKER_TIMEOUT_SECS),
            },
        }
    }
}

/// Constraints applied by the validation worker.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Allowed content types mapped to their acceptable file extensions.
    pub allowed_types: BTreeMap<String, Vec<String>>,
    /// Upper bound on file size in bytes.
    pub max_file_size: u64,
    /// Reject checksums whose last hex digit is `'0'`.
    ///
    /// A development sentinel inherited from the upstream system; leave it on
    /// in test environments, disable it in production.
    pub reject_trailing_zero_checksum: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let allowed_types = [
            ("application/pdf", vec![".pdf"]),
            ("image/jpeg", vec![".jpg", ".jpeg"]),
            ("image/png", vec![".png"]),
            ("image/gif", vec![".gif"]),
            ("image/webp", vec![".webp"]),
            ("video/mp4", vec![".mp4"]),
            ("video/avi", vec![".avi"]),
            ("video/mov", vec![".mov"]),
            ("video/webm", vec![".webm"]),
        ]
        .into_iter()
        .map(|(t, exts)| (t.to_string(), exts.into_iter().map(String::from).collect()))
        .collect();

        Self {
            allowed_types,
            max_file_size: 100 * 1024 * 1024,
            reject_trailing_zero_checksum: true,
        }
    }
}

impl ValidationConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_var("MAX_FILE_SIZE") {
            if let Ok(n) = v.parse() {
                config.max_file_size = n;
            }
        }
        if let Some(v) = env_var("REJECT_TRAILING_ZERO_CHECKSUM") {
            config.reject_trailing_zero_checksum = v.to_lowercase() == "true";
        }
        config
    }
}

/// Top-level settings for either role (orchestrator or worker).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Connection target for pub/sub and the job-state KV.
    pub broker_url: String,
    /// Bind address for the orchestrator HTTP surface.
    pub http_host: String,
    pub http_port: u16,
    /// Health port for worker processes.
    pub worker_health_port: u16,
    /// Whether the `command_queue` listener runs.
    pub listener_enabled: bool,
    /// Channel carrying `JOB_CREATED` events.
    pub command_channel: String,
    pub workers: WorkerChannels,
    pub validation: ValidationConfig,
    /// Directory for derived artifacts (extracted text, thumbnails).
    pub processed_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker_url: "redis://127.0.0.1:6379".into(),
            http_host: "127.0.0.1".into(),
            http_port: 9000,
            worker_health_port: 9100,
            listener_enabled: true,
            command_channel: "command_queue".into(),
            workers: WorkerChannels::default(),
            validation: ValidationConfig::default(),
            processed_dir: PathBuf::from("storage/processed"),
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            broker_url: env_var("BROKER_URL")
                .or_else(|| env_var("REDIS_URL"))
                .unwrap_or(defaults.broker_url),
            http_host: env_var("HTTP_HOST").unwrap_or(defaults.http_host),
            http_port: env_var("HTTP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_port),
            worker_health_port: env_var("WORKER_HEALTH_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.worker_health_port),
            listener_enabled: env_var("USE_COMMAND_LISTENER")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.listener_enabled),
            command_channel: env_var("COMMAND_CHANNEL").unwrap_or(defaults.command_channel),
            workers: WorkerChannels {
                validation: WorkerChannelConfig::from_env(
                    "VALIDATION",
                    "validation_queue",
                    "validation_callback_queue",
                    QUICK_WORKER_TIMEOUT_SECS,
                ),
                metadata: WorkerChannelConfig::from_env(
                    "EXTRACT_METADATA",
                    "extract_metadata_queue",
                    "extract_metadata_callback_queue",
                    QUICK_WORKER_TIMEOUT_SECS,
                ),
                text: WorkerChannelConfig::from_env(
                    "EXTRACT_TEXT",
                    "extract_text_queue",
                    "extract_text_callback_queue",
                    HEAVY_WORKER_TIMEOUT_SECS,
                ),
                ai: WorkerChannelConfig::from_env(
                    "AI",
                    "ai_queue",
                    "ai_callback_queue",
                    HEAVY_WORKER_TIMEOUT_SECS,
                ),
                media: WorkerChannelConfig::from_env(
                    "MEDIA_PROCESSING",
                    "media_processing_queue",
                    "media_processing_callback_queue",
                    HEAVY_WORKER_TIMEOUT_SECS,
                ),
            },
            validation: ValidationConfig::from_env(),
            processed_dir: env_var("PROCESSED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channel_names() {
        let channels = WorkerChannels::default();
        assert_eq!(channels.validation.request_channel, "validation_queue");
        assert_eq!(
            channels.media.callback_channel,
            "media_processing_callback_queue"
        );
        assert_eq!(
            channels.validation.timeout,
            Duration::from_secs(QUICK_WORKER_TIMEOUT_SECS)
        );
        assert_eq!(
            channels.text.timeout,
            Duration::from_secs(HEAVY_WORKER_TIMEOUT_SECS)
        );
    }

    #[test]
    fn default_validation_allows_pdf() {
        let config = ValidationConfig::default();
        assert!(config.allowed_types.contains_key("application/pdf"));
        assert!(config.reject_trailing_zero_checksum);
    }
}
