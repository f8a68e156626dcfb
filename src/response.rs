//! Output records handed back to the host, one per executed item.

use crate::ai::ChatCompletionResponse;
use crate::models::{ImageParams, ImageSource};
use crate::poller::PollOutcome;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;

const STATUS_COMPLETED: &str = "completed";

/// Whole seconds with a unit suffix, e.g. `"12s"`.
pub fn format_processing_time(elapsed: Duration) -> String {
    format!("{}s", elapsed.as_secs_f64().round() as u64)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionResult {
    #[serde(flatten)]
    pub response: ChatCompletionResponse,
    pub status: String,
    pub processing_time: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub completed_at: String,
}

impl ChatCompletionResult {
    pub fn new(response: ChatCompletionResponse, elapsed: Duration) -> Self {
        let usage = response.usage.clone().unwrap_or_default();
        Self {
            response,
            status: STATUS_COMPLETED.to_string(),
            processing_time: format_processing_time(elapsed),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            completed_at: timestamp(),
        }
    }
}

/// Marker record for a chat reply that was requested as a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamResult {
    pub stream: bool,
    pub response: String,
}

impl StreamResult {
    pub fn new(response: String) -> Self {
        Self {
            stream: true,
            response,
        }
    }
}

/// Where the analysed image came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionImage {
    Url(String),
    Binary {
        property: String,
        mime_type: String,
        bytes: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisionChatResult {
    #[serde(flatten)]
    pub chat: ChatCompletionResult,
    pub image_url: String,
    pub image_source: String,
    pub image_binary_property: String,
    pub image_mime_type: String,
    pub image_bytes: usize,
}

impl VisionChatResult {
    pub fn new(response: ChatCompletionResponse, image: VisionImage, elapsed: Duration) -> Self {
        let chat = ChatCompletionResult::new(response, elapsed);
        match image {
            VisionImage::Url(url) => Self {
                chat,
                image_url: url,
                image_source: ImageSource::Url.as_str().to_string(),
                image_binary_property: String::new(),
                image_mime_type: String::new(),
                image_bytes: 0,
            },
            VisionImage::Binary {
                property,
                mime_type,
                bytes,
            } => Self {
                chat,
                image_url: String::new(),
                image_source: ImageSource::Binary.as_str().to_string(),
                image_binary_property: property,
                image_mime_type: mime_type,
                image_bytes: bytes,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageGenerationResult {
    pub task_id: String,
    pub status: String,
    pub progress: u8,
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub negative_prompt: String,
    pub size: String,
    pub steps: u32,
    pub images: Vec<String>,
    pub created_at: String,
    pub processing_time: String,
    pub attempts_used: u32,
}

impl ImageGenerationResult {
    pub fn new(outcome: PollOutcome, params: &ImageParams, elapsed: Duration) -> Self {
        let images = outcome.images().to_vec();
        Self {
            task_id: outcome.task_id,
            status: STATUS_COMPLETED.to_string(),
            progress: 100,
            model: params.model.clone(),
            prompt: params.prompt.clone(),
            negative_prompt: params.negative_prompt.clone(),
            size: params.size.clone(),
            steps: params.steps,
            images,
            created_at: timestamp(),
            processing_time: format_processing_time(elapsed),
            attempts_used: outcome.attempts_used,
        }
    }
}

/// Record emitted in place of a result when the host continues on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub error: String,
    pub processing_time: String,
}

impl ErrorRecord {
    pub fn new(error: &crate::Error, elapsed: Duration) -> Self {
        Self {
            error: error.to_string(),
            processing_time: format_processing_time(elapsed),
        }
    }
}
