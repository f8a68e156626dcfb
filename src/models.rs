//! Data models and structures
//!
//! Defines the runtime configuration and the per-operation parameter sets the
//! host hands over as a JSON parameter bag.

use crate::ai::{ChatMessage, Role};
use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_BINARY_PROPERTY, DEFAULT_GUIDANCE_SCALE, DEFAULT_IMAGE_MODEL,
    DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_STEPS, DEFAULT_IMAGE_TIMEOUT_MINUTES, DEFAULT_LLM_MODEL,
    DEFAULT_MAX_TOKENS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEMPERATURE, DEFAULT_VISION_MODEL,
    DEFAULT_VISION_PROMPT,
};
use crate::poller::BudgetMode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Canned instruction prefixed to the first user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageTemplate {
    #[default]
    Custom,
    Code,
    Analysis,
    Translation,
}

impl MessageTemplate {
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::Custom => None,
            Self::Code => Some("Please generate code for the following feature:"),
            Self::Analysis => Some("Please analyze the following text:"),
            Self::Translation => Some("Please translate the following content into Chinese:"),
        }
    }

    /// Prefixes the first user message; other messages are left untouched.
    pub fn apply(&self, messages: &mut [MessageInput]) {
        let Some(prefix) = self.prefix() else {
            return;
        };
        if let Some(first_user) = messages.iter_mut().find(|m| m.role == Role::User) {
            first_user.content = format!("{}\n{}", prefix, first_user.content);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInput {
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl From<MessageInput> for ChatMessage {
    fn from(input: MessageInput) -> Self {
        ChatMessage::new(input.role, input.content)
    }
}

fn default_role() -> Role {
    Role::User
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_vision_model() -> String {
    DEFAULT_VISION_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_size() -> String {
    DEFAULT_IMAGE_SIZE.to_string()
}

fn default_steps() -> u32 {
    DEFAULT_IMAGE_STEPS
}

fn default_timeout_minutes() -> u32 {
    DEFAULT_IMAGE_TIMEOUT_MINUTES
}

fn default_guidance_scale() -> f32 {
    DEFAULT_GUIDANCE_SCALE
}

fn default_binary_property() -> String {
    DEFAULT_BINARY_PROPERTY.to_string()
}

fn default_vision_prompt() -> String {
    DEFAULT_VISION_PROMPT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParams {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<MessageInput>,
    #[serde(default)]
    pub message_template: MessageTemplate,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    #[default]
    Url,
    Binary,
}

impl ImageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Binary => "binary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionParams {
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default)]
    pub image_source: ImageSource,
    #[serde(default)]
    pub image_url: String,
    #[serde(default = "default_binary_property")]
    pub binary_property_name: String,
    #[serde(default = "default_vision_prompt")]
    pub prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    #[serde(default = "default_image_model")]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Poll budget in minutes.
    #[serde(default = "default_timeout_minutes")]
    pub timeout: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
}

/// Raw attachment supplied by the host alongside an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryData {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl BinaryData {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            mime_type: None,
            data,
        }
    }

    pub fn with_mime_type(mut self, mime_type: String) -> Self {
        self.mime_type = Some(mime_type);
        self
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_token: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll_budget: BudgetMode,
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads variables from an explicit dotenv file, then the environment.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        dotenvy::from_path(path)
            .map_err(|e| Error::Config(format!("Failed to load {}: {}", path.display(), e)))?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_token = lookup("MODELSCOPE_API_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                Error::Authentication("MODELSCOPE_API_TOKEN is not set".to_string())
            })?;

        let base_url = lookup("MODELSCOPE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let request_timeout = match lookup("MODELSCOPE_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(Error::Config(
                        "MODELSCOPE_TIMEOUT_SECS must be at least 1".to_string(),
                    ))
                }
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    return Err(Error::Config(format!(
                        "MODELSCOPE_TIMEOUT_SECS is not a number: {}",
                        raw
                    )))
                }
            },
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let poll_budget = match lookup("MODELSCOPE_POLL_BUDGET").as_deref().map(str::trim) {
            None | Some("") | Some("attempts") => BudgetMode::Attempts,
            Some("wall-clock") => BudgetMode::WallClock,
            Some(other) => {
                return Err(Error::Config(format!(
                    "MODELSCOPE_POLL_BUDGET must be 'attempts' or 'wall-clock', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            api_token,
            base_url,
            request_timeout,
            poll_budget,
        })
    }
}
