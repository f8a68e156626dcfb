//! Static catalogue of ModelScope endpoints, models, polling knobs and
//! host-facing defaults.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api-inference.modelscope.cn/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const ASYNC_MODE_HEADER: &str = "X-ModelScope-Async-Mode";
pub const TASK_TYPE_HEADER: &str = "X-ModelScope-Task-Type";
pub const TASK_TYPE_IMAGE_GENERATION: &str = "image_generation";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const MAX_POLL_INTERVAL_MS: u64 = 15_000;
pub const POLL_INTERVAL_MULTIPLIER: f64 = 1.3;
pub const POLL_ATTEMPTS_PER_MINUTE: u32 = 12;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_IMAGE_STEPS: u32 = 30;
pub const DEFAULT_IMAGE_TIMEOUT_MINUTES: u32 = 5;
pub const DEFAULT_GUIDANCE_SCALE: f32 = 7.5;
pub const DEFAULT_BINARY_PROPERTY: &str = "data";
pub const DEFAULT_VISION_PROMPT: &str = "Describe the content of this image";

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 8192);
pub const IMAGE_STEPS_RANGE: (u32, u32) = (10, 100);
pub const IMAGE_TIMEOUT_MINUTES_RANGE: (u32, u32) = (1, 10);

pub const IMAGE_SIZES: &[&str] = &["1024x1024", "1024x768", "768x1024", "1152x896", "896x1152"];

pub const LLM_MODELS: &[&str] = &[
    "ZhipuAI/GLM-5",
    "MiniMax/MiniMax-M2.5",
    "moonshotai/Kimi-K2.5",
    "Qwen/Qwen3.5-397B-A17B",
    "ZhipuAI/GLM-4.7-Flash",
    "deepseek-ai/DeepSeek-V3.2",
    "deepseek-ai/DeepSeek-R1-0528",
    "XiaomiMiMo/MiMo-V2-Flash",
    "Qwen/Qwen3-235B-A22B-Instruct-2507",
    "Qwen/Qwen3-235B-A22B-Thinking-2507",
    "Qwen/Qwen3-Next-80B-A3B-Instruct",
    "Qwen/Qwen3-Coder-480B-A35B-Instruct",
    "Qwen/Qwen3-Next-80B-A3B-Thinking",
];

pub const VISION_MODELS: &[&str] = &[
    "Qwen/Qwen3-VL-235B-A22B-Instruct",
    "Qwen/Qwen3-VL-30B-A3B-Instruct",
];

pub const IMAGE_MODELS: &[&str] = &[
    "Qwen/Qwen-Image",
    "Qwen/Qwen-Image-2512",
    "Tongyi-MAI/Z-Image-Turbo",
];

pub const DEFAULT_LLM_MODEL: &str = "ZhipuAI/GLM-5";
pub const DEFAULT_VISION_MODEL: &str = "Qwen/Qwen3-VL-30B-A3B-Instruct";
pub const DEFAULT_IMAGE_MODEL: &str = "Qwen/Qwen-Image";

/// Family a model identifier belongs to in the supported catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Llm,
    Vision,
    Image,
}

impl ModelKind {
    /// Looks up `model` in the catalogue.
    pub fn of(model: &str) -> Option<Self> {
        [Self::Llm, Self::Vision, Self::Image]
            .into_iter()
            .find(|kind| kind.models().contains(&model))
    }

    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Self::Llm => LLM_MODELS,
            Self::Vision => VISION_MODELS,
            Self::Image => IMAGE_MODELS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Vision => "vision",
            Self::Image => "image",
        }
    }
}

/// Logs a warning when `model` is outside the catalogue for `expected`.
///
/// The remote service adds models faster than this list is updated, so an
/// unknown id is still sent.
pub fn check_model(model: &str, expected: ModelKind) {
    match ModelKind::of(model) {
        Some(kind) if kind == expected => {}
        Some(kind) => tracing::warn!(
            "Model {} is a {} model, used for a {} operation",
            model,
            kind.name(),
            expected.name()
        ),
        None => tracing::warn!("Model {} is not in the supported {} list", model, expected.name()),
    }
}
