//! ModelScope API-Inference integration
//!
//! Exposes the three remote operations the node relies on (chat completion,
//! asynchronous image submission, task status lookup) behind
//! [`ModelScopeService`], with an HTTP implementation and a scripted mock.

pub mod client;
mod errors;
pub mod inline_image;
pub mod mock;
pub mod types;

pub use client::{ClientConfig, ModelScopeClient};
pub use mock::MockModelScopeClient;
pub use types::{
    ChatCompletion, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ChatMessageContent, ImageGenerationRequest, ImageTask, MessagePart, Role, TaskStatus,
    TaskStatusResponse, Usage,
};

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ModelScopeService: Send + Sync {
    /// One synchronous chat completion call; never retried.
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion>;

    /// Submits an asynchronous image job and returns its task id.
    async fn generate_image(&self, request: &ImageGenerationRequest) -> Result<ImageTask>;

    /// Read-only status lookup, safe to repeat at any cadence.
    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse>;
}

/// Lets one client (or mock) be shared by several dispatchers.
#[async_trait]
impl<T: ModelScopeService + ?Sized> ModelScopeService for Arc<T> {
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        (**self).chat_completion(request).await
    }

    async fn generate_image(&self, request: &ImageGenerationRequest) -> Result<ImageTask> {
        (**self).generate_image(request).await
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse> {
        (**self).get_task_status(task_id).await
    }
}
