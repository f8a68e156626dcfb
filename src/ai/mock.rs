use super::types::{
    ChatChoice, ChatCompletion, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    ImageGenerationRequest, ImageTask, Role, TaskStatusResponse, Usage,
};
use super::ModelScopeService;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted stand-in for the remote API.
///
/// Task statuses are served in order; once the script runs out the last
/// status is repeated (or `PENDING` when nothing was scripted).
pub struct MockModelScopeClient {
    chat_reply: Arc<Mutex<Option<String>>>,
    task_id: Arc<Mutex<Option<String>>>,
    statuses: Arc<Mutex<VecDeque<TaskStatusResponse>>>,
    last_status: Arc<Mutex<Option<TaskStatusResponse>>>,
    chat_requests: Arc<Mutex<Vec<ChatCompletionRequest>>>,
    image_requests: Arc<Mutex<Vec<ImageGenerationRequest>>>,
    status_calls: Arc<Mutex<usize>>,
}

impl MockModelScopeClient {
    pub fn new() -> Self {
        Self {
            chat_reply: Arc::new(Mutex::new(None)),
            task_id: Arc::new(Mutex::new(None)),
            statuses: Arc::new(Mutex::new(VecDeque::new())),
            last_status: Arc::new(Mutex::new(None)),
            chat_requests: Arc::new(Mutex::new(Vec::new())),
            image_requests: Arc::new(Mutex::new(Vec::new())),
            status_calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_chat_reply(self, reply: String) -> Self {
        *self.chat_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_task_id(self, task_id: String) -> Self {
        *self.task_id.lock().unwrap() = Some(task_id);
        self
    }

    pub fn with_status(self, status: TaskStatusResponse) -> Self {
        self.statuses.lock().unwrap().push_back(status);
        self
    }

    pub fn with_statuses(self, statuses: impl IntoIterator<Item = TaskStatusResponse>) -> Self {
        self.statuses.lock().unwrap().extend(statuses);
        self
    }

    pub fn chat_requests(&self) -> Vec<ChatCompletionRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn image_requests(&self) -> Vec<ImageGenerationRequest> {
        self.image_requests.lock().unwrap().clone()
    }

    pub fn get_status_call_count(&self) -> usize {
        *self.status_calls.lock().unwrap()
    }

    pub fn get_call_count(&self) -> usize {
        self.chat_requests.lock().unwrap().len()
            + self.image_requests.lock().unwrap().len()
            + self.get_status_call_count()
    }
}

impl Default for MockModelScopeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelScopeService for MockModelScopeClient {
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        self.chat_requests.lock().unwrap().push(request.clone());

        let reply = self
            .chat_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("Mock reply to {} message(s)", request.messages.len()));

        if request.is_stream() {
            return Ok(ChatCompletion::Streamed(format!(
                "data: {}\n\ndata: [DONE]\n\n",
                serde_json::json!({ "choices": [{ "delta": { "content": reply } }] })
            )));
        }

        Ok(ChatCompletion::Complete(ChatCompletionResponse {
            id: "chatcmpl-mock".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: request.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::new(Role::Assistant, reply),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }))
    }

    async fn generate_image(&self, request: &ImageGenerationRequest) -> Result<ImageTask> {
        self.image_requests.lock().unwrap().push(request.clone());

        let task_id = self
            .task_id
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if task_id.trim().is_empty() {
            return Err(Error::MissingTaskId);
        }

        Ok(ImageTask {
            task_id,
            status: Some("PENDING".to_string()),
        })
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse> {
        *self.status_calls.lock().unwrap() += 1;

        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last_status.lock().unwrap();
        let status = match next {
            Some(status) => status,
            None => last
                .clone()
                .unwrap_or_else(|| TaskStatusResponse::pending(task_id)),
        };
        *last = Some(status.clone());

        Ok(TaskStatusResponse {
            task_id: task_id.to_string(),
            ..status
        })
    }
}
