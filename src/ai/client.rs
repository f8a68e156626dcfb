use super::errors;
use super::types::{
    ChatCompletion, ChatCompletionRequest, ImageGenerationRequest, ImageGenerationResponse,
    ImageTask, TaskStatusResponse,
};
use super::ModelScopeService;
use crate::constants::{
    ASYNC_MODE_HEADER, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, TASK_TYPE_HEADER,
    TASK_TYPE_IMAGE_GENERATION,
};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Connection settings shared read-only by every call of one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    api_token: String,
    request_timeout: Duration,
}

impl ClientConfig {
    /// Validates the credential up front; a blank token never reaches the network.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::Authentication(
                "ModelScope access token is not configured".to_string(),
            ));
        }

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// HTTP client for the ModelScope API-Inference endpoints.
pub struct ModelScopeClient {
    client: Client,
    config: ClientConfig,
}

impl ModelScopeClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::new_with_client(config, Client::builder().build()?))
    }

    /// Reuse an existing connection pool.
    pub fn new_with_client(config: ClientConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .timeout(self.config.request_timeout)
            .bearer_auth(&self.config.api_token)
    }

    async fn send(&self, context: &'static str, builder: RequestBuilder) -> Result<String> {
        let response = self.request(builder).send().await.map_err(|e| {
            tracing::error!("Failed to send {} request to ModelScope: {}", context, e);
            errors::from_transport(context, self.config.request_timeout, e)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| errors::from_transport(context, self.config.request_timeout, e))?;

        if !status.is_success() {
            tracing::error!("ModelScope {} error (status {}): {}", context, status, body);
            return Err(errors::from_response(context, status, &body));
        }

        Ok(body)
    }

    fn parse<Resp: DeserializeOwned>(context: &str, body: &str) -> Result<Resp> {
        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                "Failed to parse ModelScope {} response: {}\nBody: {}",
                context,
                e,
                body
            );
            Error::Serialization(e)
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

#[async_trait]
impl ModelScopeService for ModelScopeClient {
    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        tracing::debug!(
            "Sending chat completion request (model: {}, messages: {})",
            request.model,
            request.messages.len()
        );

        let context = "Chat completion";
        let body = self
            .send(context, self.client.post(self.url("/chat/completions")).json(request))
            .await?;

        if request.is_stream() {
            return Ok(ChatCompletion::Streamed(body));
        }

        Ok(ChatCompletion::Complete(Self::parse(context, &body)?))
    }

    async fn generate_image(&self, request: &ImageGenerationRequest) -> Result<ImageTask> {
        tracing::debug!("Submitting image generation task (model: {})", request.model);

        let context = "Image generation";
        let builder = self
            .client
            .post(self.url("/images/generations"))
            .header(ASYNC_MODE_HEADER, "true")
            .json(request);
        let body = self.send(context, builder).await?;
        let response: ImageGenerationResponse = Self::parse(context, &body)?;

        match response.task_id {
            Some(task_id) if !task_id.trim().is_empty() => Ok(ImageTask {
                task_id,
                status: response.status,
            }),
            _ => {
                tracing::error!("Image generation accepted without a task ID: {}", body);
                Err(Error::MissingTaskId)
            }
        }
    }

    async fn get_task_status(&self, task_id: &str) -> Result<TaskStatusResponse> {
        let context = "Task status";
        let builder = self
            .client
            .get(self.url(&format!("/tasks/{}", task_id)))
            .header(TASK_TYPE_HEADER, TASK_TYPE_IMAGE_GENERATION);
        let body = self.send(context, builder).await?;
        Self::parse(context, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{ChatMessage, Role, TaskStatus};
    use crate::error::ApiErrorKind;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer) -> ModelScopeClient {
        let config = ClientConfig::new("test-token")
            .unwrap()
            .with_base_url(server.uri());
        ModelScopeClient::new(config).unwrap()
    }

    fn chat_request(stream: Option<bool>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "ZhipuAI/GLM-5".to_string(),
            messages: vec![ChatMessage::new(Role::User, "hello")],
            temperature: Some(0.7),
            max_tokens: Some(2048),
            stream,
        }
    }

    fn image_request() -> ImageGenerationRequest {
        ImageGenerationRequest {
            model: "Qwen/Qwen-Image".to_string(),
            prompt: "a red fox".to_string(),
            negative_prompt: None,
            size: Some("1024x1024".to_string()),
            num_inference_steps: Some(30),
            guidance_scale: Some(7.5),
        }
    }

    #[test]
    fn test_blank_token_fails_before_any_request() {
        let err = ClientConfig::new("   ").unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        let err = ClientConfig::new("").unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = ClientConfig::new("t")
            .unwrap()
            .with_base_url("http://localhost:1234/v1/");
        assert_eq!(config.base_url(), "http://localhost:1234/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_chat_completion_parses_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_string_contains("\"max_tokens\":2048"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "ZhipuAI/GLM-5",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "Hi there" },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server);
        let completion = client.chat_completion(&chat_request(None)).await.unwrap();

        match completion {
            ChatCompletion::Complete(response) => {
                assert_eq!(response.first_text(), Some("Hi there"));
                assert_eq!(response.usage.unwrap().total_tokens, 7);
            }
            ChatCompletion::Streamed(_) => panic!("expected a complete response"),
        }
    }

    #[tokio::test]
    async fn test_post_sends_single_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&server)
            .await;

        let client = make_client(&server);
        client.chat_completion(&chat_request(None)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_types: Vec<_> = requests[0].headers.get_all("content-type").iter().collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0], "application/json");
    }

    #[tokio::test]
    async fn test_chat_completion_stream_returns_raw_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("\"stream\":true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("data: {\"x\":1}\n\ndata: [DONE]\n\n"),
            )
            .mount(&server)
            .await;

        let client = make_client(&server);
        let completion = client
            .chat_completion(&chat_request(Some(true)))
            .await
            .unwrap();
        assert_eq!(
            completion,
            ChatCompletion::Streamed("data: {\"x\":1}\n\ndata: [DONE]\n\n".to_string())
        );
    }

    #[tokio::test]
    async fn test_rate_limit_without_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = make_client(&server);
        let err = client.chat_completion(&chat_request(None)).await.unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimitExceeded));
        assert!(err.to_string().contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_generate_image_sends_async_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(header(ASYNC_MODE_HEADER, "true"))
            .and(body_string_contains("\"num_inference_steps\":30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-123",
                "status": "PENDING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server);
        let task = client.generate_image(&image_request()).await.unwrap();
        assert_eq!(task.task_id, "task-123");
        assert_eq!(task.status.as_deref(), Some("PENDING"));
    }

    #[tokio::test]
    async fn test_generate_image_without_task_id_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "OK" })),
            )
            .mount(&server)
            .await;

        let client = make_client(&server);
        let err = client.generate_image(&image_request()).await.unwrap_err();
        assert!(matches!(err, Error::MissingTaskId));
    }

    #[tokio::test]
    async fn test_get_task_status_sends_task_type_header() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tasks/task-123"))
            .and(header(TASK_TYPE_HEADER, TASK_TYPE_IMAGE_GENERATION))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-123",
                "task_status": "RUNNING"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = make_client(&server);
        let first = client.get_task_status("task-123").await.unwrap();
        let second = client.get_task_status("task-123").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.task_status, TaskStatus::Running);
    }

    #[tokio::test]
    async fn test_unrecognized_task_status_parses() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tasks/task-queued"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "task_id": "task-queued",
                "task_status": "QUEUED"
            })))
            .mount(&server)
            .await;

        let client = make_client(&server);
        let status = client.get_task_status("task-queued").await.unwrap();
        assert_eq!(status.task_status, TaskStatus::Unknown);
    }

    #[tokio::test]
    async fn test_request_deadline_surfaces_as_request_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tasks/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({
                        "task_id": "slow",
                        "task_status": "RUNNING"
                    })),
            )
            .mount(&server)
            .await;

        let config = ClientConfig::new("test-token")
            .unwrap()
            .with_base_url(server.uri())
            .with_request_timeout(Duration::from_millis(50));
        let client = ModelScopeClient::new(config).unwrap();

        let err = client.get_task_status("slow").await.unwrap_err();
        assert!(matches!(
            err,
            Error::RequestTimeout {
                context: "Task status",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = ClientConfig::new("test-token")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let client = ModelScopeClient::new(config).unwrap();

        let err = client.get_task_status("t").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
