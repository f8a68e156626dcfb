use modelscope_node::{
    ai::{ClientConfig, ModelScopeClient},
    error::ApiErrorKind,
    models::{BinaryData, Config},
    operations::{Dispatcher, Invocation, Operation, Resource},
    poller::{BudgetMode, PollSettings},
    Error,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{any, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_polling() -> PollSettings {
    PollSettings {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(20),
        multiplier: 1.3,
        attempts_per_minute: 12,
        budget_mode: BudgetMode::Attempts,
    }
}

fn dispatcher_for(server: &MockServer) -> Dispatcher {
    let config = ClientConfig::new("ms-test-token")
        .unwrap()
        .with_base_url(format!("{}/v1", server.uri()));
    let client = ModelScopeClient::new(config).unwrap();
    Dispatcher::new(Box::new(client), fast_polling()).unwrap()
}

async fn mount_submission(server: &MockServer, task_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("X-ModelScope-Async-Mode", "true"))
        .and(header("Authorization", "Bearer ms-test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": task_id,
            "status": "PENDING"
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_status_once(server: &MockServer, task_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/tasks/{}", task_id)))
        .and(header("X-ModelScope-Task-Type", "image_generation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

fn text_to_image(parameters: serde_json::Value) -> Invocation {
    Invocation::new(Resource::Image, Operation::TextToImage, parameters)
}

#[tokio::test]
async fn test_text_to_image_end_to_end() {
    let server = MockServer::start().await;
    mount_submission(&server, "task-fox").await;
    mount_status_once(&server, "task-fox", json!({ "task_id": "task-fox", "task_status": "PENDING" })).await;
    mount_status_once(&server, "task-fox", json!({ "task_id": "task-fox", "task_status": "RUNNING" })).await;
    mount_status_once(
        &server,
        "task-fox",
        json!({
            "task_id": "task-fox",
            "task_status": "SUCCEED",
            "output_images": ["http://x/1.png"]
        }),
    )
    .await;

    let dispatcher = dispatcher_for(&server);
    let value = dispatcher
        .execute(&text_to_image(json!({
            "model": "Qwen/Qwen-Image",
            "prompt": "a red fox"
        })))
        .await
        .unwrap();

    assert_eq!(value["status"], "completed");
    assert_eq!(value["attempts_used"], 3);
    assert_eq!(value["images"], json!(["http://x/1.png"]));
    assert_eq!(value["task_id"], "task-fox");
    assert!(chrono::DateTime::parse_from_rfc3339(value["created_at"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_failed_task_stops_polling() {
    let server = MockServer::start().await;
    mount_submission(&server, "task-bad").await;
    mount_status_once(&server, "task-bad", json!({ "task_id": "task-bad", "task_status": "RUNNING" })).await;
    mount_status_once(
        &server,
        "task-bad",
        json!({
            "task_id": "task-bad",
            "task_status": "FAILED",
            "error_message": "prompt rejected"
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/task-bad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": "task-bad",
            "task_status": "SUCCEED",
            "output_images": ["http://x/never.png"]
        })))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let err = dispatcher
        .execute(&text_to_image(json!({ "prompt": "a red fox" })))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TaskFailed(_)));
    assert_eq!(err.to_string(), "Image generation failed: prompt rejected");
}

#[tokio::test]
async fn test_poll_budget_exhaustion() {
    let server = MockServer::start().await;
    mount_submission(&server, "task-slow").await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/task-slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": "task-slow",
            "task_status": "RUNNING"
        })))
        .expect(12)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let err = dispatcher
        .execute(&text_to_image(json!({ "prompt": "a red fox", "timeout": 1 })))
        .await
        .unwrap_err();

    match &err {
        Error::PollTimeout {
            task_id,
            timeout_minutes,
            ..
        } => {
            assert_eq!(task_id, "task-slow");
            assert_eq!(*timeout_minutes, 1);
        }
        other => panic!("expected poll timeout, got {:?}", other),
    }
    assert!(err.to_string().contains("elapsed"));
}

#[tokio::test]
async fn test_empty_credential_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config {
        api_token: String::new(),
        base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
        poll_budget: BudgetMode::Attempts,
    };

    let err = match Dispatcher::from_config(&config) {
        Ok(_) => panic!("blank token must be rejected"),
        Err(e) => e,
    };
    assert!(matches!(err, Error::Authentication(_)));
}

#[tokio::test]
async fn test_chat_rate_limit_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let err = dispatcher
        .execute(&Invocation::new(
            Resource::Llm,
            Operation::ChatCompletion,
            json!({ "messages": [{ "role": "user", "content": "hello" }] }),
        ))
        .await
        .unwrap_err();

    assert_eq!(err.api_kind(), Some(ApiErrorKind::RateLimitExceeded));
    assert!(err.to_string().starts_with("Rate limit exceeded"));
}

#[tokio::test]
async fn test_submission_error_code_wins_over_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": "MODEL_NOT_AVAILABLE", "message": "model offline" }
        })))
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let err = dispatcher
        .execute(&text_to_image(json!({ "model": "Qwen/Qwen-Image-2512", "prompt": "a red fox" })))
        .await
        .unwrap_err();

    assert_eq!(err.api_kind(), Some(ApiErrorKind::ModelNotAvailable));
    assert_eq!(err.to_string(), "Model is unavailable or does not exist");
}

#[tokio::test]
async fn test_vision_chat_with_binary_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"type\":\"image_url\""))
        .and(body_string_contains("data:image/png;base64,iVBORw=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-vision",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "Qwen/Qwen3-VL-30B-A3B-Instruct",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "A tiny PNG header" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 100, "completion_tokens": 5, "total_tokens": 105 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let item = Invocation::parse("vision", "visionChat", json!({ "imageSource": "binary" }))
        .unwrap()
        .with_binary("data", BinaryData::new(vec![0x89, 0x50, 0x4E, 0x47]));

    let value = dispatcher.execute(&item).await.unwrap();
    assert_eq!(value["choices"][0]["message"]["content"], "A tiny PNG header");
    assert_eq!(value["image_mime_type"], "image/png");
    assert_eq!(value["total_tokens"], 105);
}

#[tokio::test]
async fn test_batch_continue_on_fail_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dispatcher = dispatcher_for(&server);
    let items = vec![
        Invocation::new(
            Resource::Llm,
            Operation::ChatCompletion,
            json!({ "messages": [{ "content": "hello" }] }),
        ),
        Invocation::new(Resource::Vision, Operation::VisionChat, json!({ "imageUrl": "" })),
    ];

    let results = dispatcher.execute_all(&items, true).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0]["error"],
        "Internal server error, please retry later"
    );
    assert_eq!(
        results[1]["error"],
        "Validation error: Image URL must not be empty"
    );
}
