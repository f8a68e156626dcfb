use super::{HandlerFuture, Invocation, OperationContext};
use crate::ai::{ChatCompletion, ChatCompletionRequest, ChatMessage};
use crate::constants::{check_model, ModelKind, MAX_TOKENS_RANGE, TEMPERATURE_RANGE};
use crate::models::ChatParams;
use crate::response::{ChatCompletionResult, StreamResult};
use crate::validation::{validate_messages, validate_range};
use crate::Result;
use serde_json::Value;
use tokio::time::Instant;
use tracing::info;

pub fn execute<'a>(context: &'a OperationContext<'a>, item: &'a Invocation) -> HandlerFuture<'a> {
    Box::pin(chat_completion(context, item))
}

async fn chat_completion(context: &OperationContext<'_>, item: &Invocation) -> Result<Value> {
    let started = Instant::now();
    let mut params: ChatParams = item.parameters()?;

    let raw: Vec<ChatMessage> = params.messages.iter().cloned().map(Into::into).collect();
    validate_messages(&raw)?;
    validate_range("temperature", params.temperature, TEMPERATURE_RANGE)?;
    validate_range("maxTokens", params.max_tokens, MAX_TOKENS_RANGE)?;
    check_model(&params.model, ModelKind::Llm);

    params.message_template.apply(&mut params.messages);
    let messages: Vec<ChatMessage> = params.messages.into_iter().map(Into::into).collect();

    info!(
        "Starting chat completion - model: {}, messages: {}",
        params.model,
        messages.len()
    );

    let request = ChatCompletionRequest {
        model: params.model,
        messages,
        temperature: Some(params.temperature),
        max_tokens: Some(params.max_tokens),
        stream: Some(params.stream),
    };

    match context.service.chat_completion(&request).await? {
        ChatCompletion::Streamed(body) => {
            info!("Chat completion streamed ({} bytes)", body.len());
            Ok(serde_json::to_value(StreamResult::new(body))?)
        }
        ChatCompletion::Complete(response) => {
            let result = ChatCompletionResult::new(response, started.elapsed());
            info!(
                "Chat completion finished - elapsed: {}, tokens: {}",
                result.processing_time, result.total_tokens
            );
            Ok(serde_json::to_value(result)?)
        }
    }
}
