use super::{preview, HandlerFuture, Invocation, OperationContext};
use crate::ai::inline_image::InlineImage;
use crate::ai::{
    ChatCompletion, ChatCompletionRequest, ChatMessage, ChatMessageContent, MessagePart, Role,
};
use crate::constants::{check_model, ModelKind, MAX_TOKENS_RANGE, TEMPERATURE_RANGE};
use crate::models::{ImageSource, VisionParams};
use crate::response::{StreamResult, VisionChatResult, VisionImage};
use crate::validation::{require_binary, validate_image_url, validate_prompt, validate_range};
use crate::Result;
use serde_json::Value;
use tokio::time::Instant;
use tracing::info;

pub fn execute<'a>(context: &'a OperationContext<'a>, item: &'a Invocation) -> HandlerFuture<'a> {
    Box::pin(vision_chat(context, item))
}

/// Resolves the image to a URL the model can fetch, plus its output description.
fn resolve_image(params: &VisionParams, item: &Invocation) -> Result<(String, VisionImage)> {
    match params.image_source {
        ImageSource::Url => {
            validate_image_url(&params.image_url)?;
            Ok((
                params.image_url.clone(),
                VisionImage::Url(params.image_url.clone()),
            ))
        }
        ImageSource::Binary => {
            let binary = require_binary(&item.binary, &params.binary_property_name)?;
            let (mime_type, data_url) =
                InlineImage::encode(&binary.data, binary.mime_type.as_deref()).into_parts();
            Ok((
                data_url,
                VisionImage::Binary {
                    property: params.binary_property_name.clone(),
                    mime_type,
                    bytes: binary.data.len(),
                },
            ))
        }
    }
}

async fn vision_chat(context: &OperationContext<'_>, item: &Invocation) -> Result<Value> {
    let started = Instant::now();
    let params: VisionParams = item.parameters()?;

    let (url, image) = resolve_image(&params, item)?;
    validate_prompt(&params.prompt)?;
    validate_range("temperature", params.temperature, TEMPERATURE_RANGE)?;
    validate_range("maxTokens", params.max_tokens, MAX_TOKENS_RANGE)?;
    check_model(&params.model, ModelKind::Vision);

    match &image {
        VisionImage::Url(url) => info!(
            "Starting vision chat - model: {}, image: {}",
            params.model,
            preview(url, 50)
        ),
        VisionImage::Binary {
            property, bytes, ..
        } => info!(
            "Starting vision chat - model: {}, image: binary.{}, {} bytes",
            params.model, property, bytes
        ),
    }

    let request = ChatCompletionRequest {
        model: params.model,
        messages: vec![ChatMessage {
            role: Role::User,
            content: Some(ChatMessageContent::Parts(vec![
                MessagePart::text(params.prompt),
                MessagePart::image_url(url),
            ])),
        }],
        temperature: Some(params.temperature),
        max_tokens: Some(params.max_tokens),
        stream: None,
    };

    match context.service.chat_completion(&request).await? {
        ChatCompletion::Complete(response) => {
            let result = VisionChatResult::new(response, image, started.elapsed());
            info!(
                "Vision chat finished - elapsed: {}, tokens: {}",
                result.chat.processing_time, result.chat.total_tokens
            );
            Ok(serde_json::to_value(result)?)
        }
        ChatCompletion::Streamed(body) => Ok(serde_json::to_value(StreamResult::new(body))?),
    }
}
