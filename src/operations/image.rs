use super::{preview, HandlerFuture, Invocation, OperationContext};
use crate::ai::ImageGenerationRequest;
use crate::constants::{check_model, ModelKind, IMAGE_STEPS_RANGE, IMAGE_TIMEOUT_MINUTES_RANGE};
use crate::models::ImageParams;
use crate::poller::TaskPoller;
use crate::response::ImageGenerationResult;
use crate::validation::{validate_image_size, validate_prompt, validate_range};
use crate::Result;
use serde_json::Value;
use tokio::time::Instant;
use tracing::info;

pub fn execute<'a>(context: &'a OperationContext<'a>, item: &'a Invocation) -> HandlerFuture<'a> {
    Box::pin(text_to_image(context, item))
}

async fn text_to_image(context: &OperationContext<'_>, item: &Invocation) -> Result<Value> {
    let started = Instant::now();
    let params: ImageParams = item.parameters()?;

    validate_prompt(&params.prompt)?;
    validate_image_size(&params.size)?;
    validate_range("steps", params.steps, IMAGE_STEPS_RANGE)?;
    validate_range("timeout", params.timeout, IMAGE_TIMEOUT_MINUTES_RANGE)?;
    check_model(&params.model, ModelKind::Image);

    info!(
        "Starting text-to-image task - model: {}, prompt: {}",
        params.model,
        preview(&params.prompt, 50)
    );

    let request = ImageGenerationRequest {
        model: params.model.clone(),
        prompt: params.prompt.clone(),
        negative_prompt: Some(params.negative_prompt.clone()).filter(|p| !p.trim().is_empty()),
        size: Some(params.size.clone()),
        num_inference_steps: Some(params.steps),
        guidance_scale: Some(params.guidance_scale),
    };

    let task = context.service.generate_image(&request).await?;
    info!(
        "Text-to-image task submitted - task ID: {}, timeout: {} minute(s)",
        task.task_id, params.timeout
    );

    let outcome = TaskPoller::new(context.service, context.poll_settings)
        .wait_for_completion(&task.task_id, params.timeout, started)
        .await?;

    let result = ImageGenerationResult::new(outcome, &params, started.elapsed());
    info!(
        "Image generation succeeded - task ID: {}, elapsed: {}, images: {}, attempts: {}",
        result.task_id,
        result.processing_time,
        result.images.len(),
        result.attempts_used
    );

    Ok(serde_json::to_value(result)?)
}
