use anyhow::{bail, Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use modelscope_node::ai::Role;
use modelscope_node::constants::{
    ModelKind, DEFAULT_GUIDANCE_SCALE, DEFAULT_IMAGE_MODEL, DEFAULT_IMAGE_SIZE,
    DEFAULT_IMAGE_STEPS, DEFAULT_IMAGE_TIMEOUT_MINUTES, DEFAULT_LLM_MODEL, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE, DEFAULT_VISION_MODEL, DEFAULT_VISION_PROMPT, IMAGE_SIZES,
};
use modelscope_node::models::{BinaryData, Config, MessageInput, MessageTemplate};
use modelscope_node::operations::{Dispatcher, Invocation, Operation, Resource};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "modelscope-node")]
#[command(about = "Run ModelScope chat, vision and text-to-image operations")]
struct CliArgs {
    /// Load environment variables from this file instead of `.env`.
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat completion with a language model.
    Chat(ChatArgs),
    /// Ask a vision model about an image.
    Vision(VisionArgs),
    /// Generate images from a text prompt.
    Image(ImageArgs),
    /// List the supported models.
    Models,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long, default_value = DEFAULT_LLM_MODEL)]
    model: String,
    /// Message as `role:content` (role is system, user or assistant). Repeatable.
    #[arg(long = "message", short, required = true, value_parser = parse_message)]
    messages: Vec<MessageInput>,
    #[arg(long, default_value = "custom", value_parser = parse_template)]
    template: MessageTemplate,
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
    #[arg(long)]
    stream: bool,
}

#[derive(Debug, Args)]
struct VisionArgs {
    #[arg(long, default_value = DEFAULT_VISION_MODEL)]
    model: String,
    #[arg(long, conflicts_with = "image_file", required_unless_present = "image_file")]
    image_url: Option<String>,
    #[arg(long, value_name = "PATH")]
    image_file: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_VISION_PROMPT)]
    prompt: String,
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
}

#[derive(Debug, Args)]
struct ImageArgs {
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    model: String,
    #[arg(long)]
    prompt: String,
    #[arg(long, default_value = "")]
    negative_prompt: String,
    #[arg(
        long,
        default_value = DEFAULT_IMAGE_SIZE,
        value_parser = PossibleValuesParser::new(IMAGE_SIZES)
    )]
    size: String,
    #[arg(long, default_value_t = DEFAULT_IMAGE_STEPS)]
    steps: u32,
    /// Poll budget in minutes.
    #[arg(long, default_value_t = DEFAULT_IMAGE_TIMEOUT_MINUTES)]
    timeout: u32,
    #[arg(long, default_value_t = DEFAULT_GUIDANCE_SCALE)]
    guidance_scale: f32,
}

fn parse_message(input: &str) -> std::result::Result<MessageInput, String> {
    let (role, content) = input
        .split_once(':')
        .ok_or_else(|| format!("Invalid message '{}'. Expected role:content", input))?;
    let role = match role.trim() {
        "system" => Role::System,
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => return Err(format!("Unknown role '{}'", other)),
    };
    Ok(MessageInput {
        role,
        content: content.to_string(),
    })
}

fn parse_template(input: &str) -> std::result::Result<MessageTemplate, String> {
    serde_json::from_value(json!(input)).map_err(|_| {
        format!(
            "Unknown template '{}'. Expected custom, code, analysis or translation",
            input
        )
    })
}

async fn build_invocation(command: Command) -> Result<Invocation> {
    let invocation = match command {
        Command::Chat(args) => Invocation::new(
            Resource::Llm,
            Operation::ChatCompletion,
            json!({
                "model": args.model,
                "messages": args.messages,
                "messageTemplate": args.template,
                "temperature": args.temperature,
                "maxTokens": args.max_tokens,
                "stream": args.stream,
            }),
        ),
        Command::Vision(args) => {
            let mut parameters = json!({
                "model": args.model,
                "prompt": args.prompt,
                "temperature": args.temperature,
                "maxTokens": args.max_tokens,
            });
            match (args.image_url, args.image_file) {
                (Some(url), _) => {
                    parameters["imageSource"] = json!("url");
                    parameters["imageUrl"] = json!(url);
                    Invocation::new(Resource::Vision, Operation::VisionChat, parameters)
                }
                (None, Some(path)) => {
                    let bytes = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    parameters["imageSource"] = json!("binary");
                    Invocation::new(Resource::Vision, Operation::VisionChat, parameters)
                        .with_binary("data", BinaryData::new(bytes))
                }
                (None, None) => bail!("Either --image-url or --image-file is required"),
            }
        }
        Command::Image(args) => Invocation::new(
            Resource::Image,
            Operation::TextToImage,
            json!({
                "model": args.model,
                "prompt": args.prompt,
                "negativePrompt": args.negative_prompt,
                "size": args.size,
                "steps": args.steps,
                "timeout": args.timeout,
                "guidanceScale": args.guidance_scale,
            }),
        ),
        Command::Models => bail!("models does not run an operation"),
    };
    Ok(invocation)
}

fn print_models() {
    for kind in [ModelKind::Llm, ModelKind::Vision, ModelKind::Image] {
        println!("{}:", kind.name());
        for model in kind.models() {
            println!("  {}", model);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelscope_node=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    if matches!(args.command, Command::Models) {
        print_models();
        return Ok(());
    }

    let config = match &args.env_file {
        Some(path) => Config::from_env_file(path),
        None => Config::from_env(),
    };

    let dispatcher = match config.and_then(|config| Dispatcher::from_config(&config)) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    let invocation = build_invocation(args.command).await?;
    info!(
        "Running {}/{}",
        invocation.resource.as_str(),
        invocation.operation.as_str()
    );

    match dispatcher.execute(&invocation).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!("Operation failed: {}", e);
            std::process::exit(1);
        }
    }
}
