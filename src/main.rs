//! CLI entry point: run one instruction through a conversation session and
//! stream the agent's rounds to stdout.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::error;

use reagent::agent::protocol::Message;
use reagent::config::{AppConfig, ModelConfig};
use reagent::sandbox::SessionRegistry;
use reagent::session::{ConversationSession, FileConversationStore};

struct CliArgs {
    config_path: Option<String>,
    model: String,
    uploads: Vec<String>,
    instruction: String,
}

fn usage() -> ! {
    eprintln!(
        "Usage: reagent [--config <path>] [--model <name>] [--upload <file>]... <instruction>"
    );
    std::process::exit(2);
}

fn parse_args() -> CliArgs {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    let mut model = String::new();
    let mut uploads = Vec::new();
    let mut instruction_parts: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(args.next().unwrap_or_else(|| usage())),
            "--model" => model = args.next().unwrap_or_else(|| usage()),
            "--upload" => uploads.push(args.next().unwrap_or_else(|| usage())),
            "--help" | "-h" => usage(),
            _ => instruction_parts.push(arg),
        }
    }

    if instruction_parts.is_empty() {
        usage();
    }
    CliArgs {
        config_path,
        model,
        uploads,
        instruction: instruction_parts.join(" "),
    }
}

#[tokio::main]
async fn main() {
    reagent::tracing::init_tracing();

    if let Err(e) = run(parse_args()).await {
        error!(error = %e, "run failed");
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if config.models.is_empty() {
        // No config file: talk to a local OpenAI-compatible endpoint
        config.models.insert(
            "local".to_string(),
            ModelConfig {
                model: "qwen3".to_string(),
                provider: Default::default(),
                base_url: "http://127.0.0.1:11434".to_string(),
                api_key_env: String::new(),
                temperature: 0.0,
                prompt: Default::default(),
            },
        );
        config.default_model = "local".to_string();
    }

    let store = Arc::new(FileConversationStore::default_store()?);
    let registry = SessionRegistry::new();
    let session =
        ConversationSession::create(&args.model, &config, registry, store).await?;

    for upload in &args.uploads {
        let dest = session.upload_to_sandbox(Path::new(upload)).await?;
        println!("uploaded: {}", dest.display());
    }

    let mut turn = session.chat(vec![Message::user(&args.instruction)], Vec::new());
    while let Some(item) = turn.next().await {
        match item {
            Ok(response) => {
                println!("{}", response.output_text);
                for file in &response.output_files {
                    println!("[output file] {}", file.path);
                }
            }
            Err(e) => {
                drop(turn);
                session.close().await?;
                return Err(Box::new(e));
            }
        }
    }
    drop(turn);

    session.close().await?;
    Ok(())
}
