pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod providers;
pub mod sink;
pub mod tokens;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use cli::Args;
use config::Config;
use orchestrator::Orchestrator;
use providers::openai::OpenAiClient;
use sink::OutputSink;
use tokens::TiktokenCounter;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    logging::init(args.debug);

    let cfg = Config::from_args(&args)?;
    info!(
        model = %cfg.model,
        streaming = cfg.streaming,
        prompt_count = cfg.user_prompts.len(),
        max_tokens = cfg.max_tokens,
        temperature = cfg.temperature,
        output_file = ?cfg.output_file,
        token_accounting = cfg.token_accounting.as_str(),
        base_url = %cfg.base_url,
        "loaded runtime configuration"
    );

    let tokenizer = TiktokenCounter::for_model(&cfg.model)?;
    let client = OpenAiClient::new(&cfg).context("Failed to initialize HTTP client")?;
    let sink = match &cfg.output_file {
        Some(path) => OutputSink::file(path),
        None => OutputSink::console(),
    };

    let mut orchestrator = Orchestrator::new(&cfg, &client, &tokenizer, sink);
    let results = orchestrator.evaluate().await?;

    if cfg.include_statistics {
        println!("{results}");
    }
    Ok(())
}
