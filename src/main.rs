use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use verigpt_core::config::Config;
use verigpt_core::vault::EnvVaultProvider;
use verigpt_core::{PromptBank, QueryRequest, QueryService, QueryServiceConfig};
use verigpt_gateway::{AppState, GatewayServer};
use verigpt_index::{IndexBuilder, IndexHandle};
use verigpt_llm::any::AnyProvider;
use verigpt_llm::openai::OpenAiProvider;
use verigpt_memory::TextSplitter;

/// Retrieval-augmented answers over a SystemVerilog corpus.
#[derive(Parser, Debug)]
#[command(name = "verigpt", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(
        long,
        global = true,
        env = "VERIGPT_CONFIG",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the HTTP API. This is the default.
    Serve,
    /// Chunk and embed the corpus, then write the index to disk.
    BuildIndex,
    /// Answer one question and print the result as JSON.
    Ask {
        query: String,
        /// Number of chunks to retrieve.
        #[arg(long, short = 'k')]
        top_k: Option<usize>,
    },
    /// List the corpus files that would be indexed.
    Files,
    /// Print corpus statistics as JSON.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_subscriber();
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    config.resolve_secrets(&EnvVaultProvider).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::BuildIndex => build_index(&config).await,
        Command::Ask { query, top_k } => ask(&config, query, top_k).await,
        Command::Files => files(&config),
        Command::Stats => stats(&config),
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the chat/embedding provider, or `None` when no credential is set.
fn create_provider(config: &Config) -> anyhow::Result<Option<AnyProvider>> {
    let Some(key) = config.secrets.openai_api_key.as_ref() else {
        return Ok(None);
    };

    let provider = OpenAiProvider::new(
        config.llm_timeout(),
        key.expose().to_owned(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.embedding_model.clone(),
    )?
    .with_temperature(config.llm.temperature)
    .with_max_tokens(config.llm.max_tokens)
    .with_embed_batch_size(config.llm.embed_batch_size)
    .with_max_retries(config.llm.max_retries);

    Ok(Some(AnyProvider::OpenAi(provider)))
}

fn require_provider(config: &Config) -> anyhow::Result<Arc<AnyProvider>> {
    create_provider(config)?
        .map(Arc::new)
        .context("OPENAI_API_KEY is not set; export it or add it to .env")
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let provider = create_provider(config)?.map(Arc::new);
    if provider.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; /agent will answer 503 until it is");
    }

    let index = IndexHandle::new();
    if let Err(e) = index.load_from_disk(&config.index.path).await {
        tracing::warn!(
            path = %config.index.path.display(),
            "index not loaded: {e}; run `verigpt build-index` and POST /index/reload"
        );
    }

    let prompts = Arc::new(PromptBank::new(&config.prompts.dir));
    for name in [&config.prompts.system, &config.prompts.user] {
        if let Err(e) = prompts.load(name) {
            tracing::warn!("{e}");
        }
    }

    let service = QueryService::new(
        provider,
        index,
        prompts,
        QueryServiceConfig::from(config),
    );
    let state = AppState::new(
        Arc::new(service),
        Arc::new(config.corpus_loader()),
        config.index.path.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(
        &config.gateway.bind,
        config.gateway.port,
        state,
        shutdown_rx,
    )
    .with_max_body_size(config.gateway.max_body_size)
    .serve()
    .await?;

    Ok(())
}

async fn build_index(config: &Config) -> anyhow::Result<()> {
    let provider = require_provider(config)?;
    let splitter = TextSplitter::new(config.chunking.clone())?;
    let builder = IndexBuilder::new(provider, splitter);

    let (_, report) = builder
        .build(&config.corpus_loader(), &config.index.path)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn ask(config: &Config, query: String, top_k: Option<usize>) -> anyhow::Result<()> {
    let provider = require_provider(config)?;

    let index = IndexHandle::new();
    index
        .load_from_disk(&config.index.path)
        .await
        .context("failed to load index; run `verigpt build-index` first")?;

    let service = QueryService::new(
        Some(provider),
        index,
        Arc::new(PromptBank::new(&config.prompts.dir)),
        QueryServiceConfig::from(config),
    );
    let answer = service.ask(QueryRequest { query, top_k }).await?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

fn files(config: &Config) -> anyhow::Result<()> {
    for entry in config.corpus_loader().list()? {
        println!("{}", entry.path);
    }
    Ok(())
}

fn stats(config: &Config) -> anyhow::Result<()> {
    let stats = config.corpus_loader().stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
