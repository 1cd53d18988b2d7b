//! Command-line client for natural-language data product search
//!
//! Sends a search query or a chat conversation to a hosted serving endpoint
//! and prints what the normalization engine recovered from the reply. The
//! endpoint is taken from a YAML config file, the `--endpoint` flag, or the
//! `SERVING_ENDPOINT` environment variable; workspace host and token come from
//! the config or `DATABRICKS_HOST` / `DATABRICKS_TOKEN`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use log::LevelFilter;
use quarry_core::search::UNSUPPORTED_WARNING;
use quarry_core::{
    CanonicalResult, ConfigLoader, DiscoveryService, HttpServingClient, QuarryConfig, QueryError,
    SearchOutcome, StreamAccumulator, Turn,
};
use std::io::Write;
use std::path::Path;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Quarry - search data products through a serving endpoint")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, help = "Configuration file (YAML). Without it, settings come from the environment")]
    config: Option<String>,

    #[clap(long, short, help = "Serving endpoint name, overrides the configuration")]
    endpoint: Option<String>,

    #[clap(long, short, help = "Log level (defaults to the configured level)")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search data products with a natural-language query
    Search {
        query: String,

        #[clap(long, help = "Use the streaming transport")]
        stream: bool,

        #[clap(long)]
        max_tokens: Option<u32>,
    },
    /// Send a conversation; messages alternate user and assistant, starting with user
    Chat {
        #[clap(required = true)]
        messages: Vec<String>,

        #[clap(long, help = "Print the reply as it streams in")]
        stream: bool,

        #[clap(long)]
        max_tokens: Option<u32>,
    },
    /// Check whether the endpoint declares a supported task type
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level_filter = level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let client = match HttpServingClient::from_config(&config.endpoint) {
        Ok(client) => client,
        Err(e) => exit_with(&e),
    };

    let outcome = match cli.command {
        Commands::Search {
            query,
            stream,
            max_tokens,
        } => run_search(client, config, query, stream, max_tokens).await,
        Commands::Chat {
            messages,
            stream,
            max_tokens,
        } => run_chat(client, config, messages, stream, max_tokens).await,
        Commands::Check => run_check(client, config).await,
    };

    if let Err(e) = outcome {
        exit_with(&e);
    }
    Ok(())
}

async fn load_config(cli: &Cli) -> Result<QuarryConfig, QueryError> {
    ConfigLoader::load(
        cli.config.as_deref().map(Path::new),
        cli.endpoint.as_deref(),
    )
    .await
}

fn exit_with(error: &QueryError) -> ! {
    eprintln!("{}", error.user_message());
    std::process::exit(1);
}

fn build_service(
    client: HttpServingClient,
    mut config: QuarryConfig,
    max_tokens: Option<u32>,
) -> DiscoveryService<HttpServingClient> {
    if let Some(max_tokens) = max_tokens {
        config.query.max_tokens = max_tokens;
    }
    DiscoveryService::from_config(client, &config)
}

async fn warn_if_unsupported(service: &DiscoveryService<HttpServingClient>) {
    if !service.check_supported().await {
        eprintln!("{}", UNSUPPORTED_WARNING);
    }
}

async fn run_search(
    client: HttpServingClient,
    config: QuarryConfig,
    query: String,
    stream: bool,
    max_tokens: Option<u32>,
) -> Result<(), QueryError> {
    let stream = stream || config.query.stream;
    let service = build_service(client, config, max_tokens);
    warn_if_unsupported(&service).await;

    log::info!("Searching endpoint {} for: {}", service.endpoint(), query);
    let outcome = if stream {
        service.search_streaming(&query).await?
    } else {
        service.search(&query).await?
    };

    match &outcome {
        SearchOutcome::Found(result) => print_result(result, service.settings().display_limit),
        SearchOutcome::Unparsed { content } => {
            log::debug!("Unparsed reply content: {}", content);
        }
    }
    if let Some(message) = outcome.user_message() {
        println!("{}", message);
    }
    Ok(())
}

async fn run_chat(
    client: HttpServingClient,
    config: QuarryConfig,
    messages: Vec<String>,
    stream: bool,
    max_tokens: Option<u32>,
) -> Result<(), QueryError> {
    let conversation: Vec<Turn> = messages
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            if i % 2 == 0 {
                Turn::user(content)
            } else {
                Turn::assistant(content)
            }
        })
        .collect();

    let service = build_service(client, config, max_tokens);
    warn_if_unsupported(&service).await;

    if stream {
        let mut fragments = service.chat_stream(&conversation).await?;
        let mut accumulator = StreamAccumulator::new();
        let mut stdout = std::io::stdout();
        while let Some(fragment) = fragments.next().await {
            if let Some(delta) = accumulator.push(fragment) {
                print!("{}", delta);
                stdout.flush()?;
            }
        }
        println!();
    } else {
        let message = service.chat(&conversation).await?;
        println!("{}", message.content);
    }
    Ok(())
}

async fn run_check(client: HttpServingClient, config: QuarryConfig) -> Result<(), QueryError> {
    let service = build_service(client, config, None);
    if service.check_supported().await {
        println!("Endpoint {} is supported.", service.endpoint());
    } else {
        println!("Endpoint {} does not declare a supported task type.", service.endpoint());
    }
    Ok(())
}

fn print_result(result: &CanonicalResult, limit: usize) {
    if !result.query_understanding.is_empty() {
        println!("Query understanding: {}", result.query_understanding);
        println!();
    }

    for item in result.top(limit) {
        println!("#{} {} ({})", item.rank, item.data_product_name, item.full_identifier);
        if !item.description.is_empty() {
            println!("   {}", item.description);
        }
        match item.table_records() {
            Ok(records) => {
                for record in records {
                    let fields: Vec<String> = record
                        .iter()
                        .map(|(key, value)| match value {
                            serde_json::Value::String(s) => format!("{}: {}", key, s),
                            other => format!("{}: {}", key, other),
                        })
                        .collect();
                    println!("   - {}", fields.join(", "));
                }
            }
            Err(e) => log::warn!("{}", e),
        }
        println!();
    }

    if !result.results.is_empty() && !result.recommended_action.is_empty() {
        println!("Recommended action: {}", result.recommended_action);
    }
}
