//! `relay`: ask one question and print the answer chunk by chunk.

mod observability;

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use relay_core::prelude::*;
use relay_core::{DEFAULT_MAX_CHUNK_LEN, QueryReport};
use tracing::{error, info, warn};

use crate::observability::init_observability;

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Ask an LLM a question and print the answer in short chunks")]
struct Cli {
    /// Settings file (llmcommand.json layout). A missing file means defaults.
    #[arg(long, default_value = "config/llmcommand.json")]
    config: PathBuf,

    /// Vendor to use: anthropic, openai or gemini. Overrides the settings file.
    #[arg(long)]
    provider: Option<Provider>,

    /// Model id passed through to the vendor.
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    system_prompt: Option<String>,

    /// Maximum characters per printed chunk.
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_LEN)]
    max_len: usize,

    /// Log request bodies and raw vendor lines.
    #[arg(long)]
    debug: bool,

    /// The question.
    #[arg(required = true, trailing_var_arg = true)]
    query: Vec<String>,
}

/// Prints each chunk on its own line.
struct StdoutSink {
    out: std::io::Stdout,
}

impl DisplaySink for StdoutSink {
    fn deliver(&mut self, text: &str) {
        let mut out = self.out.lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

/// Resolves the effective vendor settings: settings file, then `.env`/process
/// environment for a missing key, then command-line flags.
fn resolve_config(cli: &Cli, settings: &RelayConfig) -> ProviderConfig {
    let provider = cli.provider.unwrap_or_else(|| settings.provider());
    let mut config = settings.snapshot_for(provider);
    if !config.has_valid_api_key() {
        match ProviderConfig::from_env(provider) {
            Ok(from_env) => {
                config.api_key = from_env.api_key;
                if cli.model.is_none() {
                    config.model = from_env.model;
                }
            }
            Err(err) => warn!(error = %err, "no usable API key in settings or environment"),
        }
    }
    if let Some(model) = &cli.model {
        config = config.model(model.clone());
    }
    if let Some(prompt) = &cli.system_prompt {
        config = config.system_prompt(prompt.clone());
    }
    if cli.debug {
        config = config.debug(true);
    }
    config
}

async fn run(cli: Cli, settings: RelayConfig) -> Result<QueryReport, RelayError> {
    let config = resolve_config(&cli, &settings);
    info!(provider = %config.provider, model = %config.model, "using provider");
    let relay = Relay::builder().max_chunk_len(cli.max_len).build()?;

    let (dispatcher, queue) = delivery_channel(32);
    let handle = relay.submit(&config, Query::new(cli.query.join(" ")), dispatcher)?;
    println!("Thinking...");

    let mut sink = StdoutSink {
        out: std::io::stdout(),
    };
    if drain_until_interrupted(queue, &mut sink, tokio::signal::ctrl_c()).await {
        warn!(query_id = %handle.query_id(), "interrupted, cancelling query");
        handle.abort();
    }
    handle.wait().await
}

/// Drains `queue` into `sink` until the query closes it or `interrupt` fires.
///
/// Returns `true` when interrupted. If the interrupt source itself fails, the
/// error is logged and draining continues to the end of the answer.
async fn drain_until_interrupted<S, F>(queue: DeliveryQueue, sink: &mut S, interrupt: F) -> bool
where
    S: DisplaySink,
    F: Future<Output = std::io::Result<()>>,
{
    let drain = queue.run(sink);
    tokio::pin!(drain);
    tokio::select! {
        _ = &mut drain => return false,
        result = interrupt => match result {
            Ok(()) => return true,
            Err(err) => warn!(error = %err, "cannot listen for ctrl-c, waiting for the answer"),
        },
    }
    drain.await;
    false
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let settings = match RelayConfig::load(&cli.config) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("relay: {err}");
            return ExitCode::from(2);
        }
    };
    init_observability(cli.debug || settings.debug_mode);

    match run(cli, settings).await {
        Ok(report) => {
            info!(query_id = %report.query_id, chunks = report.chunks, "done");
            ExitCode::SUCCESS
        }
        Err(RelayError::Provider(err)) => {
            // already shown to the user as the final chunk
            error!(error = %err, "query failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(error = %err, "query failed");
            eprintln!("relay: {err}");
            ExitCode::FAILURE
        }
    }
}
