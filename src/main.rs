use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use line_relay::api::{ApiServer, ApiState};
use line_relay::channels::{ContentFetcher, LineChannel};
use line_relay::conversation::MessageRouter;
use line_relay::extractor::{EventExtractor, GeminiExtractor};
use line_relay::gemini::GeminiClient;
use line_relay::shortener::{ReurlClient, ShortenUrl};
use line_relay::store::{DocumentStore, FirebaseStore};
use line_relay::{ChatModel, Config};

/// line-relay - webhook-driven LINE chat relay for Gemini assistants
#[derive(Parser)]
#[command(name = "line-relay", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Log filter override (e.g. "debug,line_relay=trace")
    #[arg(long, env = "LOG")]
    log: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging comes up before config load, so API_ENV is read directly.
    let production = std::env::var("API_ENV").ok().as_deref() == Some("production");
    let filter = log_filter(cli.log.as_deref(), cli.verbose, production);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Choose the tracing filter: an explicit LOG value wins, then verbosity;
/// the production default keeps foreign crates at warn
fn log_filter(log: Option<&str>, verbose: u8, production: bool) -> String {
    if let Some(log) = log {
        return log.to_string();
    }
    match (verbose, production) {
        (0, true) => "warn,line_relay=info",
        (0, false) => "info,line_relay=info",
        (1, _) => "info,line_relay=debug",
        _ => "debug",
    }
    .to_string()
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Missing credentials abort here, before the server binds.
    let config = Config::from_env(cli.port)?;

    tracing::info!(
        port = config.port,
        production = config.production,
        model = %config.gemini_model,
        "starting line relay"
    );

    let line = Arc::new(LineChannel::new(
        config.channel_secret.clone(),
        config.channel_access_token.clone(),
    ));
    let gemini = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_vision_model.clone(),
    ));
    let store: Arc<dyn DocumentStore> = Arc::new(FirebaseStore::new(config.firebase_url.clone()));
    let extractor: Arc<dyn EventExtractor> = Arc::new(GeminiExtractor::new(Arc::clone(&gemini)));
    let shortener = config
        .reurl_api_key
        .clone()
        .map(|key| Arc::new(ReurlClient::new(key)) as Arc<dyn ShortenUrl>);
    if shortener.is_none() {
        tracing::warn!("REURL_API_KEY not set, calendar links will not be shortened");
    }

    let router = Arc::new(MessageRouter::new(
        Arc::clone(&gemini) as Arc<dyn ChatModel>,
        store,
        Arc::clone(&extractor),
        Arc::clone(&line) as Arc<dyn ContentFetcher>,
        shortener,
    ));

    let state = Arc::new(ApiState {
        line,
        router,
        extractor,
    });

    ApiServer::new(state, config.port).run().await?;
    Ok(())
}
