use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use vetchat::config::AppConfig;
use vetchat::db;
use vetchat::handlers;
use vetchat::services::ai::gemini::GeminiProvider;
use vetchat::services::ai::openai::OpenAiProvider;
use vetchat::services::ai::{AiResponder, LlmProvider};
use vetchat::services::intent::KeywordClassifier;
use vetchat::services::notify::resend::ResendEmailProvider;
use vetchat::services::notify::{LogNotifier, NotificationService};
use vetchat::services::script::ConversationScript;
use vetchat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let ai_client = http_client(config.ai_timeout).context("failed to build AI HTTP client")?;

    // Order matters: Gemini first, OpenAI as the secondary provider.
    let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();
    if !config.gemini_api_key.is_empty() {
        tracing::info!(model = %config.gemini_model, "Gemini provider enabled");
        providers.push(Box::new(GeminiProvider::new(
            config.gemini_api_key.clone(),
            &config.gemini_model,
            config.ai_max_output_tokens,
            ai_client.clone(),
        )));
    }
    if !config.openai_api_key.is_empty() {
        tracing::info!(model = %config.openai_model, "OpenAI provider enabled");
        providers.push(Box::new(OpenAiProvider::new(
            config.openai_api_key.clone(),
            &config.openai_model,
            config.ai_max_output_tokens,
            ai_client,
        )));
    }
    if providers.is_empty() {
        tracing::warn!("no AI provider configured, open questions get canned replies");
    }

    let notifier: Box<dyn NotificationService> = if config.resend_api_key.is_empty() {
        tracing::warn!("RESEND_API_KEY not set, booking emails will be skipped");
        Box::new(LogNotifier)
    } else {
        Box::new(ResendEmailProvider::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
            http_client(config.email_timeout).context("failed to build email HTTP client")?,
        ))
    };

    let script = match &config.script_path {
        Some(path) => ConversationScript::load(path)?,
        None => ConversationScript::default(),
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        ai: AiResponder::new(providers),
        notifier,
        classifier: Box::new(KeywordClassifier),
        script,
    });

    let app = handlers::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}
