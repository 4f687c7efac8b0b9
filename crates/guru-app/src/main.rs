//! Guru application binary - composition root.
//!
//! Ties together all Guru crates into a single executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the SQLite database
//! 3. Build the model gateway, context aggregator and orchestrator
//! 4. Serve the REST API, or run an interactive chat session

mod cli;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use guru_api::{start_server, AppState};
use guru_chat::{
    ChatOrchestrator, ChatSession, ContextAggregator, ConversationManager, GeminiGateway,
    GenerationParams,
};
use guru_core::config::GuruConfig;
use guru_storage::{Database, KnowledgeRepository, SqliteConversationStore};

use cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = GuruConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);

    // Tracing. Logs go to stderr so they never interleave with chat output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Guru v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("guru.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Model gateway.
    if config.model.api_key.is_none() {
        tracing::warn!("No model API key configured (set GEMINI_API_KEY); chat requests will fail");
    }
    let gateway = Arc::new(GeminiGateway::from_config(&config.model));

    match args.command() {
        Command::Serve => {
            let state = AppState::new(config.clone(), Arc::clone(&db), gateway);
            if let Err(e) = start_server(&config, state).await {
                tracing::error!(error = %e, "API server stopped");
                tracing::error!("Try: guru serve --port {}", config.server.port.saturating_add(1));
                return Err(e.into());
            }
        }
        Command::Chat { user } => {
            let user = user.trim().to_string();
            if !config.auth.is_allowed(&user) {
                tracing::error!(user = %user, "user is not on the allow-list");
                return Err(format!("user '{}' is not allowed", user).into());
            }

            let store = Arc::new(SqliteConversationStore::new(Arc::clone(&db)));
            let manager = ConversationManager::load(store, user, config.conversations.clone());

            let knowledge = Arc::new(KnowledgeRepository::new(Arc::clone(&db)));
            let aggregator = Arc::new(ContextAggregator::from_config(knowledge, &config));
            let orchestrator = Arc::new(
                ChatOrchestrator::new(gateway).with_params(GenerationParams::from(&config.model)),
            );

            let session = ChatSession::new(
                manager,
                aggregator,
                orchestrator,
                config.conversations.fallback_title_words,
            );
            repl::run(session).await?;
        }
    }

    Ok(())
}
