use std::sync::Arc;

use dotenv::dotenv;
use serenity::http::Http;

mod activity;
mod ai;
mod channels;
mod commands;
mod config;
mod conversation;
mod memory;
mod models;
mod prompts;
mod report;
mod scheduler;

use activity::ActivityTracker;
use ai::{AiClient, ClaudeClient};
use channels::MessageDispatcher;
use config::Config;
use conversation::ConversationLog;
use memory::{MemoryAnalyzer, MemoryDocument, RuleStore};
use prompts::Prompts;

/// Everything the dispatcher, scheduler and commands share.
pub struct BotState {
    pub config: Config,
    pub prompts: Prompts,
    pub tracker: ActivityTracker,
    pub log: ConversationLog,
    pub rules: RuleStore,
    pub facts: MemoryDocument,
    pub contextual: MemoryDocument,
    pub responder: AiClient,
    pub analyzer: MemoryAnalyzer,
}

/// Temperature for conversational replies; extraction runs much colder.
const RESPONSE_TEMPERATURE: f32 = 1.0;
const EXTRACTION_TEMPERATURE: f32 = 0.2;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let prompts = Prompts::load(&config);

    log::info!("[MAIN] Data directory: {}", config.data_dir.display());
    log::info!(
        "[MAIN] Stores: {} | {} | {}",
        config.rules_path().display(),
        config.facts_path().display(),
        config.contextual_rules_path().display()
    );

    let tracker = ActivityTracker::new();
    let log = ConversationLog::new(config.history_log_path(), tracker.clone());
    log.seed_activity();

    let responder = ClaudeClient::new(
        &config.anthropic_api_key,
        &config.model,
        config.max_tokens,
        RESPONSE_TEMPERATURE,
    )
    .expect("Failed to create response client");
    let extractor = ClaudeClient::new(
        &config.anthropic_api_key,
        &config.model,
        config.max_tokens,
        EXTRACTION_TEMPERATURE,
    )
    .expect("Failed to create extraction client");

    let state = Arc::new(BotState {
        rules: RuleStore::new(config.rules_path()),
        facts: MemoryDocument::new(config.facts_path(), "# User Information", "Other"),
        contextual: MemoryDocument::new(
            config.contextual_rules_path(),
            "# Contextual Rules",
            "Other Rules",
        ),
        responder: AiClient::Claude(responder),
        analyzer: MemoryAnalyzer::new(AiClient::Claude(extractor)),
        prompts,
        tracker,
        log,
        config,
    });

    // Proactive messages go out over plain REST, independent of the
    // gateway connection.
    let http = Arc::new(Http::new(&state.config.discord_bot_token));
    log::info!("[MAIN] Starting rule scheduler");
    tokio::spawn(scheduler::run_scheduler(state.clone(), http));

    let dispatcher = Arc::new(MessageDispatcher::new(state));
    log::info!("[MAIN] Starting Discord listener");
    if let Err(e) = channels::discord::start_discord_listener(dispatcher).await {
        log::error!("[MAIN] Discord listener exited: {}", e);
        std::process::exit(1);
    }
}
