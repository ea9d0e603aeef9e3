mod ai;
mod config;
mod core;
mod logger;
mod services;
mod ui;

use anyhow::Context;
use std::io;

use crate::ai::OpenAIClient;
use crate::config::Config;
use crate::core::agent::ChatAgent;
use crate::services::KnowledgeStore;

fn main() -> anyhow::Result<()> {
    logger::init();
    log::info!("🚀 Chatbot started");

    let config = Config::default();

    // One runtime and one HTTP client for the whole process
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let http = ai::build_http_client(&config)?;
    let remote = OpenAIClient::new(http, &config);

    log::info!(
        "📁 Configuration loaded: knowledge file {}, model {}, API key {}",
        config.knowledge_file.display(),
        config.openai_model,
        if remote.is_configured() { "set" } else { "not set" }
    );

    let store = KnowledgeStore::load_or_empty(&config.knowledge_file);
    if store.is_empty() {
        log::warn!("⚠️ Knowledge base is empty; only 'openai' questions can be answered");
    }
    let agent = ChatAgent::new(&config, store, remote);
    log::info!("🤖 {} ready with {} entries", agent.bot_name(), agent.knowledge_size());

    let stdin = io::stdin();
    ui::console::run(&agent, &runtime, stdin.lock(), io::stdout())?;

    log::info!("Chatbot stopped");
    Ok(())
}
