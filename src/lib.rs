pub mod cli;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;
pub mod service;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use cli::Args;
use history::MemoryHistoryStore;
use llm::{LlmClient, LlmConfig};
use server::Server;
use service::ChatService;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("LLM Base URL: {}", args.llm_base_url);
    info!("LLM Model: {}", args.llm_model_name);
    info!("LLM Timeout: {}s", args.llm_timeout_secs);
    info!("Default Temperature: {}", args.llm_temperature);
    match args.llm_max_tokens {
        Some(max_tokens) => info!("Max Tokens: {}", max_tokens),
        None => info!("Max Tokens: unlimited"),
    }
    info!("-------------------------");

    let config = LlmConfig {
        model_name: args.llm_model_name.clone(),
        timeout: Duration::from_secs(args.llm_timeout_secs),
        temperature: args.llm_temperature,
        max_tokens: args.llm_max_tokens,
        ..LlmConfig::default()
    }
    .with_base_url(&args.llm_base_url)?;

    let history = Arc::new(MemoryHistoryStore::new());
    let client = LlmClient::new(config)?;
    let service = Arc::new(ChatService::new(client, history));

    let server = Server::new(args.server_addr.clone(), service);
    server.run().await
}
