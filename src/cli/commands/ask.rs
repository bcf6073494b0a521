//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::llm::ChatMessage;
use crate::orchestrator::Orchestrator;
use crate::store::PgStore;
use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'shopwright doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let store = Arc::new(PgStore::connect(&settings.database).await?);
    let orchestrator = Orchestrator::openai(&settings, store.clone(), store.clone())?;

    let reply = match orchestrator.respond(&[ChatMessage::user(question)]).await {
        Ok(reply) => reply,
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    };

    println!();
    let mut tokens = reply.tokens;
    while let Some(token) = tokens.next().await {
        match token {
            Ok(text) => Output::token(&text)?,
            Err(e) => {
                println!();
                Output::error(&format!("Answer interrupted: {}", e));
                return Err(e.into());
            }
        }
    }
    println!("\n");

    Output::kv("Label", reply.label.as_str());
    Output::kv("Stage", &reply.stage.to_string());

    store.close().await;
    Ok(())
}
