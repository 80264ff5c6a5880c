//! Answer generation over retrieved context via Ollama.
//!
//! Calls `POST /api/chat` on the configured Ollama URL with the retrieved
//! passages as context. One attempt per call; if Ollama is down or slow,
//! the error goes straight back to the caller.

use std::time::Duration;

use anyhow::{bail, Result};

use crate::config::{ChatConfig, Config};
use crate::index::Index;

const SYSTEM_PROMPT: &str = "You are a careful medical information assistant. \
Answer using only the provided context from the document library. \
If the context does not contain the answer, say so plainly. \
Do not diagnose, prescribe, or give individual medical advice; remind the user \
to consult a qualified clinician for decisions about their care.";

/// Build the user message for a question and its retrieved context.
fn build_prompt(question: &str, context: &str) -> String {
    if context.trim().is_empty() {
        format!(
            "No passages were retrieved for this question.\n\nQuestion: {}",
            question
        )
    } else {
        format!("Context:\n{}\n\nQuestion: {}", context, question)
    }
}

/// Generate an answer grounded in `context` using the configured chat model.
pub async fn generate_answer(config: &ChatConfig, question: &str, context: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": build_prompt(question, context) },
        ],
        "stream": false,
    });

    let response = client
        .post(format!("{}/api/chat", config.url))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Ollama connection error (is Ollama running at {}?): {}",
                config.url,
                e
            )
        })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Ollama API error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))
}

/// CLI entry for `medrag ask`.
pub async fn run_ask(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let started = std::time::Instant::now();
    let k = k.unwrap_or(config.retrieval.k);
    let index = Index::open(config).await?;
    let passages = index.query(query, k).await;
    let context = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let answer = generate_answer(&config.chat, query, &context).await?;

    if let Some(log_path) = &config.eval.log_path {
        let record = crate::eval::InteractionRecord::new(
            query,
            answer.len(),
            passages.len(),
            started.elapsed().as_millis() as u64,
        );
        if let Err(e) = crate::eval::append_interaction(log_path, &record) {
            tracing::warn!("failed to append interaction log: {e:#}");
        }
    }

    println!("{}", answer);
    if !passages.is_empty() {
        println!();
        println!("Sources:");
        for p in &passages {
            println!("  - {}#{}", p.source, p.chunk_index);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_context_and_question() {
        let prompt = build_prompt("What is metformin for?", "Metformin treats type 2 diabetes.");
        assert!(prompt.starts_with("Context:\n"));
        assert!(prompt.contains("Metformin treats type 2 diabetes."));
        assert!(prompt.ends_with("Question: What is metformin for?"));
    }

    #[test]
    fn prompt_says_when_nothing_was_retrieved() {
        let prompt = build_prompt("What is metformin for?", "  ");
        assert!(prompt.starts_with("No passages were retrieved"));
        assert!(prompt.ends_with("Question: What is metformin for?"));
    }
}
