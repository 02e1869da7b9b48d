//! `grna ask`: retrieval-augmented answer from Claude or a local model.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use grna_db::VectorStore;
use grna_llm::{AnthropicBackend, LlmBackend, OllamaBackend};
use grna_query::RagAnswerer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendChoice {
    /// Anthropic Claude (needs ANTHROPIC_API_KEY).
    Claude,
    /// Local model served by Ollama.
    Llama,
}

impl BackendChoice {
    /// Interactive answer: `c`/`claude` or `l`/`llama`, case-insensitive.
    pub fn parse_answer(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "c" | "claude" => Some(Self::Claude),
            "l" | "llama" | "local" => Some(Self::Llama),
            _ => None,
        }
    }
}

pub fn build_backend(choice: BackendChoice, config: &Config) -> anyhow::Result<Arc<dyn LlmBackend>> {
    Ok(match choice {
        BackendChoice::Claude => {
            let cfg = &config.llm.anthropic;
            let key = cfg
                .api_key
                .clone()
                .context("ANTHROPIC_API_KEY is not set (or llm.anthropic.api_key in grna.toml)")?;
            Arc::new(AnthropicBackend::with_base_url(key, &cfg.model, &cfg.base_url)?)
        }
        BackendChoice::Llama => {
            let cfg = &config.llm.ollama;
            Arc::new(OllamaBackend::new(&cfg.base_url, &cfg.model)?)
        }
    })
}

/// Completion budget of the chosen backend.
pub fn max_tokens(choice: BackendChoice, config: &Config) -> u32 {
    match choice {
        BackendChoice::Claude => config.llm.anthropic.max_tokens,
        BackendChoice::Llama => config.llm.ollama.max_tokens,
    }
}

async fn prompt(
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
    text: &str,
) -> anyhow::Result<String> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.unwrap_or_default().trim().to_string())
}

pub async fn run(
    store: Arc<dyn VectorStore>,
    config: &Config,
    question: Vec<String>,
    backend: Option<BackendChoice>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let question = match question.join(" ").trim() {
        "" => prompt(&mut lines, "Enter your prompt: ").await?,
        q => q.to_string(),
    };
    if question.is_empty() {
        bail!("no question given");
    }

    let choice = match backend {
        Some(choice) => choice,
        None => {
            let answer = prompt(
                &mut lines,
                "Would you like to use [C]laude 3.7 Sonnet or a [L]ocal Model (Llama 3.2)? ",
            )
            .await?;
            match BackendChoice::parse_answer(&answer) {
                Some(choice) => choice,
                None => bail!("Invalid answer '{answer}': expected C or L"),
            }
        }
    };

    let llm = build_backend(choice, config)?;
    let query = super::query::connect(store, config).await?;
    info!(model = %llm.model_id(), question = %question, "Asking");

    let answer = RagAnswerer::new(llm, max_tokens(choice, config))
        .ask(&query, &question, config.query.k)
        .await?;

    println!("\n{}", answer.answer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(BackendChoice::parse_answer("C"), Some(BackendChoice::Claude));
        assert_eq!(BackendChoice::parse_answer(" l \n"), Some(BackendChoice::Llama));
        assert_eq!(BackendChoice::parse_answer("Claude"), Some(BackendChoice::Claude));
        assert_eq!(BackendChoice::parse_answer("x"), None);
        assert_eq!(BackendChoice::parse_answer(""), None);
    }

    #[test]
    fn test_claude_needs_key() {
        let err = build_backend(BackendChoice::Claude, &Config::default()).err().unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_local_backend() {
        let llm = build_backend(BackendChoice::Llama, &Config::default()).unwrap();
        assert_eq!(llm.model_id(), "llama3.2");
        assert!(llm.is_local());
    }

    #[test]
    fn test_budget_follows_backend() {
        let mut config = Config::default();
        config.llm.anthropic.max_tokens = 2000;
        config.llm.ollama.max_tokens = 256;
        assert_eq!(max_tokens(BackendChoice::Claude, &config), 2000);
        assert_eq!(max_tokens(BackendChoice::Llama, &config), 256);
    }
}
