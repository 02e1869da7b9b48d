//! Retrieval-augmented answers: search, render as context, ask the model.

use std::sync::Arc;

use grna_llm::{LlmBackend, LlmRequest, Message};
use serde::Serialize;
use tracing::{info, instrument};

use crate::render::format_results;
use crate::search::{QueryInterface, SearchResult};
use crate::Result;

pub const RAG_PREAMBLE: &str = "You are a helpful assistant in a retrieval-augmented generation system. \
You will be given some background information (context) and a user’s question. \
Use the background information only to improve the quality of your answer. \
Do not mention or reference the background information explicitly. \
Do not say things like \"according to the context\" or \"based on the provided text\". \
Write your answers as if you already know the information. \
If the background information does not contain what you need to justify that your answer is correct, \
simply state that you do not know the answer. ";

/// Preamble + rendered context + the question, as one user message.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "{RAG_PREAMBLE}Here is the context from Addgene's gRNA database: \n{context}\n\n\n\
         Answer the following prompt: {question}"
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub results: Vec<SearchResult>,
    pub prompt: String,
    pub answer: String,
    pub model: String,
}

pub struct RagAnswerer {
    llm: Arc<dyn LlmBackend>,
    max_tokens: u32,
}

impl RagAnswerer {
    pub fn new(llm: Arc<dyn LlmBackend>, max_tokens: u32) -> Self {
        Self { llm, max_tokens }
    }

    #[instrument(skip(self, query), fields(model = %self.llm.model_id()))]
    pub async fn ask(&self, query: &QueryInterface, question: &str, k: usize) -> Result<RagAnswer> {
        let results = query.search(question, k).await?;
        let prompt = build_prompt(&format_results(&results), question);

        let resp = self
            .llm
            .complete(LlmRequest {
                messages: vec![Message::user(prompt.clone())],
                max_tokens: Some(self.max_tokens),
                ..Default::default()
            })
            .await?;
        info!(
            context_results = results.len(),
            completion_tokens = resp.completion_tokens,
            "Answer generated"
        );

        Ok(RagAnswer { results, prompt, answer: resp.content, model: resp.model })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("CTX", "What targets EGFP?");
        assert!(prompt.starts_with("You are a helpful assistant"));
        assert!(prompt.ends_with(
            "Here is the context from Addgene's gRNA database: \nCTX\n\n\nAnswer the following prompt: What targets EGFP?"
        ));
    }
}
