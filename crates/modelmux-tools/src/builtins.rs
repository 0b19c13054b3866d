//! Builtins - tools that need nothing but their input
//!
//! Tools that inspect the provider fleet or the router live next to the
//! coordinator, which owns that state.

use crate::error::{Error, Result};
use crate::registry::{Capability, Tool, ToolDefinition, ToolRegistry};
use serde::Deserialize;
use std::sync::Arc;

/// Default number of sentences kept by `summarize`
const DEFAULT_MAX_SENTENCES: usize = 2;

/// Register every builtin tool
pub fn register_builtins(registry: &ToolRegistry) {
    registry.register(Arc::new(SummarizeTool::new()));
}

#[derive(Debug, Deserialize)]
struct SummarizeInput {
    text: String,
    #[serde(default)]
    max_sentences: Option<usize>,
}

/// Extractive summary: the first N sentences of the text
pub struct SummarizeTool {
    definition: ToolDefinition,
}

impl Default for SummarizeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SummarizeTool {
    /// Create the tool
    #[must_use]
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "summarize",
            "Extractive summary keeping the first sentences of a text",
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to summarize"
                },
                "max_sentences": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Sentences to keep (default: 2)"
                }
            },
            "required": ["text"]
        }))
        .with_capability(Capability::Text);

        Self { definition }
    }
}

/// Split text into sentences on `.`, `!` or `?` followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[async_trait::async_trait]
impl Tool for SummarizeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value> {
        let input: SummarizeInput = serde_json::from_value(input)
            .map_err(|e| Error::Execution(format!("invalid arguments: {e}")))?;
        let max_sentences = input.max_sentences.unwrap_or(DEFAULT_MAX_SENTENCES).max(1);

        let sentences = split_sentences(&input.text);
        let kept = sentences.len().min(max_sentences);
        let summary = sentences[..kept].join(" ");

        Ok(serde_json::json!({
            "summary": summary,
            "sentences_kept": kept,
            "sentences_total": sentences.len(),
            "original_chars": input.text.chars().count(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_sentences() {
        let parts = split_sentences("First one. Second? Third! v1.2 is out");
        assert_eq!(parts, vec!["First one.", "Second?", "Third!", "v1.2 is out"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[tokio::test]
    async fn test_summarize_keeps_first_sentences() {
        let tool = SummarizeTool::new();
        let out = tool
            .execute(json!({"text": "Rust is fast. It is safe. It is fun.", "max_sentences": 2}))
            .await
            .unwrap();
        assert_eq!(out["summary"], "Rust is fast. It is safe.");
        assert_eq!(out["sentences_total"], 3);
    }

    #[tokio::test]
    async fn test_summarize_missing_text() {
        let tool = SummarizeTool::new();
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
    }
}
