//! Scripted provider for tests and local development
//!
//! Replays queued replies and failures in order, then falls back to a
//! default reply. An optional delay is applied before every answer, which
//! combined with a paused tokio clock makes timeout behaviour deterministic.

use crate::error::{Error, Result};
use crate::provider::{ChatProvider, Completion, TokenUsage};
use crate::token::count_tokens;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

struct Step {
    delay: Option<Duration>,
    outcome: Result<String>,
}

/// A provider that answers from a script
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Step>>,
    default_reply: Option<String>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedProvider {
    /// Create a provider that echoes a canned reply naming itself
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            default_reply: None,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    /// Reply used once the script is exhausted
    #[must_use]
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Delay applied before every answer without its own delay
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a successful reply
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.push(Step {
            delay: None,
            outcome: Ok(reply.into()),
        });
    }

    /// Queue a reply that arrives after `delay`
    pub fn push_delayed_reply(&self, delay: Duration, reply: impl Into<String>) {
        self.push(Step {
            delay: Some(delay),
            outcome: Ok(reply.into()),
        });
    }

    /// Queue a failure
    pub fn push_failure(&self, error: Error) {
        self.push(Step {
            delay: None,
            outcome: Err(error),
        });
    }

    /// Number of calls received so far, including ones that were cut short
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(&self, step: Step) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
    }
}

#[async_trait::async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, prompt: &str, _max_tokens: u32) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let step = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let (delay, outcome) = match step {
            Some(step) => (step.delay.unwrap_or(self.delay), step.outcome),
            None => (
                self.delay,
                Ok(self
                    .default_reply
                    .clone()
                    .unwrap_or_else(|| format!("response from {}", self.name))),
            ),
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let content = outcome?;
        let prompt_tokens = count_tokens(prompt) as u32;
        let completion_tokens = count_tokens(&content) as u32;
        Ok(Completion {
            content,
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            model: format!("{}-scripted", self.name),
        })
    }
}
