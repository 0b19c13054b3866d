//! Context augmentation bridge
//!
//! Reads context from the memory collaborator before dispatch and queues
//! finished exchanges for write-back afterwards. Neither direction can fail
//! a request: a failed read means no augmentation, a failed write is logged.

use modelmux_llm::TokenCounter;
use modelmux_memory::{ContextSnippet, ContextStore, Exchange};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Header placed above retrieved context
const CONTEXT_HEADER: &str = "Relevant context:";

/// Separator between snippets
const SNIPPET_SEPARATOR: &str = "\n---\n";

/// Per-item deadline while draining on shutdown
const DRAIN_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded drop-oldest queue of exchanges awaiting write-back
pub struct WriteBackQueue {
    items: Mutex<VecDeque<Exchange>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    stored: AtomicU64,
    failed: AtomicU64,
}

impl WriteBackQueue {
    /// Create a queue holding at most `capacity` items
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
            stored: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Enqueue an exchange, dropping the oldest pending one on overflow
    ///
    /// Returns `true` when an item was dropped.
    pub fn push(&self, exchange: Exchange) -> bool {
        let dropped = {
            let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
            let dropped = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(exchange);
            dropped
        };

        if let Some(old) = &dropped {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                request_id = %old.request_id,
                capacity = self.capacity,
                "write-back queue full, dropped oldest exchange"
            );
        }
        self.notify.notify_one();
        dropped.is_some()
    }

    /// Take the oldest pending exchange
    pub fn pop(&self) -> Option<Exchange> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Pending items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items dropped because the queue was full
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Items successfully written
    #[must_use]
    pub fn stored_count(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    /// Items whose write failed
    #[must_use]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Prompt after augmentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedPrompt {
    /// Prompt sent to the provider
    pub prompt: String,
    /// Snippets included, fully or truncated
    pub snippets_used: usize,
}

impl AugmentedPrompt {
    /// A prompt carrying no context
    #[must_use]
    pub fn plain(message: &str) -> Self {
        Self {
            prompt: message.to_string(),
            snippets_used: 0,
        }
    }
}

/// Bridge between the coordinator and a [`ContextStore`]
pub struct ContextBridge {
    store: Arc<dyn ContextStore>,
    queue: Arc<WriteBackQueue>,
    top_k: usize,
    query_timeout: Duration,
    budget_tokens: usize,
    counter: TokenCounter,
}

impl ContextBridge {
    /// Create a bridge
    #[must_use]
    pub fn new(
        store: Arc<dyn ContextStore>,
        top_k: usize,
        query_timeout: Duration,
        budget_tokens: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            store,
            queue: Arc::new(WriteBackQueue::new(queue_capacity)),
            top_k,
            query_timeout,
            budget_tokens,
            counter: TokenCounter::new(),
        }
    }

    /// Name of the backing store
    #[must_use]
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// The write-back queue
    #[must_use]
    pub fn queue(&self) -> &Arc<WriteBackQueue> {
        &self.queue
    }

    /// Prepend retrieved context to `message`
    ///
    /// Never fails; any store problem yields the plain message.
    pub async fn augment(&self, message: &str) -> AugmentedPrompt {
        if self.top_k == 0 || self.budget_tokens == 0 {
            return AugmentedPrompt::plain(message);
        }

        let snippets =
            match tokio::time::timeout(self.query_timeout, self.store.query(message, self.top_k)).await {
                Ok(Ok(snippets)) => snippets,
                Ok(Err(e)) => {
                    warn!(store = self.store.name(), error = %e, "context query failed, continuing without context");
                    return AugmentedPrompt::plain(message);
                }
                Err(_) => {
                    warn!(
                        store = self.store.name(),
                        timeout_ms = self.query_timeout.as_millis() as u64,
                        "context query timed out, continuing without context"
                    );
                    return AugmentedPrompt::plain(message);
                }
            };

        self.compose(message, &snippets)
    }

    /// Build the prompt from `snippets` within the token budget
    fn compose(&self, message: &str, snippets: &[ContextSnippet]) -> AugmentedPrompt {
        let mut remaining = self.budget_tokens;
        let mut parts: Vec<String> = Vec::new();

        for snippet in snippets.iter().take(self.top_k) {
            if remaining == 0 {
                break;
            }
            let text = snippet.text.trim();
            if text.is_empty() {
                continue;
            }
            let tokens = self.counter.count_tokens(text);
            if tokens <= remaining {
                parts.push(text.to_string());
                remaining -= tokens;
            } else {
                let truncated = self.counter.truncate_to_tokens(text, remaining);
                if !truncated.trim().is_empty() {
                    parts.push(truncated);
                }
                remaining = 0;
            }
        }

        if parts.is_empty() {
            return AugmentedPrompt::plain(message);
        }

        debug!(snippets = parts.len(), budget_left = remaining, "prompt augmented with context");
        AugmentedPrompt {
            prompt: format!(
                "{CONTEXT_HEADER}\n{}\n\n{message}",
                parts.join(SNIPPET_SEPARATOR)
            ),
            snippets_used: parts.len(),
        }
    }

    /// Queue an exchange for write-back
    pub fn submit(&self, exchange: Exchange) {
        self.queue.push(exchange);
    }

    /// Spawn the single worker draining the queue into the store
    ///
    /// On cancellation the worker makes one best-effort pass over what is
    /// still pending, then exits.
    pub fn spawn_worker(&self, token: CancellationToken) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            debug!(store = store.name(), "write-back worker started");
            loop {
                while let Some(exchange) = queue.pop() {
                    tokio::select! {
                        _ = token.cancelled() => {
                            // put it back for the final drain
                            queue.items.lock().unwrap_or_else(|e| e.into_inner()).push_front(exchange);
                            break;
                        }
                        result = store.store(exchange.clone()) => record_store(&queue, &exchange, result),
                    }
                }

                if token.is_cancelled() {
                    break;
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = queue.notify.notified() => {}
                }
            }

            let mut drained = 0usize;
            while let Some(exchange) = queue.pop() {
                match tokio::time::timeout(DRAIN_STORE_TIMEOUT, store.store(exchange.clone())).await {
                    Ok(result) => record_store(&queue, &exchange, result),
                    Err(_) => {
                        queue.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(request_id = %exchange.request_id, "context write timed out during shutdown");
                    }
                }
                drained += 1;
            }
            info!(drained, "write-back worker stopped");
        })
    }
}

fn record_store(queue: &WriteBackQueue, exchange: &Exchange, result: modelmux_memory::Result<String>) {
    match result {
        Ok(id) => {
            queue.stored.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %exchange.request_id, record_id = %id, "exchange written to context store");
        }
        Err(e) => {
            queue.failed.fetch_add(1, Ordering::Relaxed);
            warn!(request_id = %exchange.request_id, error = %e, "context write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelmux_memory::InMemoryContextStore;

    fn exchange(id: &str) -> Exchange {
        Exchange::new(id, "question", "answer", "groq")
    }

    fn bridge_with(store: Arc<dyn ContextStore>, budget: usize) -> ContextBridge {
        ContextBridge::new(store, 3, Duration::from_millis(200), budget, 8)
    }

    #[test]
    fn test_queue_drops_oldest() {
        let queue = WriteBackQueue::new(2);
        assert!(!queue.push(exchange("1")));
        assert!(!queue.push(exchange("2")));
        assert!(queue.push(exchange("3")));

        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.pop().unwrap().request_id, "2");
        assert_eq!(queue.pop().unwrap().request_id, "3");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_augment_prepends_context() {
        let store = Arc::new(InMemoryContextStore::default());
        store
            .store(Exchange::new("r1", "tokio runtime flavors", "current_thread and multi_thread", "groq"))
            .await
            .unwrap();
        let bridge = bridge_with(store, 512);

        let augmented = bridge.augment("Which tokio runtime flavors exist?").await;
        assert_eq!(augmented.snippets_used, 1);
        assert!(augmented.prompt.starts_with(CONTEXT_HEADER));
        assert!(augmented.prompt.ends_with("Which tokio runtime flavors exist?"));
    }

    #[tokio::test]
    async fn test_budget_truncates_context_not_message() {
        let store = Arc::new(InMemoryContextStore::default());
        let long_answer = "tokio ".repeat(500);
        store
            .store(Exchange::new("r1", "tokio question", long_answer, "groq"))
            .await
            .unwrap();
        let bridge = bridge_with(store, 20);

        let message = "tell me about tokio";
        let augmented = bridge.augment(message).await;
        assert_eq!(augmented.snippets_used, 1);
        assert!(augmented.prompt.ends_with(message));

        let context = augmented
            .prompt
            .trim_end_matches(message)
            .trim_start_matches(CONTEXT_HEADER);
        assert!(TokenCounter::new().count_tokens(context.trim()) <= 20);
    }

    #[tokio::test]
    async fn test_no_snippets_yields_plain_prompt() {
        let bridge = bridge_with(Arc::new(InMemoryContextStore::default()), 512);
        assert_eq!(bridge.augment("hello").await, AugmentedPrompt::plain("hello"));
    }

    #[tokio::test]
    async fn test_worker_writes_and_drains_on_cancel() {
        let store = Arc::new(InMemoryContextStore::default());
        let bridge = bridge_with(Arc::clone(&store) as Arc<dyn ContextStore>, 512);
        let token = CancellationToken::new();
        let handle = bridge.spawn_worker(token.clone());

        bridge.submit(exchange("a"));
        bridge.submit(exchange("b"));
        token.cancel();
        handle.await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(bridge.queue().stored_count(), 2);
        assert!(bridge.queue().is_empty());
    }
}
