//! Per-sender conversation state. The only tracked state is "awaiting a name to complete registration";
//! whether a sender is registered is always asked of the directory.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Where a sender is in the registration flow, as far as this process knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// No local entry: unknown or registered, the directory decides.
    Unregistered,
    /// Greeted while unregistered; the next text is taken as the sender's name.
    AwaitingName,
}

/// In-memory store: sender phone -> awaiting-name flag.
pub struct ConversationStore {
    inner: RwLock<HashMap<String, bool>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn state(&self, sender: &str) -> ConversationState {
        if self.is_awaiting_name(sender).await {
            ConversationState::AwaitingName
        } else {
            ConversationState::Unregistered
        }
    }

    pub async fn is_awaiting_name(&self, sender: &str) -> bool {
        self.inner
            .read()
            .await
            .get(sender)
            .copied()
            .unwrap_or(false)
    }

    pub async fn set_awaiting_name(&self, sender: &str) {
        self.inner.write().await.insert(sender.to_string(), true);
    }

    /// Clear the awaiting-name flag and report whether it was set. Read and clear happen under
    /// one write lock, so only one of several concurrent messages gets to submit the name.
    pub async fn take_awaiting_name(&self, sender: &str) -> bool {
        self.inner.write().await.remove(sender).unwrap_or(false)
    }

    /// Number of senders with a pending registration.
    pub async fn pending_count(&self) -> usize {
        self.inner.read().await.values().filter(|v| **v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_sender_starts_unregistered() {
        let store = ConversationStore::new();
        assert_eq!(store.state("968").await, ConversationState::Unregistered);
        assert!(!store.take_awaiting_name("968").await);
    }

    #[tokio::test]
    async fn take_clears_the_flag_once() {
        let store = ConversationStore::new();
        store.set_awaiting_name("968").await;
        assert_eq!(store.state("968").await, ConversationState::AwaitingName);
        assert_eq!(store.pending_count().await, 1);
        assert!(store.take_awaiting_name("968").await);
        assert!(!store.take_awaiting_name("968").await);
        assert_eq!(store.state("968").await, ConversationState::Unregistered);
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn senders_are_independent() {
        let store = ConversationStore::new();
        store.set_awaiting_name("a").await;
        assert!(!store.is_awaiting_name("b").await);
        assert!(store.take_awaiting_name("a").await);
        assert!(!store.is_awaiting_name("a").await);
    }
}
