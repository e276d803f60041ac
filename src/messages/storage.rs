use super::types::Message;
use parking_lot::RwLock;
use std::sync::Arc;

/// Append-only message log.
///
/// Cloning yields another handle onto the same log, so a renderer on another
/// thread can read while the orchestrator appends. Appending is crate-private:
/// handles given out by the orchestrator are read-only.
///
/// ```compile_fail
/// use franklin::messages::{Message, MessageStorage};
///
/// let log = MessageStorage::with_greeting("Greetings!");
/// log.add(Message::user("injected"));
/// ```
#[derive(Debug, Clone)]
pub struct MessageStorage {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl MessageStorage {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a log seeded with an assistant greeting
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let storage = Self::new();
        storage.add(Message::assistant(greeting));
        storage
    }

    pub(crate) fn add(&self, message: Message) {
        self.messages.write().push(message);
    }

    pub fn get_all(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn first(&self) -> Option<Message> {
        self.messages.read().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Default for MessageStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Sender;

    #[test]
    fn test_greeting_is_first() {
        let storage = MessageStorage::with_greeting("Greetings!");
        storage.add(Message::user("How do I save money?"));
        storage.add(Message::assistant("Save first."));

        let all = storage.get_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].sender(), Sender::Assistant);
        assert_eq!(all[0].content(), "Greetings!");
        assert_eq!(all[2].content(), "Save first.");
    }

    #[test]
    fn test_clones_share_the_log() {
        let storage = MessageStorage::new();
        let reader = storage.clone();
        storage.add(Message::user("a"));
        assert_eq!(reader.len(), 1);
    }
}
