//! Append-only chat log.

use crate::types::ChatMessage;

/// Ordered, role-tagged messages of one conversation.
///
/// Messages are never edited; the only way to shrink the log is `clear`.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// The most recent `n` messages, oldest first.
    pub fn latest(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_keeps_order_and_bounds() {
        let mut history = ChatHistory::new();
        assert!(history.latest(4).is_empty());

        for i in 0..5 {
            history.append(ChatMessage::user(format!("m{}", i)));
        }

        let latest: Vec<&str> = history.latest(3).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(latest, vec!["m2", "m3", "m4"]);
        assert_eq!(history.latest(50).len(), 5);
        assert!(history.latest(0).is_empty());
    }

    #[test]
    fn clear_empties_the_log() {
        let mut history = ChatHistory::new();
        history.append(ChatMessage::user("hi"));
        history.append(ChatMessage::assistant("hello"));
        assert_eq!(history.len(), 2);

        history.clear();
        assert!(history.is_empty());
    }
}
