use docchat_core::{ConversationTurn, Role};

/// Ordered log of question/answer turns for one session.
///
/// Turns are only ever appended; the only way to remove them is [`clear`](Self::clear).
/// The system prompt is not a turn: it lives in the session configuration.
#[derive(Debug, Default, Clone)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
    next_sequence: u64,
}

impl ConversationMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, stamping it with the next sequence number. Returns that number.
    pub fn append(&mut self, mut turn: ConversationTurn) -> u64 {
        let sequence = self.next_sequence;
        turn.sequence = sequence;
        self.next_sequence += 1;
        self.turns.push(turn);
        sequence
    }

    /// Append a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) -> u64 {
        self.append(ConversationTurn::user(content))
    }

    /// Append an assistant turn.
    pub fn push_assistant(&mut self, content: impl Into<String>) -> u64 {
        self.append(ConversationTurn::assistant(content))
    }

    /// All turns, oldest first.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The `n` most recent turns, oldest first.
    pub fn last(&self, n: usize) -> &[ConversationTurn] {
        let skip = self.turns.len().saturating_sub(n);
        &self.turns[skip..]
    }

    /// Number of stored turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn is stored.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of stored turns written by `role`.
    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    /// Rough token estimation (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(|t| t.content.len() / 4).sum()
    }

    /// Forget every turn. Sequence numbers keep increasing afterwards.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_is_chronological() {
        let mut memory = ConversationMemory::new();
        memory.push_user("What is X?");
        memory.push_assistant("X is a letter.");
        memory.push_user("And Y?");

        let history = memory.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn test_append_restamps_sequence() {
        let mut memory = ConversationMemory::new();
        memory.push_user("first");
        let mut stale = ConversationTurn::assistant("second");
        stale.sequence = 0;
        assert_eq!(memory.append(stale), 1);
        assert_eq!(memory.history()[1].sequence, 1);
    }

    #[test]
    fn test_clear_empties_history() {
        let mut memory = ConversationMemory::new();
        memory.push_user("q");
        memory.push_assistant("a");
        memory.clear();
        assert_eq!(memory.history().len(), 0);
        assert!(memory.is_empty());

        // Sequence numbers are not reused after clearing.
        assert_eq!(memory.push_user("q2"), 2);
    }

    #[test]
    fn test_last_window() {
        let mut memory = ConversationMemory::new();
        for i in 0..5 {
            memory.push_user(format!("q{i}"));
        }
        let last = memory.last(2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].content, "q3");
        assert_eq!(memory.last(10).len(), 5);
        assert_eq!(memory.count_role(Role::User), 5);
    }

    #[test]
    fn test_estimated_tokens() {
        let mut memory = ConversationMemory::new();
        memory.push_user("a".repeat(40));
        memory.push_assistant("b".repeat(80));
        assert_eq!(memory.estimated_tokens(), 30);
    }
}
