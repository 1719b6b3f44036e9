use docchat_core::{ConversationTurn, Role};
use docchat_memory::ScoredChunk;
use serde::{Deserialize, Serialize};

/// Instruction placed between the system prompt and the retrieved context.
pub const QA_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Instruction used to turn a follow-up into a standalone question.
pub const CONDENSE_INSTRUCTIONS: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

/// A message in chat-completion form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Answer,
    Condense,
}

/// Everything the completion service needs for one call.
///
/// Text back ends use [`render`](Self::render); chat back ends use
/// [`to_messages`](Self::to_messages). Both carry the same content.
#[derive(Debug, Clone)]
pub struct Prompt {
    kind: PromptKind,
    system: String,
    history: Vec<ConversationTurn>,
    context: Vec<ScoredChunk>,
    question: String,
}

impl Prompt {
    /// Question-answering prompt over retrieved chunks.
    pub fn answer(
        system: impl Into<String>,
        history: &[ConversationTurn],
        context: Vec<ScoredChunk>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            kind: PromptKind::Answer,
            system: system.into(),
            history: history.to_vec(),
            context,
            question: question.into(),
        }
    }

    /// Prompt asking the model to rewrite `question` so it stands without `history`.
    pub fn condense(history: &[ConversationTurn], question: impl Into<String>) -> Self {
        Self {
            kind: PromptKind::Condense,
            system: String::new(),
            history: history.to_vec(),
            context: Vec::new(),
            question: question.into(),
        }
    }

    /// The user's question.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Retrieved chunks, best first.
    pub fn context(&self) -> &[ScoredChunk] {
        &self.context
    }

    /// Prior turns included in the prompt.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// The system prompt (empty for condense prompts).
    pub fn system(&self) -> &str {
        &self.system
    }

    fn render_history(&self) -> String {
        self.history
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_context(&self) -> String {
        self.context
            .iter()
            .map(|c| c.chunk.content.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Instructions plus retrieved context, used as the system message of chat back ends.
    fn instructions(&self) -> String {
        let mut out = String::new();
        if !self.system.trim().is_empty() {
            out.push_str(self.system.trim());
            out.push_str("\n\n");
        }
        out.push_str(QA_INSTRUCTIONS);
        out.push_str("\n\n");
        out.push_str(&self.render_context());
        out
    }

    /// Single-string form for text-completion back ends.
    pub fn render(&self) -> String {
        match self.kind {
            PromptKind::Condense => format!(
                "{CONDENSE_INSTRUCTIONS}\n\nChat History:\n{}\nFollow Up Input: {}\nStandalone question:",
                self.render_history(),
                self.question
            ),
            PromptKind::Answer => {
                let mut out = self.instructions();
                out.push_str("\n\n");
                if !self.history.is_empty() {
                    out.push_str("Chat History:\n");
                    out.push_str(&self.render_history());
                    out.push_str("\n\n");
                }
                out.push_str("Question: ");
                out.push_str(&self.question);
                out.push_str("\nHelpful Answer:");
                out
            }
        }
    }

    /// Message-list form for chat back ends.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        match self.kind {
            PromptKind::Condense => vec![ChatMessage::new(Role::User, self.render())],
            PromptKind::Answer => {
                let mut messages = Vec::with_capacity(self.history.len() + 2);
                messages.push(ChatMessage::new(Role::System, self.instructions()));
                messages.extend(
                    self.history
                        .iter()
                        .map(|t| ChatMessage::new(t.role, t.content.clone())),
                );
                messages.push(ChatMessage::new(Role::User, self.question.clone()));
                messages
            }
        }
    }

    /// Rough token estimation (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.render().len() / 4
    }
}
