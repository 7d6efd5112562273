//! Conversation history for the chat shell.
//!
//! History is display-only: routing never looks at earlier turns.

use crate::router::{Answer, RouteLabel};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Route that produced an assistant turn.
    pub route: Option<RouteLabel>,
    /// Source label of an assistant turn.
    pub source: Option<String>,
    pub at: DateTime<Utc>,
}

/// Append-only list of turns, cleared only by [`ChatSession::clear`].
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_user(&mut self, question: &str) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: question.to_string(),
            route: None,
            source: None,
            at: Utc::now(),
        });
    }

    pub fn record_assistant(&mut self, answer: &Answer) {
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: answer.text.clone(),
            route: Some(answer.route),
            source: Some(answer.source_info.clone()),
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::AnswerOutcome;

    fn answer(text: &str) -> Answer {
        Answer {
            text: text.to_string(),
            route: RouteLabel::PressReleases,
            source_info: "Press Releases (2 articles)".to_string(),
            outcome: AnswerOutcome::Answered,
            sources: Vec::new(),
            sql: None,
        }
    }

    #[test]
    fn test_turns_are_appended_in_order() {
        let mut session = ChatSession::new();
        session.record_user("What dividend was declared?");
        session.record_assistant(&answer("$1.01 per share."));
        session.record_user("And the one before?");

        let turns = session.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].route, Some(RouteLabel::PressReleases));
        assert_eq!(turns[1].source.as_deref(), Some("Press Releases (2 articles)"));
        assert_eq!(turns[2].content, "And the one before?");
    }

    #[test]
    fn test_clear_empties_history() {
        let mut session = ChatSession::new();
        session.record_user("hi");
        assert!(!session.is_empty());
        session.clear();
        assert!(session.is_empty());
    }
}
