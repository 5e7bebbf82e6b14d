//! Chat transcript and the streaming fragment accumulator.
//!
//! The assistant's reply arrives as a sequence of text fragments. Each turn
//! starts with a user message; fragments for that turn are folded into one
//! assistant message until a fragment carrying [`END_MARKER`] closes it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel the server embeds in the stream to finish an assistant turn.
pub const END_MARKER: &str = "[END]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the transcript. `id` is the turn id shared by a user message
/// and the assistant reply it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
}

/// What happened to a fragment passed to [`Transcript::apply_fragment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOutcome {
    /// A new assistant message was started with the fragment's text.
    Started,
    /// The fragment was appended to the turn's assistant message.
    Appended,
    /// The fragment carried the end marker; the turn is closed.
    Ended,
    /// The turn was already closed or unknown; the fragment was dropped.
    Ignored,
}

/// Returns `true` when `fragment` carries the end-of-turn marker.
pub fn is_end_fragment(fragment: &str) -> bool {
    fragment.contains(END_MARKER)
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    /// Turn currently accepting fragments, if any.
    open_turn: Option<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user message and open a new turn for its reply.
    ///
    /// Any turn still open is closed first; its assistant message keeps
    /// whatever content it had accumulated.
    pub fn push_user(&mut self, text: &str) -> String {
        let turn = Uuid::new_v4().to_string();
        self.messages.push(ChatMessage {
            id: turn.clone(),
            role: Role::User,
            content: text.to_string(),
        });
        self.open_turn = Some(turn.clone());
        turn
    }

    /// Fold one streamed fragment into the transcript.
    pub fn apply_fragment(&mut self, turn: &str, fragment: &str) -> FragmentOutcome {
        if self.open_turn.as_deref() != Some(turn) {
            return FragmentOutcome::Ignored;
        }
        if is_end_fragment(fragment) {
            self.open_turn = None;
            return FragmentOutcome::Ended;
        }

        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant && last.id == turn => {
                last.content.push_str(fragment);
                FragmentOutcome::Appended
            }
            _ => {
                self.messages.push(ChatMessage {
                    id: turn.to_string(),
                    role: Role::Assistant,
                    content: fragment.to_string(),
                });
                FragmentOutcome::Started
            }
        }
    }

    /// Close `turn` without an end marker (connection lost, listener
    /// replaced). No-op if another turn is open.
    pub fn close_turn(&mut self, turn: &str) {
        if self.open_turn.as_deref() == Some(turn) {
            self.open_turn = None;
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.open_turn.is_some()
    }

    pub fn open_turn(&self) -> Option<&str> {
        self.open_turn.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// The assistant reply for `turn`, if one has started.
    pub fn reply_for(&self, turn: &str) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .find(|m| m.role == Role::Assistant && m.id == turn)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.open_turn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fragment_starts_assistant_message() {
        let mut t = Transcript::new();
        let turn = t.push_user("你好");
        assert_eq!(t.apply_fragment(&turn, "Hel"), FragmentOutcome::Started);
        assert_eq!(t.len(), 2);
        let last = t.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hel");
        assert_eq!(last.id, turn);
    }

    #[test]
    fn test_fragments_concatenate_in_order() {
        let mut t = Transcript::new();
        let turn = t.push_user("q");
        for frag in ["天", "地", " ", "人"] {
            t.apply_fragment(&turn, frag);
        }
        assert_eq!(t.reply_for(&turn).unwrap().content, "天地 人");
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_end_marker_is_not_appended() {
        let mut t = Transcript::new();
        let turn = t.push_user("q");
        t.apply_fragment(&turn, "done");
        assert_eq!(t.apply_fragment(&turn, "[END]"), FragmentOutcome::Ended);
        assert_eq!(t.last().unwrap().content, "done");
        assert!(!t.is_streaming());
    }

    #[test]
    fn test_fragment_with_embedded_marker_ends_turn() {
        let mut t = Transcript::new();
        let turn = t.push_user("q");
        t.apply_fragment(&turn, "abc");
        assert_eq!(t.apply_fragment(&turn, "tail[END]"), FragmentOutcome::Ended);
        assert_eq!(t.last().unwrap().content, "abc");
    }

    #[test]
    fn test_finished_turn_is_immutable() {
        let mut t = Transcript::new();
        let turn = t.push_user("q");
        t.apply_fragment(&turn, "a");
        t.apply_fragment(&turn, "[END]");
        assert_eq!(t.apply_fragment(&turn, "late"), FragmentOutcome::Ignored);
        assert_eq!(t.last().unwrap().content, "a");
    }

    #[test]
    fn test_second_turn_starts_new_message() {
        let mut t = Transcript::new();
        let first = t.push_user("one");
        t.apply_fragment(&first, "reply one");
        t.apply_fragment(&first, "[END]");
        let second = t.push_user("two");
        assert_eq!(t.apply_fragment(&second, "reply two"), FragmentOutcome::Started);
        assert_eq!(t.len(), 4);
        assert_eq!(t.reply_for(&first).unwrap().content, "reply one");
        assert_eq!(t.reply_for(&second).unwrap().content, "reply two");
    }

    #[test]
    fn test_stale_turn_fragments_are_ignored() {
        let mut t = Transcript::new();
        let first = t.push_user("one");
        t.apply_fragment(&first, "partial");
        let second = t.push_user("two");
        assert_eq!(t.apply_fragment(&first, " leaked"), FragmentOutcome::Ignored);
        t.apply_fragment(&second, "fresh");
        assert_eq!(t.reply_for(&first).unwrap().content, "partial");
        assert_eq!(t.reply_for(&second).unwrap().content, "fresh");
    }

    #[test]
    fn test_end_before_any_text_leaves_no_assistant_message() {
        let mut t = Transcript::new();
        let turn = t.push_user("q");
        assert_eq!(t.apply_fragment(&turn, "[END]"), FragmentOutcome::Ended);
        assert!(t.reply_for(&turn).is_none());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_close_turn_only_closes_matching() {
        let mut t = Transcript::new();
        let turn = t.push_user("q");
        t.close_turn("other");
        assert!(t.is_streaming());
        t.close_turn(&turn);
        assert!(!t.is_streaming());
    }

    #[test]
    fn test_clear() {
        let mut t = Transcript::new();
        t.push_user("q");
        t.clear();
        assert!(t.is_empty());
        assert!(t.open_turn().is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage {
            id: "x".into(),
            role: Role::Assistant,
            content: "hi".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
    }
}
