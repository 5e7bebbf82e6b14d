//! Streaming chat connection to the learning assistant.
//!
//! ## Design
//! - One WebSocket per [`ChatClient`]; a single reader task owns the stream
//!   half and hands every text frame, in delivery order, to the listener that
//!   is currently attached.
//! - At most one listener exists at a time ([`ListenerSlot`]). Submitting a
//!   new question detaches the previous listener *before* the text is sent,
//!   so fragments of an old turn can never land in the new one.
//! - A listener detaches itself when the end marker arrives. Closing or
//!   dropping the client aborts the reader and detaches everything.
//! - No reconnection: a dropped socket is logged and ends the current turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::ChatError;
use crate::i18n::Language;
use crate::lessons::Lesson;
use crate::transcript::{is_end_fragment, FragmentOutcome, Transcript};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

// ---------------------------------------------------------------------------
// Listener slot
// ---------------------------------------------------------------------------

struct Listener {
    turn: String,
    tx: mpsc::UnboundedSender<String>,
    awaiting_first: bool,
}

/// Holds the one listener that receives incoming fragments.
#[derive(Default)]
pub struct ListenerSlot {
    inner: Mutex<Option<Listener>>,
}

impl ListenerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any attached listener with a fresh one for `turn`.
    ///
    /// The previous listener's channel is closed, which ends its
    /// [`TurnHandle`].
    pub fn attach(&self, turn: &str) -> TurnHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.inner.lock() {
            if let Some(old) = slot.replace(Listener {
                turn: turn.to_string(),
                tx,
                awaiting_first: true,
            }) {
                debug!(old_turn = %old.turn, new_turn = %turn, "replaced chat listener");
            }
        }
        TurnHandle {
            turn: turn.to_string(),
            rx,
        }
    }

    /// Remove the attached listener, if any. Returns its turn id.
    pub fn detach(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(|l| l.turn)
    }

    pub fn attached_turn(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|l| l.turn.clone()))
    }

    /// A turn was submitted and nothing has come back yet.
    pub fn is_awaiting_first(&self) -> bool {
        self.inner
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|l| l.awaiting_first))
            .unwrap_or(false)
    }

    /// Deliver one incoming frame to the attached listener.
    pub fn dispatch(&self, fragment: &str) {
        let Ok(mut slot) = self.inner.lock() else {
            return;
        };
        let Some(listener) = slot.as_mut() else {
            debug!(len = fragment.len(), "fragment arrived with no listener; dropped");
            return;
        };
        listener.awaiting_first = false;
        let delivered = listener.tx.send(fragment.to_string()).is_ok();
        if !delivered || is_end_fragment(fragment) {
            slot.take();
        }
    }
}

/// Receiving end for one turn's fragments.
pub struct TurnHandle {
    turn: String,
    rx: mpsc::UnboundedReceiver<String>,
}

impl TurnHandle {
    pub fn turn(&self) -> &str {
        &self.turn
    }

    /// Next fragment in delivery order; `None` once the listener is detached
    /// (end marker delivered, replaced by a newer turn, or connection lost).
    pub async fn next_fragment(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// How a turn stopped streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    /// The end marker arrived.
    Completed,
    /// The listener went away without an end marker.
    Interrupted,
}

/// Fold a turn's fragments into `transcript`, calling `on_update` after each.
pub async fn run_turn<F>(transcript: &mut Transcript, handle: &mut TurnHandle, mut on_update: F) -> TurnEnd
where
    F: FnMut(&str, FragmentOutcome),
{
    let turn = handle.turn().to_string();
    while let Some(fragment) = handle.next_fragment().await {
        let outcome = transcript.apply_fragment(&turn, &fragment);
        on_update(&fragment, outcome);
        if outcome == FragmentOutcome::Ended {
            return TurnEnd::Completed;
        }
    }
    transcript.close_turn(&turn);
    TurnEnd::Interrupted
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ChatClient {
    sink: tokio::sync::Mutex<WsSink>,
    slot: Arc<ListenerSlot>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl ChatClient {
    /// Open the socket and start the reader task.
    pub async fn connect(url: &str) -> Result<Self, ChatError> {
        let (ws, _resp) = tokio_tungstenite::connect_async(url).await?;
        info!(url, "chat connection open");
        let (sink, mut stream) = ws.split();

        let slot = Arc::new(ListenerSlot::new());
        let connected = Arc::new(AtomicBool::new(true));

        let reader_slot = Arc::clone(&slot);
        let reader_connected = Arc::clone(&connected);
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => reader_slot.dispatch(&text),
                    Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => reader_slot.dispatch(&text),
                        Err(_) => warn!("ignoring non-UTF-8 binary frame"),
                    },
                    Ok(WsMessage::Close(frame)) => {
                        info!(?frame, "chat connection closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "chat connection error");
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
            reader_slot.detach();
        });

        Ok(Self {
            sink: tokio::sync::Mutex::new(sink),
            slot,
            connected,
            reader,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Waiting for the first fragment of the last submitted turn.
    pub fn is_loading(&self) -> bool {
        self.slot.is_awaiting_first()
    }

    /// Check that a new turn may be submitted right now.
    pub fn ready(&self) -> Result<(), ChatError> {
        if !self.is_connected() {
            return Err(ChatError::NotConnected);
        }
        if self.is_loading() {
            return Err(ChatError::Busy);
        }
        Ok(())
    }

    /// Send `message` as turn `turn` and return the handle its fragments
    /// arrive on. Any previously attached listener is detached first.
    pub async fn submit(&self, turn: &str, message: &str) -> Result<TurnHandle, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.ready()?;

        if let Some(old) = self.slot.detach() {
            debug!(old_turn = %old, "detached previous listener before send");
        }
        let handle = self.slot.attach(turn);

        let sent = self
            .sink
            .lock()
            .await
            .send(WsMessage::Text(message.to_string()))
            .await;
        if let Err(e) = sent {
            self.slot.detach();
            self.connected.store(false, Ordering::SeqCst);
            error!(error = %e, "failed to send chat message");
            return Err(e.into());
        }
        debug!(turn, len = message.len(), "chat message sent");
        Ok(handle)
    }

    /// Abandon the current turn without closing the connection.
    pub fn cancel_turn(&self) -> Option<String> {
        self.slot.detach()
    }

    /// Close the socket and stop the reader.
    pub async fn close(self) {
        let _ = self.sink.lock().await.send(WsMessage::Close(None)).await;
        self.slot.detach();
        self.connected.store(false, Ordering::SeqCst);
        // Drop aborts the reader task.
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.slot.detach();
    }
}

// ---------------------------------------------------------------------------
// Message context and quick actions
// ---------------------------------------------------------------------------

/// Prefix the question with the active lesson's title.
pub fn contextual_message(text: &str, lesson: Option<&Lesson>, lang: Language) -> String {
    match lesson {
        Some(l) => format!("[{}: {}] {}", lang.t("lesson.contextLabel"), l.title, text),
        None => text.to_string(),
    }
}

/// A canned question offered before the first message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub title: String,
    pub action: String,
}

/// Lesson-specific quick actions, or general ones when no lesson is active.
pub fn suggestions(lesson: Option<&Lesson>, lang: Language) -> Vec<Suggestion> {
    match lesson {
        Some(l) => [
            ("lesson.explainContent", "lesson.explainAction"),
            ("lesson.practiceProun", "lesson.pronounceAction"),
            ("lesson.relatedVocab", "lesson.vocabAction"),
            ("lesson.culturalBg", "lesson.cultureAction"),
        ]
        .iter()
        .map(|(title, action)| Suggestion {
            title: lang.t(title).to_string(),
            action: format!("{} \"{}\"", lang.t(action), l.title),
        })
        .collect(),
        None => [
            ("chat.basicKnowledge", "chat.learnAction"),
            ("chat.characterPractice", "chat.practiceAction"),
        ]
        .iter()
        .map(|(title, action)| Suggestion {
            title: lang.t(title).to_string(),
            action: lang.t(action).to_string(),
        })
        .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lessons::build_lesson;

    fn lesson() -> Lesson {
        build_lesson("lesson1.md", "# 天地人\n天地人", None)
    }

    #[test]
    fn test_contextual_message_en() {
        let l = lesson();
        assert_eq!(
            contextual_message("what?", Some(&l), Language::En),
            "[Lesson: 天地人] what?"
        );
    }

    #[test]
    fn test_contextual_message_zh() {
        let l = lesson();
        assert_eq!(
            contextual_message("这是什么", Some(&l), Language::Zh),
            "[课程: 天地人] 这是什么"
        );
    }

    #[test]
    fn test_contextual_message_without_lesson() {
        assert_eq!(contextual_message("hi", None, Language::En), "hi");
    }

    #[test]
    fn test_lesson_suggestions_quote_title() {
        let l = lesson();
        let s = suggestions(Some(&l), Language::En);
        assert_eq!(s.len(), 4);
        assert_eq!(s[0].title, "Explain content");
        assert_eq!(
            s[0].action,
            "Please explain the content and meaning of this lesson \"天地人\""
        );
    }

    #[test]
    fn test_general_suggestions() {
        let s = suggestions(None, Language::Zh);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].action, "请教我一些中文基础知识");
    }

    #[tokio::test]
    async fn test_slot_delivers_in_order() {
        let slot = ListenerSlot::new();
        let mut h = slot.attach("t1");
        assert!(slot.is_awaiting_first());
        slot.dispatch("a");
        slot.dispatch("b");
        assert!(!slot.is_awaiting_first());
        assert_eq!(h.next_fragment().await.as_deref(), Some("a"));
        assert_eq!(h.next_fragment().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_slot_end_marker_detaches() {
        let slot = ListenerSlot::new();
        let mut h = slot.attach("t1");
        slot.dispatch("x");
        slot.dispatch("[END]");
        assert!(slot.attached_turn().is_none());
        assert_eq!(h.next_fragment().await.as_deref(), Some("x"));
        assert_eq!(h.next_fragment().await.as_deref(), Some("[END]"));
        assert_eq!(h.next_fragment().await, None);
    }

    #[tokio::test]
    async fn test_slot_attach_replaces_previous() {
        let slot = ListenerSlot::new();
        let mut old = slot.attach("old");
        let mut new = slot.attach("new");
        slot.dispatch("fresh");
        assert_eq!(old.next_fragment().await, None);
        assert_eq!(new.next_fragment().await.as_deref(), Some("fresh"));
        assert_eq!(slot.attached_turn().as_deref(), Some("new"));
    }

    #[test]
    fn test_slot_dispatch_without_listener_is_noop() {
        let slot = ListenerSlot::new();
        slot.dispatch("orphan");
        assert!(slot.attached_turn().is_none());
    }

    #[tokio::test]
    async fn test_slot_dropped_handle_detaches_on_next_dispatch() {
        let slot = ListenerSlot::new();
        drop(slot.attach("t"));
        slot.dispatch("x");
        assert!(slot.attached_turn().is_none());
    }

    #[tokio::test]
    async fn test_run_turn_completes() {
        let slot = ListenerSlot::new();
        let mut transcript = Transcript::new();
        let turn = transcript.push_user("q");
        let mut h = slot.attach(&turn);
        for f in ["你", "好", "[END]"] {
            slot.dispatch(f);
        }
        let mut seen = Vec::new();
        let end = run_turn(&mut transcript, &mut h, |f, _| seen.push(f.to_string())).await;
        assert_eq!(end, TurnEnd::Completed);
        assert_eq!(transcript.reply_for(&turn).unwrap().content, "你好");
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_run_turn_interrupted_closes_turn() {
        let slot = ListenerSlot::new();
        let mut transcript = Transcript::new();
        let turn = transcript.push_user("q");
        let mut h = slot.attach(&turn);
        slot.dispatch("part");
        slot.detach();
        let end = run_turn(&mut transcript, &mut h, |_, _| {}).await;
        assert_eq!(end, TurnEnd::Interrupted);
        assert!(!transcript.is_streaming());
        assert_eq!(transcript.reply_for(&turn).unwrap().content, "part");
    }
}
