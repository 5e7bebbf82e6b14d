//! Chinese lesson study client.
//!
//! - [`annotate`]: per-character pinyin annotation and terminal layout
//! - [`definition`]: cached, retrying word lookups against `/query`
//! - [`speech`]: one-at-a-time text-to-speech playback
//! - [`chat`] + [`transcript`]: streaming assistant replies over WebSocket
//! - [`lessons`] + [`search`]: lesson loading, navigation, and filtering

pub mod annotate;
pub mod chat;
pub mod cli;
pub mod config;
pub mod definition;
pub mod error;
pub mod i18n;
pub mod lessons;
pub mod prefs;
pub mod search;
pub mod speech;
pub mod transcript;

pub use annotate::{annotate, char_pinyin, is_target_script, CharInfo, PinyinStyle, PinyinView};
pub use chat::{run_turn, ChatClient, TurnEnd, TurnHandle};
pub use config::TutorConfig;
pub use definition::{DefinitionClient, DefinitionState, LookupPolicy, WordDefinition, WordPopup};
pub use error::{ChatError, LookupError, Result, TutorError};
pub use i18n::Language;
pub use lessons::{Difficulty, Lesson, LessonLibrary, LessonLoader, LessonSource};
pub use speech::{CommandSpeechEngine, SpeechCategory, SpeechController, SpeechEngine, Utterance};
pub use transcript::{ChatMessage, FragmentOutcome, Role, Transcript, END_MARKER};
