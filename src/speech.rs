//! Text-to-speech playback.
//!
//! The popup offers three kinds of playback: the word's pronunciation, its
//! definition, and each example sentence. Only one utterance plays at a time:
//! starting one cancels whatever is active, and triggering the active one
//! again stops it.

use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{Result, TutorError};
use crate::i18n::Language;

/// Rate used for single-word pronunciation.
pub const PRONUNCIATION_RATE: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeechCategory {
    Pronunciation,
    Definition,
    /// Zero-based example index.
    Example(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// BCP-47 tag, e.g. `zh-CN`.
    pub lang: String,
    /// Relative speaking rate, 1.0 = normal.
    pub rate: f32,
}

impl Utterance {
    pub fn new(text: &str, lang: &str, rate: f32) -> Self {
        Self {
            text: text.to_string(),
            lang: lang.to_string(),
            rate,
        }
    }

    /// Pronunciation of a Chinese word.
    pub fn pronunciation(word: &str) -> Self {
        Self::new(word, Language::Zh.speech_tag(), PRONUNCIATION_RATE)
    }

    /// Definition or example text in the UI language.
    pub fn in_language(text: &str, lang: Language) -> Self {
        Self::new(text, lang.speech_tag(), 1.0)
    }
}

/// Host speech backend.
pub trait SpeechEngine {
    /// Start speaking. Must not block until the utterance finishes.
    fn speak(&mut self, utterance: &Utterance) -> Result<()>;
    /// Stop any utterance in progress. Idempotent.
    fn cancel(&mut self);
    /// `true` once the last started utterance has ended on its own.
    fn is_finished(&mut self) -> bool;
}

/// Idle / playing state machine over a [`SpeechEngine`].
pub struct SpeechController<E: SpeechEngine> {
    engine: E,
    active: Option<SpeechCategory>,
}

impl<E: SpeechEngine> SpeechController<E> {
    pub fn new(engine: E) -> Self {
        Self { engine, active: None }
    }

    pub fn active(&self) -> Option<SpeechCategory> {
        self.active
    }

    pub fn is_playing(&self, category: SpeechCategory) -> bool {
        self.active == Some(category)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// User clicked the play control for `category`.
    ///
    /// Playing → idle when it is the active category; otherwise the active
    /// utterance is cancelled and `utterance` starts. Returns whether
    /// `category` is now playing.
    pub fn toggle(&mut self, category: SpeechCategory, utterance: &Utterance) -> bool {
        if self.is_playing(category) {
            self.stop();
            return false;
        }
        self.play(category, utterance)
    }

    /// Start `utterance` for `category`, cancelling anything active first.
    pub fn play(&mut self, category: SpeechCategory, utterance: &Utterance) -> bool {
        self.stop();
        match self.engine.speak(utterance) {
            Ok(()) => {
                debug!(?category, lang = %utterance.lang, "speech started");
                self.active = Some(category);
                true
            }
            Err(e) => {
                warn!(?category, error = %e, "speech failed to start");
                false
            }
        }
    }

    pub fn stop(&mut self) {
        if self.active.take().is_some() {
            self.engine.cancel();
        }
    }

    /// Playback of `category` completed.
    pub fn finished(&mut self, category: SpeechCategory) {
        if self.is_playing(category) {
            self.active = None;
        }
    }

    /// Playback of `category` errored.
    pub fn failed(&mut self, category: SpeechCategory) {
        if self.is_playing(category) {
            warn!(?category, "speech playback error");
            self.active = None;
        }
    }

    /// Poll the engine and clear the active category once it has finished.
    pub fn poll(&mut self) {
        if let Some(category) = self.active {
            if self.engine.is_finished() {
                self.finished(category);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// System TTS command backend
// ---------------------------------------------------------------------------

/// Speaks through an external program such as `espeak-ng`.
///
/// The program is invoked as `<program> -v <voice> -s <words/min> <text>`.
pub struct CommandSpeechEngine {
    program: String,
    child: Option<Child>,
}

impl CommandSpeechEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            child: None,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed for `utterance`.
    pub fn args_for(utterance: &Utterance) -> Vec<String> {
        let voice = match utterance.lang.split('-').next() {
            Some("zh") => "cmn",
            Some("en") => "en-us",
            Some(other) => other,
            None => "en-us",
        };
        // espeak's default is 175 words/min
        let wpm = (175.0 * utterance.rate).round() as u32;
        vec![
            "-v".to_string(),
            voice.to_string(),
            "-s".to_string(),
            wpm.to_string(),
            utterance.text.clone(),
        ]
    }
}

impl SpeechEngine for CommandSpeechEngine {
    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        self.cancel();
        let child = Command::new(&self.program)
            .args(Self::args_for(utterance))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| TutorError::Speech(format!("{}: {e}", self.program)))?;
        self.child = Some(child);
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn is_finished(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(_)) | Err(_) => {
                    self.child = None;
                    true
                }
                Ok(None) => false,
            },
            None => true,
        }
    }
}

impl Drop for CommandSpeechEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}
