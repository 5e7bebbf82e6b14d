//! Local key-value preference store.
//!
//! A flat JSON object on disk, written through on every `set`. Only UI
//! preferences live here (currently the display language).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, TutorError};
use crate::i18n::Language;

/// Key under which the display language is stored.
pub const LANGUAGE_KEY: &str = "language";

pub struct PreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl PreferenceStore {
    /// Open the store at `path`. A missing file is an empty store; a corrupt
    /// one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable preference file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    /// Default location: `<config dir>/pinyin-tutor/prefs.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pinyin-tutor").join("prefs.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Stored display language, defaulting to Chinese.
    pub fn language(&self) -> Language {
        self.get(LANGUAGE_KEY)
            .and_then(Language::from_code)
            .unwrap_or_default()
    }

    pub fn set_language(&mut self, lang: Language) -> Result<()> {
        self.set(LANGUAGE_KEY, lang.code())
    }

    /// Flip the stored language and persist it. Returns the new language.
    pub fn toggle_language(&mut self) -> Result<Language> {
        let next = self.language().toggle();
        self.set_language(next)?;
        Ok(next)
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, text)
            .map_err(|e| TutorError::Prefs(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }
}
