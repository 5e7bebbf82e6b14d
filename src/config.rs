//! Runtime configuration.
//!
//! Values come from (lowest to highest precedence) built-in defaults, a TOML
//! file, the `PINYIN_TUTOR_HOST` environment variable, and CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::definition::LookupPolicy;
use crate::error::{Result, TutorError};
use crate::lessons::{Difficulty, LessonSource, DEFAULT_LESSON_FILES};

pub const HOST_ENV: &str = "PINYIN_TUTOR_HOST";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Backend host serving both the chat socket and `/query`.
    pub host: String,
    pub port: u16,
    /// Use `wss`/`https` instead of `ws`/`http`.
    pub secure: bool,
    pub ws_path: String,
    /// Directory path or `http(s)://` base URL for lesson files.
    pub lesson_source: String,
    /// Empty means: discover `*.md` in a directory source.
    pub lesson_files: Vec<String>,
    /// Difficulty sent with definition lookups.
    pub difficulty: Difficulty,
    /// External text-to-speech program.
    pub tts_command: String,
    pub lookup: LookupConfig,
}

/// Definition cache and retry settings, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub stale_after_secs: u64,
    pub evict_after_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        let p = LookupPolicy::default();
        Self {
            stale_after_secs: p.stale_after.as_secs(),
            evict_after_secs: p.evict_after.as_secs(),
            retries: p.retries,
            retry_delay_ms: p.retry_delay.as_millis() as u64,
        }
    }
}

impl LookupConfig {
    pub fn policy(&self) -> LookupPolicy {
        LookupPolicy {
            stale_after: Duration::from_secs(self.stale_after_secs),
            evict_after: Duration::from_secs(self.evict_after_secs),
            retries: self.retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8090,
            secure: false,
            ws_path: "/ws".to_string(),
            lesson_source: "lesson".to_string(),
            lesson_files: DEFAULT_LESSON_FILES.iter().map(|s| s.to_string()).collect(),
            difficulty: Difficulty::Beginner,
            tts_command: "espeak-ng".to_string(),
            lookup: LookupConfig::default(),
        }
    }
}

impl TutorConfig {
    /// Default location: `<config dir>/pinyin-tutor/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pinyin-tutor").join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TutorError::Config(e.to_string()))
    }

    /// Read `path`. A missing file yields defaults; a malformed one is an
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "loaded config file");
                Self::from_toml(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `PINYIN_TUTOR_HOST` if set.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var(HOST_ENV) {
            if !host.trim().is_empty() {
                self.host = host.trim().to_string();
            }
        }
    }

    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = if self.ws_path.starts_with('/') {
            self.ws_path.clone()
        } else {
            format!("/{}", self.ws_path)
        };
        format!("{scheme}://{}:{}{path}", self.host, self.port)
    }

    pub fn http_base(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    pub fn lesson_source(&self) -> LessonSource {
        LessonSource::parse(&self.lesson_source)
    }

    pub fn lookup_policy(&self) -> LookupPolicy {
        self.lookup.policy()
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TutorError::Config("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(TutorError::Config("port must be non-zero".into()));
        }
        if self.lookup.evict_after_secs < self.lookup.stale_after_secs {
            return Err(TutorError::Config(
                "lookup.evict_after_secs must be >= lookup.stale_after_secs".into(),
            ));
        }
        Ok(())
    }
}
