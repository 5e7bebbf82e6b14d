//! Word definition lookup against the remote `/query` endpoint.
//!
//! Results are cached per (word, language, difficulty). A cached entry is
//! served without a network call while fresh; once stale it is refetched,
//! and it is evicted entirely after `evict_after`. Failed fetches are retried
//! a fixed number of times with a fixed delay, then resolve to
//! [`DefinitionState::Absent`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use colored::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LookupError;
use crate::i18n::Language;
use crate::lessons::Difficulty;

// -- Wire types ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordDefinition {
    pub definition: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub word: &'a str,
    pub lang: Language,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<WordDefinition>,
    #[serde(default)]
    pub message: Option<String>,
}

// -- Policy and state ---------------------------------------------------------

/// Cache and retry parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupPolicy {
    /// Entries younger than this are served from cache.
    pub stale_after: Duration,
    /// Entries older than this are dropped.
    pub evict_after: Duration,
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5 * 60),
            evict_after: Duration::from_secs(30 * 60),
            retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    pub word: String,
    pub lang: Language,
    pub difficulty: Difficulty,
}

/// What a popup shows for a word's definition.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionState {
    Loading,
    Ready(WordDefinition),
    Absent,
}

impl DefinitionState {
    fn from_option(value: Option<WordDefinition>) -> Self {
        match value {
            Some(def) if !def.definition.trim().is_empty() => DefinitionState::Ready(def),
            _ => DefinitionState::Absent,
        }
    }

    /// Definition text, the loading label, or the localised placeholder.
    pub fn display_text(&self, lang: Language) -> String {
        match self {
            DefinitionState::Loading => lang.t("common.loading").to_string(),
            DefinitionState::Ready(def) => def.definition.clone(),
            DefinitionState::Absent => no_definition_text(lang).to_string(),
        }
    }

    pub fn examples(&self) -> &[String] {
        match self {
            DefinitionState::Ready(def) => &def.examples,
            _ => &[],
        }
    }
}

pub fn no_definition_text(lang: Language) -> &'static str {
    lang.t("popup.noDefinition")
}

struct CacheEntry {
    value: Option<WordDefinition>,
    fetched_at: Instant,
}

// -- Client -------------------------------------------------------------------

pub struct DefinitionClient {
    client: reqwest::Client,
    endpoint: String,
    policy: LookupPolicy,
    cache: Mutex<HashMap<LookupKey, CacheEntry>>,
    network_calls: AtomicU64,
}

impl DefinitionClient {
    /// `base_url` is the service root, e.g. `http://localhost:8090`.
    pub fn new(base_url: &str, policy: LookupPolicy) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, policy)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, policy: LookupPolicy) -> Self {
        Self {
            client,
            endpoint: format!("{}/query", base_url.trim_end_matches('/')),
            policy,
            cache: Mutex::new(HashMap::new()),
            network_calls: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &LookupPolicy {
        &self.policy
    }

    /// Total HTTP requests issued, retries included.
    pub fn network_calls(&self) -> u64 {
        self.network_calls.load(Ordering::Relaxed)
    }

    /// Resolve a word's definition.
    pub async fn lookup(&self, word: &str, lang: Language, difficulty: Difficulty) -> DefinitionState {
        let word = word.trim();
        if word.is_empty() {
            return DefinitionState::Absent;
        }
        let key = LookupKey {
            word: word.to_string(),
            lang,
            difficulty,
        };

        let stale = match self.cached(&key) {
            CacheHit::Fresh(value) => {
                debug!(word, %lang, "definition served from cache");
                return DefinitionState::from_option(value);
            }
            CacheHit::Stale(value) => Some(value),
            CacheHit::Miss => None,
        };

        match self.fetch_with_retry(&key).await {
            Ok(value) => {
                self.store(key, value.clone());
                DefinitionState::from_option(value)
            }
            Err(e) => {
                warn!(word, %lang, error = %e, "definition lookup failed");
                stale.map(DefinitionState::from_option).unwrap_or(DefinitionState::Absent)
            }
        }
    }

    /// Drop entries past the eviction window. Runs on every store.
    pub fn prune(&self) {
        let evict_after = self.policy.evict_after;
        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|_, e| e.fetched_at.elapsed() < evict_after);
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn cached(&self, key: &LookupKey) -> CacheHit {
        let Ok(mut cache) = self.cache.lock() else {
            return CacheHit::Miss;
        };
        let Some(entry) = cache.get(key) else {
            return CacheHit::Miss;
        };
        let age = entry.fetched_at.elapsed();
        if age >= self.policy.evict_after {
            cache.remove(key);
            CacheHit::Miss
        } else if age < self.policy.stale_after {
            CacheHit::Fresh(entry.value.clone())
        } else {
            CacheHit::Stale(entry.value.clone())
        }
    }

    fn store(&self, key: LookupKey, value: Option<WordDefinition>) {
        self.prune();
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                key,
                CacheEntry {
                    value,
                    fetched_at: Instant::now(),
                },
            );
        }
    }

    async fn fetch_with_retry(&self, key: &LookupKey) -> Result<Option<WordDefinition>, LookupError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(key).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.policy.retries => {
                    attempt += 1;
                    debug!(word = %key.word, attempt, error = %e, "retrying definition lookup");
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, key: &LookupKey) -> Result<Option<WordDefinition>, LookupError> {
        self.network_calls.fetch_add(1, Ordering::Relaxed);
        let body = QueryRequest {
            word: &key.word,
            lang: key.lang,
            difficulty: key.difficulty,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LookupError::Transport {
                url: self.endpoint.clone(),
                detail: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(LookupError::Http {
                status: resp.status().as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let parsed: QueryResponse = resp.json().await.map_err(|e| LookupError::Transport {
            url: self.endpoint.clone(),
            detail: e.to_string(),
        })?;
        if !parsed.success {
            debug!(word = %key.word, message = ?parsed.message, "server has no definition");
            return Ok(None);
        }
        Ok(parsed.data)
    }
}

enum CacheHit {
    Fresh(Option<WordDefinition>),
    Stale(Option<WordDefinition>),
    Miss,
}

// -- Popup --------------------------------------------------------------------

/// Everything the word popup displays for one character.
#[derive(Debug, Clone, PartialEq)]
pub struct WordPopup {
    pub word: String,
    pub pinyin: String,
    pub state: DefinitionState,
}

impl WordPopup {
    pub fn loading(word: &str, pinyin: &str) -> Self {
        Self {
            word: word.to_string(),
            pinyin: pinyin.to_string(),
            state: DefinitionState::Loading,
        }
    }

    pub fn resolve(&mut self, state: DefinitionState) {
        self.state = state;
    }

    /// Terminal rendering with numbered examples.
    pub fn render(&self, lang: Language) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}  {}\n",
            self.word.bright_white().bold(),
            self.pinyin.bright_blue()
        ));
        out.push_str(&format!("{}\n", "-".repeat(32).dimmed()));
        out.push_str(&format!("{}\n", lang.t("popup.definition").bright_yellow()));
        out.push_str(&format!("  {}\n", self.state.display_text(lang)));

        let examples = self.state.examples();
        if !examples.is_empty() {
            out.push_str(&format!("{}\n", lang.t("popup.examples").bright_yellow()));
            for (i, ex) in examples.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, ex));
            }
        }
        out
    }
}
