//! In-memory answer cache keyed by normalized question

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use askdocs_config::CacheConfig;
use askdocs_core::Question;

use crate::pipeline::AnswerOutput;

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
        }
    }
}

struct Entry {
    output: AnswerOutput,
    inserted_at: Instant,
}

/// TTL- and size-bounded answer cache
///
/// When full, the oldest entry is evicted.
pub struct AnswerCache {
    entries: Mutex<HashMap<String, Entry>>,
    settings: CacheSettings,
}

impl AnswerCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Cached answer for `question`, if present and fresh
    pub fn get(&self, question: &Question) -> Option<AnswerOutput> {
        let key = question.normalized();
        let mut entries = self.entries.lock();

        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.settings.ttl => {
                Some(entry.output.clone())
            },
            Some(_) => {
                entries.remove(&key);
                None
            },
            None => None,
        }
    }

    pub fn insert(&self, question: &Question, output: AnswerOutput) {
        if self.settings.max_entries == 0 {
            return;
        }

        let key = question.normalized();
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.settings.max_entries {
            let ttl = self.settings.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() < ttl);

            if entries.len() >= self.settings.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            Entry {
                output,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
