//! Process-wide catalog of synthesis voices

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::language::LanguageTag;

/// A voice offered by the speech engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-specific voice identifier
    pub name: String,
    /// Language tag the voice speaks (e.g. "hi-IN")
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Voices keyed by language, populated once by the platform.
///
/// Readers that find the catalog empty wait on [`VoiceCatalog::wait_ready`]
/// instead of polling.
pub struct VoiceCatalog {
    voices: RwLock<Vec<Voice>>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

static GLOBAL_CATALOG: OnceLock<Arc<VoiceCatalog>> = OnceLock::new();

impl VoiceCatalog {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            voices: RwLock::new(Vec::new()),
            ready_tx,
            ready_rx,
        }
    }

    /// Shared catalog for the whole process, created on first use
    pub fn global() -> Arc<VoiceCatalog> {
        Arc::clone(GLOBAL_CATALOG.get_or_init(|| Arc::new(VoiceCatalog::new())))
    }

    /// Install the platform's voice list.
    ///
    /// The first non-empty list wins; later calls are ignored so the catalog
    /// stays read-only once ready.
    pub fn populate(&self, voices: Vec<Voice>) {
        if voices.is_empty() {
            debug!("Ignoring empty voice list");
            return;
        }
        if self.is_ready() {
            debug!("Voice catalog already populated, ignoring {} voices", voices.len());
            return;
        }

        let count = voices.len();
        match self.voices.write() {
            Ok(mut guard) => *guard = voices,
            Err(poisoned) => *poisoned.into_inner() = voices,
        }
        self.ready_tx.send_replace(true);

        info!("Voice catalog ready ({} voices)", count);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Wait until the catalog is populated; returns immediately when it already is
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Like [`wait_ready`](Self::wait_ready) but gives up after `limit`.
    /// Returns whether the catalog became ready.
    pub async fn wait_ready_for(&self, limit: Duration) -> bool {
        if self.is_ready() {
            return true;
        }
        if tokio::time::timeout(limit, self.wait_ready()).await.is_err() {
            warn!("Voice catalog not ready after {:?}, using engine default voice", limit);
            return false;
        }
        true
    }

    pub fn voices(&self) -> Vec<Voice> {
        match self.voices.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Best voice for `language`: exact tag, then same base language, then the
    /// first voice in the catalog
    pub fn pick(&self, language: &LanguageTag) -> Option<Voice> {
        let voices = match self.voices.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let base = language.base();
        voices
            .iter()
            .find(|v| language.matches(&v.lang))
            .or_else(|| {
                voices
                    .iter()
                    .find(|v| LanguageTag::new(v.lang.as_str()).base() == base)
            })
            .or_else(|| voices.first())
            .cloned()
    }
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}
