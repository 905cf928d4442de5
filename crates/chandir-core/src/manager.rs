//! DirectoryManager: single owner of the channel directory state.
//!
//! Every mutation takes the state write lock once, bumps `rev`, and then
//! announces `DirectoryEvent::StateUpdated` on a broadcast channel. Observers
//! re-read the state through `snapshot()`.
//!
//! A refresh is fetch → parse → publish → persist. The fetch runs outside
//! the lock; its result is applied only if no newer refresh has been issued
//! in the meantime (see `generation`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::DirectoryError;
use crate::fetch::Fetcher;
use crate::parser::parse_directory;
use crate::query::filtered;
use crate::record::{Record, RecordId};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Failed(String),
}

/// Published state. Consumers read it, only the manager writes it.
#[derive(Debug, Clone, Serialize, Default)]
pub struct DirectoryState {
    /// Monotonic revision counter, incremented on every change.
    pub rev: u64,
    /// Last successfully loaded directory. Kept while loading or failed.
    pub records: Vec<Record>,
    pub status: LoadStatus,
    pub search_term: String,
    /// When the directory in `records` was fetched.
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Record picked for playback.
    pub selected: Option<RecordId>,
}

impl DirectoryState {
    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            LoadStatus::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    /// Records matching the current search term.
    pub fn visible(&self) -> Vec<Record> {
        filtered(&self.records, &self.search_term)
    }

    pub fn selected_record(&self) -> Option<&Record> {
        let id = self.selected?;
        self.records.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DirectoryEvent {
    StateUpdated { rev: u64 },
}

/// What happened to one `refresh` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Loaded { count: usize },
    Failed(DirectoryError),
    /// A newer refresh was issued before this one finished; its result was
    /// dropped.
    Superseded,
}

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct DirectoryManager {
    inner: Arc<Inner>,
}

struct Inner {
    state: RwLock<DirectoryState>,
    cache: CacheStore,
    fetcher: Fetcher,
    default_url: String,
    /// Id of the most recently issued refresh.
    generation: AtomicU64,
    events: broadcast::Sender<DirectoryEvent>,
}

impl DirectoryManager {
    /// Build a manager seeded from whatever the cache holds.
    pub fn new(fetcher: Fetcher, cache: CacheStore, default_url: impl Into<String>) -> Self {
        let mut state = DirectoryState {
            rev: 1,
            ..Default::default()
        };
        match cache.load_entry() {
            Some(entry) => {
                info!(
                    "Loaded {} cached channels from {}",
                    entry.records.len(),
                    cache.path().display()
                );
                state.records = entry.records;
                state.last_refreshed = Some(entry.saved_at);
            }
            None => info!("No cached directory, starting empty"),
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                cache,
                fetcher,
                default_url: default_url.into(),
                generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = Fetcher::new(&config.source.user_agent, config.source.timeout())?;
        let cache = CacheStore::new(&config.cache.dir);
        Ok(Self::new(fetcher, cache, config.source.default_url.clone()))
    }

    pub fn default_url(&self) -> &str {
        &self.inner.default_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> DirectoryState {
        self.inner.state.read().await.clone()
    }

    pub async fn visible(&self) -> Vec<Record> {
        self.inner.state.read().await.visible()
    }

    /// Fetch `source_url` (or the default when `None`/blank), parse it and
    /// publish the result. Failures end up in `LoadStatus::Failed`; the
    /// previous directory stays in place.
    ///
    /// The work runs on its own task, so dropping the returned future does
    /// not stop a started refresh from reaching Idle or Failed.
    pub async fn refresh(&self, source_url: Option<&str>) -> RefreshOutcome {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let source = source_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.inner.default_url.as_str())
            .to_string();

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.run_refresh(generation, source).await });
        task.await.unwrap_or_else(|e| {
            warn!("Refresh task did not finish: {}", e);
            RefreshOutcome::Superseded
        })
    }

    /// Run `refresh` on a background task.
    pub fn spawn_refresh(
        &self,
        source_url: Option<String>,
    ) -> tokio::task::JoinHandle<RefreshOutcome> {
        let manager = self.clone();
        tokio::spawn(async move { manager.refresh(source_url.as_deref()).await })
    }

    /// Remove the cached directory and empty the in-memory one. The load
    /// status is left alone.
    pub async fn clear_cache(&self) {
        let mut state = self.inner.state.write().await;
        self.inner.cache.clear().await;
        state.records.clear();
        state.selected = None;
        state.last_refreshed = None;
        state.rev += 1;
        info!("Cleared channel cache");
        self.inner.notify(state.rev);
    }

    pub async fn set_search_term(&self, term: impl Into<String>) {
        let term = term.into();
        let mut state = self.inner.state.write().await;
        if state.search_term == term {
            return;
        }
        debug!("Search term set to {:?}", term);
        state.search_term = term;
        state.rev += 1;
        self.inner.notify(state.rev);
    }

    /// Mark a record for playback. Returns it, or `None` for an unknown id.
    pub async fn select(&self, id: RecordId) -> Option<Record> {
        let mut state = self.inner.state.write().await;
        let record = state.records.iter().find(|r| r.id == id)?.clone();
        if state.selected != Some(id) {
            state.selected = Some(id);
            state.rev += 1;
            self.inner.notify(state.rev);
        }
        Some(record)
    }
}

impl Inner {
    async fn run_refresh(&self, generation: u64, source: String) -> RefreshOutcome {
        let url = match Url::parse(&source) {
            Ok(url) => url,
            Err(e) => {
                warn!("Refusing to refresh from {:?}: {}", source, e);
                return self.complete(generation, Err(DirectoryError::InvalidUrl)).await;
            }
        };

        let started = self
            .apply_if_current(generation, |state| {
                state.status = LoadStatus::Loading;
            })
            .await;
        if !started {
            return RefreshOutcome::Superseded;
        }

        info!("Refreshing channel directory from {}", url);
        let result = self
            .fetcher
            .fetch_text(url)
            .await
            .map(|body| parse_directory(&body));
        self.complete(generation, result).await
    }

    async fn complete(
        &self,
        generation: u64,
        result: Result<Vec<Record>, DirectoryError>,
    ) -> RefreshOutcome {
        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping stale refresh result (generation {})", generation);
            return RefreshOutcome::Superseded;
        }

        let outcome = match result {
            Ok(records) => {
                info!("Loaded {} channels", records.len());
                let selected = state
                    .selected_record()
                    .and_then(|old| records.iter().find(|r| r.same_entry(old)))
                    .map(|r| r.id);
                state.selected = selected;
                state.records = records;
                state.status = LoadStatus::Idle;
                state.last_refreshed = Some(Utc::now());
                // Cache writes stay under the lock, in state order.
                self.cache.save(&state.records).await;
                RefreshOutcome::Loaded {
                    count: state.records.len(),
                }
            }
            Err(err) => {
                warn!("Refresh failed: {}", err);
                state.status = LoadStatus::Failed(err.to_string());
                RefreshOutcome::Failed(err)
            }
        };
        state.rev += 1;
        self.notify(state.rev);
        outcome
    }

    async fn apply_if_current<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut DirectoryState),
    {
        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        f(&mut state);
        state.rev += 1;
        self.notify(state.rev);
        true
    }

    fn notify(&self, rev: u64) {
        // No subscribers is fine.
        let _ = self.events.send(DirectoryEvent::StateUpdated { rev });
    }
}
