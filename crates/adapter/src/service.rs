use chrono::{DateTime, Utc};
use domain::{
    analyze_tree, AnalysisEvent, AnalysisParams, CacheEntry, CacheKey, CacheLookup, CacheTable,
    Fingerprint, Thread, Tolerance, TreeReport,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::summarize::Summarizer;
use crate::traits::{CacheStore, ThreadSource};

#[derive(Debug, Clone, Copy)]
pub struct AnalysisSettings {
    /// Length of both ranked lists in the report.
    pub top_k: usize,
    pub tolerance: Tolerance,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            tolerance: Tolerance::default(),
        }
    }
}

/// What a caller gets back for one request, fresh or cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub url: String,
    pub analysis: String,
    pub eli5: Option<String>,
    pub notable: TreeReport,
    pub from_cache: bool,
    pub created_at: DateTime<Utc>,
}

/// Cache action decided by a lookup, detached from the table it borrowed.
enum Action {
    Reuse { index: usize, entry: CacheEntry },
    Append,
    Replace { index: usize },
}

impl From<CacheLookup<'_>> for Action {
    fn from(lookup: CacheLookup<'_>) -> Self {
        match lookup {
            CacheLookup::Hit { index, entry } => Action::Reuse {
                index,
                entry: entry.clone(),
            },
            CacheLookup::Miss => Action::Append,
            CacheLookup::CapabilityMiss { index } | CacheLookup::ToleranceMiss { index } => {
                Action::Replace { index }
            }
        }
    }
}

struct Inner {
    source: Arc<dyn ThreadSource>,
    summarizer: Summarizer,
    store: Arc<dyn CacheStore>,
    settings: AnalysisSettings,
    events: broadcast::Sender<AnalysisEvent>,
    key_locks: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    table_lock: tokio::sync::Mutex<()>,
}

/// Serves analysis requests: fetch, match against the cache, analyse on a
/// miss, persist.
///
/// Requests for the same cache key are serialised for their whole duration,
/// so a second identical request waits and then hits the row the first one
/// wrote. Every table write reloads the table first and happens under a
/// global lock, so writers for different keys never overwrite each other's
/// rows.
#[derive(Clone)]
pub struct AnalysisService {
    inner: Arc<Inner>,
}

impl AnalysisService {
    pub fn new(
        source: Arc<dyn ThreadSource>,
        summarizer: Summarizer,
        store: Arc<dyn CacheStore>,
        settings: AnalysisSettings,
        events: broadcast::Sender<AnalysisEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                summarizer,
                store,
                settings,
                events,
                key_locks: Mutex::new(HashMap::new()),
                table_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub async fn analyze(&self, params: AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        let url = params.url.clone();
        let result = self.run(params).await;
        if let Err(e) = &result {
            warn!("Analysis of {} failed: {}", url, e);
            self.emit(AnalysisEvent::Failed {
                url,
                reason: e.to_string(),
            });
        }
        result
    }

    async fn run(&self, params: AnalysisParams) -> Result<AnalysisOutcome, AnalysisError> {
        params.validate()?;
        self.emit(AnalysisEvent::Started {
            url: params.url.clone(),
        });

        let data = self
            .inner
            .source
            .fetch_thread(&params.url)
            .await
            .map_err(AnalysisError::ThreadUnavailable)?;
        let thread = Thread::try_from(data)?;

        let key_lock = self.key_lock(params.cache_key());
        let result = {
            let _key_guard = key_lock.lock().await;
            self.dispatch(thread, &params).await
        };
        self.release_key_lock(key_lock);
        result
    }

    async fn dispatch(
        &self,
        thread: Thread,
        params: &AnalysisParams,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let table = self.load_table().await?;
        let lookup = table.lookup(&thread, params);
        info!("Cache {} for {}", lookup.kind(), params.url);

        match Action::from(lookup) {
            Action::Reuse { index, entry } => self.serve_cached(&thread, params, index, entry).await,
            Action::Append => self.analyze_fresh(thread, params, None).await,
            Action::Replace { index } => self.analyze_fresh(thread, params, Some(index)).await,
        }
    }

    async fn serve_cached(
        &self,
        thread: &Thread,
        params: &AnalysisParams,
        index: usize,
        mut entry: CacheEntry,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        self.emit(AnalysisEvent::CacheHit {
            url: params.url.clone(),
            index,
        });

        if params.include_eli5 && !entry.has_eli5() {
            match self.inner.summarizer.eli5(&entry.analysis_text).await {
                Ok(text) => {
                    self.write_table(|table| table.patch_eli5(index, text.clone()))
                        .await?;
                    info!("Patched ELI5 summary into cached row {} for {}", index, params.url);
                    self.emit(AnalysisEvent::Eli5Patched {
                        url: params.url.clone(),
                        index,
                    });
                    entry.eli5_text = Some(text);
                }
                Err(e) => warn!("ELI5 summary for {} failed: {}", params.url, e),
            }
        }

        let notable = match serde_json::from_str::<TreeReport>(&entry.notable_comments) {
            Ok(report) => report,
            Err(e) => {
                warn!("Cached report for {} is unreadable ({}); recomputing", params.url, e);
                analyze_tree(thread, self.inner.settings.top_k)
            }
        };

        self.emit(AnalysisEvent::Completed {
            url: params.url.clone(),
            from_cache: true,
        });
        Ok(AnalysisOutcome {
            url: entry.url,
            analysis: entry.analysis_text,
            eli5: entry.eli5_text.filter(|_| params.include_eli5),
            notable,
            from_cache: true,
            created_at: entry.created_at,
        })
    }

    /// Runs the analytics on the blocking pool while the summarizer talks to
    /// the model, then appends or replaces the row at `replace`.
    async fn analyze_fresh(
        &self,
        thread: Thread,
        params: &AnalysisParams,
        replace: Option<usize>,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let thread = Arc::new(thread);
        let top_k = self.inner.settings.top_k;

        let report_task = {
            let thread = thread.clone();
            tokio::task::spawn_blocking(move || analyze_tree(&thread, top_k))
        };
        let (report, analysis) = tokio::join!(
            report_task,
            self.inner.summarizer.summarize(&thread, params)
        );
        let report = report.map_err(|e| AnalysisError::Internal(e.to_string()))?;
        let analysis = analysis?;

        let eli5 = if params.include_eli5 {
            match self.inner.summarizer.eli5(&analysis).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("ELI5 summary for {} failed: {}", params.url, e);
                    None
                }
            }
        } else {
            None
        };

        let entry = CacheEntry::new(
            params,
            Fingerprint::of(&thread),
            analysis,
            eli5,
            serde_json::to_string(&report)?,
        );
        let row = entry.clone();
        let index = self
            .write_table(move |table| match replace {
                Some(index) if table.replace(index, row.clone()) => index,
                _ => table.append(row),
            })
            .await?;
        info!(
            "Stored analysis for {} at row {} ({})",
            params.url,
            index,
            if replace.is_some() { "replaced" } else { "appended" }
        );

        self.emit(AnalysisEvent::Completed {
            url: params.url.clone(),
            from_cache: false,
        });
        Ok(AnalysisOutcome {
            url: entry.url,
            analysis: entry.analysis_text,
            eli5: entry.eli5_text,
            notable: report,
            from_cache: false,
            created_at: entry.created_at,
        })
    }

    fn key_lock(&self, key: CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .inner
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(key).or_default().clone()
    }

    /// Drops the caller's handle and forgets every lock nobody else holds.
    fn release_key_lock(&self, key_lock: Arc<tokio::sync::Mutex<()>>) {
        drop(key_lock);
        let mut locks = self
            .inner
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    async fn load_table(&self) -> Result<CacheTable, AnalysisError> {
        let rows = self.inner.store.load().await.map_err(AnalysisError::storage)?;
        Ok(CacheTable::new(rows, self.inner.settings.tolerance))
    }

    /// Reload, mutate and save the table as one step with respect to other writers.
    async fn write_table<T>(
        &self,
        mutate: impl FnOnce(&mut CacheTable) -> T,
    ) -> Result<T, AnalysisError> {
        let _guard = self.inner.table_lock.lock().await;
        let mut table = self.load_table().await?;
        let out = mutate(&mut table);
        self.inner
            .store
            .save(table.rows())
            .await
            .map_err(AnalysisError::storage)?;
        Ok(out)
    }

    fn emit(&self, event: AnalysisEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
