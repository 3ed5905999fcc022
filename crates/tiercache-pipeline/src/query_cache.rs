//! Bounded semantic cache of past queries and the answers produced for them.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tiercache_core::config::QueryCacheSettings;
use tiercache_core::error::{Error, Result};
use tiercache_core::journal::Journal;
use tiercache_core::similarity::cosine_similarity;
use tiercache_core::traits::Embedder;
use tiercache_text::tokens;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub embedding: Vec<f32>,
    pub response: String,
    /// Creation time, refreshed on every hit.
    #[serde(alias = "timestamp", with = "tiercache_core::timestamp", default = "tiercache_core::timestamp::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub hit_count: u64,
    /// Insertion order; breaks eviction ties between equal timestamps.
    #[serde(default)]
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub query: String,
    pub response: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryCacheStats {
    pub entries: usize,
    pub total_hits: u64,
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_distribution: BTreeMap<String, usize>,
    pub file_size_bytes: u64,
    pub threshold: f32,
    pub capacity: usize,
}

pub fn cache_key(query: &str) -> String { blake3::hash(tokens(query).join(" ").as_bytes()).to_hex().to_string() }

struct State {
    entries: HashMap<String, CacheEntry>,
    journal: Option<Journal>,
    next_seq: u64,
    lookups: u64,
    hits: u64,
}

impl State {
    fn persist(&mut self, key: &str) {
        let Self { entries, journal, .. } = self;
        let (Some(j), Some(entry)) = (journal.as_mut(), entries.get(key)) else { return };
        if let Err(e) = j.put(key, entry) { warn!(error = %e, "failed to persist query cache entry"); }
    }

    fn forget(&mut self, key: &str) {
        if let Some(j) = self.journal.as_mut() {
            if let Err(e) = j.delete(key) { warn!(error = %e, "failed to persist query cache eviction"); }
        }
    }

    fn maybe_compact(&mut self) {
        let Self { entries, journal, .. } = self;
        if let Some(j) = journal.as_mut() {
            if j.needs_compaction(entries.len()) {
                if let Err(e) = j.compact(entries.iter()) { warn!(error = %e, "query cache compaction failed"); }
            }
        }
    }
}

pub struct QuerySimilarityCache {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
    capacity: usize,
    eviction_buffer: usize,
    state: Mutex<State>,
}

impl QuerySimilarityCache {
    pub fn new(embedder: Arc<dyn Embedder>, settings: &QueryCacheSettings) -> Self {
        Self::build(embedder, settings, HashMap::new(), None)
    }

    /// Cache persisted at `path`; an unreadable file starts an empty cache.
    pub fn open(path: impl Into<PathBuf>, compact_ratio: f64, embedder: Arc<dyn Embedder>, settings: &QueryCacheSettings) -> Self {
        let mut journal = Journal::new(path, compact_ratio);
        let entries: HashMap<String, CacheEntry> = journal.load_or_quarantine();
        Self::build(embedder, settings, entries, Some(journal))
    }

    fn build(embedder: Arc<dyn Embedder>, settings: &QueryCacheSettings, entries: HashMap<String, CacheEntry>, journal: Option<Journal>) -> Self {
        let next_seq = entries.values().map(|e| e.seq + 1).max().unwrap_or(0);
        info!(entries = entries.len(), capacity = settings.capacity, threshold = settings.threshold, "query similarity cache ready");
        let cache = Self {
            embedder,
            threshold: settings.threshold,
            capacity: settings.capacity.max(1),
            eviction_buffer: settings.eviction_buffer,
            state: Mutex::new(State { entries, journal, next_seq, lookups: 0, hits: 0 }),
        };
        cache.evict_overflow(&mut cache.state.lock());
        cache
    }

    pub fn threshold(&self) -> f32 { self.threshold }

    pub fn capacity(&self) -> usize { self.capacity }

    /// Most similar cached query at or above the threshold. A hit bumps the
    /// entry's hit count and refreshes its timestamp.
    pub fn lookup(&self, query: &str) -> Option<CacheHit> {
        match self.try_lookup(query) {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "query cache lookup failed, treating as miss");
                None
            }
        }
    }

    pub fn try_lookup(&self, query: &str) -> Result<Option<CacheHit>> {
        {
            let mut state = self.state.lock();
            state.lookups += 1;
            if state.entries.is_empty() { return Ok(None); }
        }
        let vector = self.embedder.embed(query).map_err(Error::provider)?;

        let mut state = self.state.lock();
        let mut best: Option<(&String, f32)> = None;
        for (key, entry) in &state.entries {
            let sim = cosine_similarity(&vector, &entry.embedding);
            let better = match best {
                None => true,
                Some((bk, bs)) => sim > bs || (sim == bs && key < bk),
            };
            if better { best = Some((key, sim)); }
        }
        let Some((key, similarity)) = best.map(|(k, s)| (k.clone(), s)) else { return Ok(None) };
        if similarity < self.threshold {
            debug!(similarity, threshold = self.threshold, "query cache miss");
            return Ok(None);
        }

        state.hits += 1;
        let Some(entry) = state.entries.get_mut(&key) else { return Ok(None) };
        entry.hit_count += 1;
        entry.created_at = Utc::now();
        let hit = CacheHit { query: entry.query.clone(), response: entry.response.clone(), similarity };
        state.persist(&key);
        state.maybe_compact();
        info!(similarity, cached_query = %hit.query, "query cache hit");
        Ok(Some(hit))
    }

    /// Cache `response` for `query`; false when it could not be embedded.
    pub fn store(&self, query: &str, response: &str) -> bool {
        match self.try_store(query, response) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "query cache store failed");
                false
            }
        }
    }

    pub fn try_store(&self, query: &str, response: &str) -> Result<()> {
        let key = cache_key(query);
        let embedding = self.embedder.embed(query).map_err(Error::provider)?;
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let entry = CacheEntry { query: query.to_string(), embedding, response: response.to_string(), created_at: Utc::now(), hit_count: 0, seq };
        state.entries.insert(key.clone(), entry);
        state.persist(&key);
        self.evict_overflow(&mut state);
        state.maybe_compact();
        debug!(entries = state.entries.len(), "query cached");
        Ok(())
    }

    /// Over capacity, drop the `overflow + eviction_buffer` entries with the
    /// lowest `(hit_count, created_at, seq)`, always keeping at least one.
    fn evict_overflow(&self, state: &mut State) {
        let len = state.entries.len();
        if len <= self.capacity { return; }
        let remove = (len - self.capacity + self.eviction_buffer).min(len - 1);
        let mut ranked: Vec<(u64, DateTime<Utc>, u64, String)> = state.entries.iter().map(|(k, e)| (e.hit_count, e.created_at, e.seq, k.clone())).collect();
        ranked.sort();
        for (_, _, _, key) in ranked.into_iter().take(remove) {
            state.entries.remove(&key);
            state.forget(&key);
        }
        info!(removed = remove, remaining = state.entries.len(), "query cache evicted entries");
    }

    pub fn contains(&self, query: &str) -> bool { self.state.lock().entries.contains_key(&cache_key(query)) }

    pub fn len(&self) -> usize { self.state.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn entry(&self, query: &str) -> Option<CacheEntry> { self.state.lock().entries.get(&cache_key(query)).cloned() }

    pub fn get_stats(&self) -> QueryCacheStats {
        let state = self.state.lock();
        let mut buckets: BTreeMap<String, usize> = ["0", "1-5", "6-20", "20+"].iter().map(|b| (b.to_string(), 0)).collect();
        for e in state.entries.values() {
            let bucket = match e.hit_count {
                0 => "0",
                1..=5 => "1-5",
                6..=20 => "6-20",
                _ => "20+",
            };
            *buckets.entry(bucket.to_string()).or_insert(0) += 1;
        }
        QueryCacheStats {
            entries: state.entries.len(),
            total_hits: state.entries.values().map(|e| e.hit_count).sum(),
            lookups: state.lookups,
            hits: state.hits,
            misses: state.lookups - state.hits,
            hit_distribution: buckets,
            file_size_bytes: state.journal.as_ref().map_or(0, Journal::size_bytes),
            threshold: self.threshold,
            capacity: self.capacity,
        }
    }

    /// One-line human summary of `get_stats`.
    pub fn summary(&self) -> String {
        let s = self.get_stats();
        let dist = s.hit_distribution.iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>().join(" | ");
        format!(
            "query cache: {} entries, {} total hits, {}/{} lookups hit, threshold {:.2}, {:.1} KiB, hits [{}]",
            s.entries, s.total_hits, s.hits, s.lookups, s.threshold, s.file_size_bytes as f64 / 1024.0, dist
        )
    }

    /// Drop every entry and the backing file.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.entries.clear();
        state.next_seq = 0;
        if let Some(j) = state.journal.as_mut() { j.remove()?; }
        info!("query cache cleared");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        let State { entries, journal, .. } = &mut *state;
        match journal.as_mut() {
            Some(j) => j.compact(entries.iter()),
            None => Ok(()),
        }
    }
}
