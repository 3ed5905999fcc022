use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tiercache_core::journal::Journal;
use tiercache_core::similarity::cosine_similarity;
use tiercache_core::traits::VectorStore;
use tiercache_core::types::{DomainFilter, Neighbor, StoredItem};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    item: StoredItem,
    vector: Vec<f32>,
}

struct State {
    entries: HashMap<String, Entry>,
    journal: Option<Journal>,
}

impl State {
    fn maybe_compact(&mut self) -> anyhow::Result<()> {
        if let Some(j) = self.journal.as_mut() {
            if j.needs_compaction(self.entries.len()) { j.compact(self.entries.iter())?; }
        }
        Ok(())
    }
}

/// Exact nearest-neighbour search over every stored vector.
///
/// Suitable for the small curated indexes this workspace serves; each query
/// is O(n * dim). Distances are cosine distances (`1 - cosine similarity`).
pub struct FlatVectorStore {
    state: Mutex<State>,
}

impl FlatVectorStore {
    pub fn in_memory() -> Self {
        Self { state: Mutex::new(State { entries: HashMap::new(), journal: None }) }
    }

    /// Open (or create) a store persisted at `path`. An unreadable file is
    /// moved aside and the store starts empty.
    pub fn open(path: impl Into<PathBuf>, compact_ratio: f64) -> Self {
        let mut journal = Journal::new(path, compact_ratio);
        let entries: HashMap<String, Entry> = journal.load_or_quarantine();
        info!(path = %journal.path().display(), items = entries.len(), "flat vector store opened");
        Self { state: Mutex::new(State { entries, journal: Some(journal) }) }
    }
}

impl VectorStore for FlatVectorStore {
    fn upsert_batch(&self, items: Vec<(StoredItem, Vec<f32>)>) -> anyhow::Result<()> {
        let entries: Vec<Entry> = items.into_iter().map(|(item, vector)| Entry { item, vector }).collect();
        let mut state = self.state.lock();
        if let Some(j) = state.journal.as_mut() {
            j.put_batch(entries.iter().map(|e| (e.item.id.as_str(), e)))?;
        }
        for entry in entries { state.entries.insert(entry.item.id.clone(), entry); }
        state.maybe_compact()
    }

    fn nearest(&self, vector: &[f32], filter: &DomainFilter, k: usize) -> anyhow::Result<Vec<Neighbor>> {
        if k == 0 { return Ok(Vec::new()); }
        let state = self.state.lock();
        let mut scored: Vec<(f32, &Entry)> = state
            .entries
            .values()
            .filter(|e| filter.matches(e.item.domain()))
            .map(|e| (1.0 - cosine_similarity(vector, &e.vector), e))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal).then_with(|| a.1.item.id.cmp(&b.1.item.id)));
        scored.truncate(k);
        debug!(candidates = state.entries.len(), returned = scored.len(), "flat nearest");
        Ok(scored.into_iter().map(|(distance, e)| Neighbor { item: e.item.clone(), distance }).collect())
    }

    fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let mut state = self.state.lock();
        if state.entries.remove(id).is_none() { return Ok(false); }
        if let Some(j) = state.journal.as_mut() { j.delete(id)?; }
        state.maybe_compact()?;
        Ok(true)
    }

    fn len(&self) -> anyhow::Result<usize> { Ok(self.state.lock().entries.len()) }

    fn clear(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.entries.clear();
        if let Some(j) = state.journal.as_mut() { j.remove()?; }
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let State { entries, journal } = &mut *state;
        if let Some(j) = journal.as_mut() { j.compact(entries.iter())?; }
        Ok(())
    }
}
