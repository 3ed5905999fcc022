//! Curated question/answer records answered before any other tier.
//!
//! Lookup runs an exact stage (normalized question key contained in the
//! normalized query) and then a semantic stage (cosine similarity against the
//! record embeddings). A query with negative intent skips the exact stage and
//! must clear the stricter `negative_threshold` in the semantic one.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tiercache_core::config::Settings;
use tiercache_core::error::{Error, Result};
use tiercache_core::journal::Journal;
use tiercache_core::similarity::cosine_similarity;
use tiercache_core::traits::Embedder;
use tiercache_text::{tokens, NegativeIntentDetector};
use tracing::{debug, info, warn};

use crate::seed;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub question: String,
    #[serde(alias = "response")]
    pub answer: String,
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(with = "tiercache_core::timestamp", default = "tiercache_core::timestamp::now")]
    pub created_at: DateTime<Utc>,
}

impl CanonicalRecord {
    pub fn new<K: Into<String>>(question: impl Into<String>, answer: impl Into<String>, category: impl Into<String>, keywords: impl IntoIterator<Item = K>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            category: category.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            embedding: None,
            hit_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> String { question_key(&self.question) }
}

/// `"What is moon water?"` -> `"what_is_moon_water"`.
pub fn question_key(text: &str) -> String { tokens(text).join("_") }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Semantic,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalMatch {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub similarity: f32,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct CanonicalStats {
    pub total_records: usize,
    pub embedded_records: usize,
    pub total_hits: u64,
    pub categories: BTreeMap<String, usize>,
    pub most_popular_question: Option<String>,
    pub most_popular_hits: u64,
    pub file_size_bytes: u64,
    pub threshold: f32,
    pub negative_threshold: f32,
}

struct State {
    records: HashMap<String, CanonicalRecord>,
    journal: Option<Journal>,
}

impl State {
    fn record_hit(&mut self, key: &str) -> Option<CanonicalMatch> {
        let rec = self.records.get_mut(key)?;
        rec.hit_count += 1;
        let matched = CanonicalMatch { question: rec.question.clone(), answer: rec.answer.clone(), category: rec.category.clone(), similarity: 1.0, kind: MatchKind::Exact };
        if let Some(j) = self.journal.as_mut() {
            if let Err(e) = j.put(key, &*rec) { warn!(error = %e, key, "failed to persist canonical hit"); }
        }
        self.maybe_compact();
        Some(matched)
    }

    fn maybe_compact(&mut self) {
        let Self { records, journal } = self;
        if let Some(j) = journal.as_mut() {
            if j.needs_compaction(records.len()) {
                if let Err(e) = j.compact(records.iter()) { warn!(error = %e, "canonical journal compaction failed"); }
            }
        }
    }

    fn compact(&mut self) -> Result<()> {
        let Self { records, journal } = self;
        match journal.as_mut() {
            Some(j) => j.compact(records.iter()),
            None => Ok(()),
        }
    }
}

pub struct CanonicalAnswerCache {
    embedder: Arc<dyn Embedder>,
    detector: NegativeIntentDetector,
    threshold: f32,
    negative_threshold: f32,
    state: Mutex<State>,
}

impl CanonicalAnswerCache {
    /// Unpersisted cache over `seeds`.
    pub fn new(seeds: Vec<CanonicalRecord>, embedder: Arc<dyn Embedder>, detector: NegativeIntentDetector) -> Self {
        Self::build(seeds, HashMap::new(), None, embedder, detector)
    }

    /// Cache over `seeds` whose hit counts and embeddings persist at `path`.
    pub fn open(path: impl Into<PathBuf>, compact_ratio: f64, seeds: Vec<CanonicalRecord>, embedder: Arc<dyn Embedder>, detector: NegativeIntentDetector) -> Self {
        let mut journal = Journal::new(path, compact_ratio);
        let persisted: HashMap<String, CanonicalRecord> = journal.load_or_quarantine();
        Self::build(seeds, persisted, Some(journal), embedder, detector)
    }

    /// Seeds from `canonical.seed_file` when set, otherwise the built-in set.
    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>, detector: NegativeIntentDetector) -> Result<Self> {
        let seeds = match &settings.canonical.seed_file {
            Some(file) => seed::load_seed_file(&settings.resolve(file))?,
            None => seed::default_records(),
        };
        if seeds.is_empty() { return Err(Error::InvalidConfig("canonical seed set is empty".to_string())); }
        let cache = Self::open(settings.resolve(&settings.canonical.file), settings.storage.compact_ratio, seeds, embedder, detector);
        Ok(cache.with_thresholds(settings.canonical.threshold, settings.canonical.negative_threshold))
    }

    pub fn with_thresholds(mut self, threshold: f32, negative_threshold: f32) -> Self {
        self.threshold = threshold;
        self.negative_threshold = negative_threshold;
        self
    }

    fn build(seeds: Vec<CanonicalRecord>, mut persisted: HashMap<String, CanonicalRecord>, journal: Option<Journal>, embedder: Arc<dyn Embedder>, detector: NegativeIntentDetector) -> Self {
        let mut records = HashMap::with_capacity(seeds.len());
        for mut rec in seeds {
            let key = rec.key();
            if key.is_empty() { continue; }
            if let Some(old) = persisted.remove(&key) {
                rec.hit_count = old.hit_count;
                rec.created_at = old.created_at;
                if old.question == rec.question { rec.embedding = old.embedding; }
            }
            records.insert(key, rec);
        }
        if !persisted.is_empty() { info!(dropped = persisted.len(), "persisted canonical records without a seed were dropped"); }

        let mut state = State { records, journal };
        embed_missing(&*embedder, &mut state.records);
        if let Err(e) = state.compact() { warn!(error = %e, "failed to write canonical cache"); }
        info!(records = state.records.len(), "canonical answer cache ready");
        Self { embedder, detector, threshold: 0.85, negative_threshold: 0.90, state: Mutex::new(state) }
    }

    pub fn find(&self, query: &str) -> Option<String> { self.find_match(query).map(|m| m.answer) }

    /// Check both stages; provider errors degrade to a miss.
    pub fn find_match(&self, query: &str) -> Option<CanonicalMatch> {
        match self.try_find_match(query) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "canonical semantic stage failed, treating as miss");
                None
            }
        }
    }

    pub fn try_find_match(&self, query: &str) -> Result<Option<CanonicalMatch>> {
        let negative = self.detector.has_negative_intent(query);
        let threshold = if negative { self.negative_threshold } else { self.threshold };
        let query_key = question_key(query);
        if query_key.is_empty() { return Ok(None); }

        if negative {
            debug!(query, "negative intent, exact stage skipped");
        } else {
            let mut state = self.state.lock();
            let best = state.records.keys().filter(|k| query_key.contains(k.as_str())).max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a))).cloned();
            if let Some(key) = best {
                info!(key = %key, "canonical exact hit");
                return Ok(state.record_hit(&key));
            }
        }

        let vector = self.embedder.embed(query).map_err(Error::provider)?;
        let mut state = self.state.lock();
        let mut best: Option<(&String, f32)> = None;
        for (key, rec) in &state.records {
            let Some(emb) = rec.embedding.as_deref() else { continue };
            let sim = cosine_similarity(&vector, emb);
            let better = match best {
                None => true,
                Some((bk, bs)) => sim > bs || (sim == bs && key < bk),
            };
            if better { best = Some((key, sim)); }
        }
        let Some((key, similarity)) = best.map(|(k, s)| (k.clone(), s)) else { return Ok(None) };
        if similarity < threshold {
            debug!(similarity, threshold, negative, "canonical semantic miss");
            return Ok(None);
        }
        info!(key = %key, similarity, negative, "canonical semantic hit");
        Ok(state.record_hit(&key).map(|m| CanonicalMatch { similarity, kind: MatchKind::Semantic, ..m }))
    }

    pub fn hit_count(&self, question: &str) -> Option<u64> {
        self.state.lock().records.get(&question_key(question)).map(|r| r.hit_count)
    }

    pub fn len(&self) -> usize { self.state.lock().records.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn get_stats(&self) -> CanonicalStats {
        let state = self.state.lock();
        let mut categories = BTreeMap::new();
        for rec in state.records.values() { *categories.entry(rec.category.clone()).or_insert(0) += 1; }
        let popular = state.records.values().filter(|r| r.hit_count > 0).max_by(|a, b| a.hit_count.cmp(&b.hit_count).then_with(|| b.question.cmp(&a.question)));
        CanonicalStats {
            total_records: state.records.len(),
            embedded_records: state.records.values().filter(|r| r.embedding.is_some()).count(),
            total_hits: state.records.values().map(|r| r.hit_count).sum(),
            categories,
            most_popular_question: popular.map(|r| r.question.clone()),
            most_popular_hits: popular.map_or(0, |r| r.hit_count),
            file_size_bytes: state.journal.as_ref().map_or(0, Journal::size_bytes),
            threshold: self.threshold,
            negative_threshold: self.negative_threshold,
        }
    }

    /// Questions grouped by category, both sorted.
    pub fn list_categories(&self) -> BTreeMap<String, Vec<String>> {
        let state = self.state.lock();
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rec in state.records.values() { out.entry(rec.category.clone()).or_default().push(rec.question.clone()); }
        for questions in out.values_mut() { questions.sort(); }
        out
    }

    /// Zero every hit count; records and embeddings are kept.
    pub fn reset_hit_counts(&self) -> Result<()> {
        let mut state = self.state.lock();
        for rec in state.records.values_mut() { rec.hit_count = 0; }
        info!("canonical hit counts reset");
        state.compact()
    }

    pub fn close(&self) -> Result<()> { self.state.lock().compact() }
}

fn embed_missing(embedder: &dyn Embedder, records: &mut HashMap<String, CanonicalRecord>) {
    let mut missing: Vec<&String> = records.iter().filter(|(_, r)| r.embedding.is_none()).map(|(k, _)| k).collect();
    if missing.is_empty() { return; }
    missing.sort();
    let keys: Vec<String> = missing.into_iter().cloned().collect();
    let questions: Vec<String> = keys.iter().filter_map(|k| records.get(k).map(|r| r.question.clone())).collect();
    match embedder.embed_batch(&questions) {
        Ok(vectors) if vectors.len() == keys.len() => {
            for (key, v) in keys.iter().zip(vectors) {
                if let Some(rec) = records.get_mut(key) { rec.embedding = Some(v); }
            }
            info!(embedded = keys.len(), "canonical embeddings computed");
        }
        Ok(vectors) => warn!(expected = keys.len(), got = vectors.len(), "embedder returned wrong number of vectors; semantic stage limited"),
        Err(e) => warn!(error = %e, missing = keys.len(), "could not embed canonical records; semantic stage limited"),
    }
}
