//! Domain-tagged question/answer index.
//!
//! Only the question is embedded; the answer rides along as metadata, so a
//! nearest-neighbour hit means "someone already asked this".

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::Serialize;
use tiercache_core::config::QaIndexSettings;
use tiercache_core::error::{Error, Result};
use tiercache_core::traits::{Embedder, VectorStore};
use tiercache_core::types::{Domain, DomainFilter, QaRecord};
use tiercache_text::tokens;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct QaMatch {
    pub record: QaRecord,
    pub similarity: f32,
    pub latency: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub added: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaStats {
    pub total_records: usize,
    pub queries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub avg_latency_ms: f64,
    pub avg_hit_latency_ms: f64,
    pub domains_loaded: Vec<String>,
    pub threshold: f32,
}

#[derive(Debug, Default)]
struct Counters {
    queries: u64,
    hits: u64,
    total_latency: Duration,
    hit_latency: Duration,
    domains_loaded: BTreeSet<String>,
}

/// Stable id for a question within a domain, so re-adding it replaces the
/// earlier entry.
pub fn default_id(domain: &Domain, question: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(tokens(question).join(" ").as_bytes());
    format!("qa_{}", &hasher.finalize().to_hex()[..16])
}

pub struct QuestionAnswerIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    domains: BTreeSet<Domain>,
    threshold: f32,
    k: usize,
    show_progress: bool,
    counters: Mutex<Counters>,
}

impl QuestionAnswerIndex {
    /// `domains` is the closed set records may be tagged with.
    pub fn new<I>(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, domains: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Domain>,
    {
        Self {
            store,
            embedder,
            domains: domains.into_iter().map(Into::into).collect(),
            threshold: 0.75,
            k: 3,
            show_progress: false,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn with_settings(mut self, settings: &QaIndexSettings) -> Self {
        self.threshold = settings.threshold;
        self.k = settings.k.max(1);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Draw an indicatif progress bar during `add_batch`.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn threshold(&self) -> f32 { self.threshold }

    pub fn default_k(&self) -> usize { self.k }

    /// Best match among the `k` nearest questions in `active`; `None` below
    /// the threshold or when the store or embedder fails.
    pub fn search(&self, query: &str, active: &[Domain], k: usize) -> Option<QaMatch> {
        match self.try_search(query, active, k) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "qa index lookup failed, treating as miss");
                None
            }
        }
    }

    pub fn try_search(&self, query: &str, active: &[Domain], k: usize) -> Result<Option<QaMatch>> {
        let start = Instant::now();
        let outcome = self.best_match(query, active, k);
        let latency = start.elapsed();
        let mut c = self.counters.lock();
        c.queries += 1;
        c.total_latency += latency;
        match outcome? {
            Some((record, similarity)) => {
                c.hits += 1;
                c.hit_latency += latency;
                info!(id = %record.id, domain = %record.domain, similarity, "qa index hit");
                Ok(Some(QaMatch { record, similarity, latency }))
            }
            None => Ok(None),
        }
    }

    fn best_match(&self, query: &str, active: &[Domain], k: usize) -> Result<Option<(QaRecord, f32)>> {
        let vector = self.embedder.embed(query).map_err(Error::provider)?;
        let filter = DomainFilter::from_domains(active);
        let neighbors = self.store.nearest(&vector, &filter, k.max(1)).map_err(Error::store)?;

        let best = neighbors
            .into_iter()
            .filter(|n| filter.matches(n.item.domain()))
            .filter_map(|n| { let sim = n.similarity(); QaRecord::from_stored_item(&n.item).map(|r| (r, sim)) })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        match best {
            Some((record, similarity)) if similarity >= self.threshold => Ok(Some((record, similarity))),
            Some((_, similarity)) => {
                debug!(similarity, threshold = self.threshold, "qa index below threshold");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Index one pair. False when the domain is unknown, the question is
    /// blank, or the provider fails.
    pub fn add(&self, question: &str, answer: &str, domain: &str, source: &str, id: Option<&str>) -> bool {
        let domain = Domain::new(domain);
        let id = id.map(str::to_string).unwrap_or_else(|| default_id(&domain, question));
        let record = QaRecord { id, question: question.to_string(), answer: answer.to_string(), domain, source: source.to_string(), created_at: chrono::Utc::now() };
        self.add_record(&record)
    }

    pub fn add_record(&self, record: &QaRecord) -> bool {
        if let Err(reason) = self.validate(record) {
            warn!(id = %record.id, %reason, "qa record rejected");
            return false;
        }
        let result = self
            .embedder
            .embed(&record.question)
            .and_then(|v| self.store.upsert(record.to_stored_item(), v));
        match result {
            Ok(()) => {
                self.counters.lock().domains_loaded.insert(record.domain.to_string());
                debug!(id = %record.id, domain = %record.domain, "qa record indexed");
                true
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "failed to index qa record");
                false
            }
        }
    }

    /// Index `records` in chunks of `batch_size`. A failing chunk is counted
    /// and skipped; the rest still go in.
    pub fn add_batch(&self, records: &[QaRecord], batch_size: usize) -> BatchReport {
        let mut report = BatchReport::default();
        let pb = if self.show_progress { ProgressBar::new(records.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} Q&A pairs ({percent}%) {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut valid = Vec::with_capacity(records.len());
        for r in records {
            match self.validate(r) {
                Ok(()) => valid.push(r),
                Err(reason) => { warn!(id = %r.id, %reason, "qa record rejected"); report.failed += 1; pb.inc(1); }
            }
        }

        for chunk in valid.chunks(batch_size.max(1)) {
            let questions: Vec<String> = chunk.iter().map(|r| r.question.clone()).collect();
            let outcome = self.embedder.embed_batch(&questions).and_then(|vectors| {
                if vectors.len() != chunk.len() { anyhow::bail!("embedder returned {} vectors for {} questions", vectors.len(), chunk.len()); }
                let items = chunk.iter().map(|r| r.to_stored_item()).zip(vectors).collect();
                self.store.upsert_batch(items)
            });
            match outcome {
                Ok(()) => {
                    report.added += chunk.len();
                    let mut c = self.counters.lock();
                    for r in chunk { c.domains_loaded.insert(r.domain.to_string()); }
                }
                Err(e) => {
                    warn!(error = %e, size = chunk.len(), "qa batch failed");
                    report.failed += chunk.len();
                }
            }
            pb.inc(chunk.len() as u64);
            pb.set_message(format!("{} added, {} failed", report.added, report.failed));
        }
        pb.finish_with_message(format!("{} added, {} failed", report.added, report.failed));
        info!(added = report.added, failed = report.failed, "qa batch indexed");
        report
    }

    pub fn delete(&self, id: &str) -> bool {
        match self.store.delete(id) {
            Ok(found) => found,
            Err(e) => { warn!(id, error = %e, "qa delete failed"); false }
        }
    }

    pub fn len(&self) -> Result<usize> { self.store.len().map_err(Error::store) }

    pub fn is_empty(&self) -> Result<bool> { Ok(self.len()? == 0) }

    /// Remove every record and reset the counters.
    pub fn clear(&self) -> Result<()> {
        self.store.clear().map_err(Error::store)?;
        *self.counters.lock() = Counters::default();
        info!("qa index cleared");
        Ok(())
    }

    pub fn flush(&self) -> Result<()> { self.store.flush().map_err(Error::store) }

    pub fn get_stats(&self) -> QaStats {
        let total_records = self.store.len().unwrap_or_else(|e| { warn!(error = %e, "qa store size unavailable"); 0 });
        let c = self.counters.lock();
        QaStats {
            total_records,
            queries: c.queries,
            hits: c.hits,
            misses: c.queries - c.hits,
            hit_rate: if c.queries == 0 { 0.0 } else { c.hits as f64 / c.queries as f64 },
            avg_latency_ms: if c.queries == 0 { 0.0 } else { c.total_latency.as_secs_f64() * 1000.0 / c.queries as f64 },
            avg_hit_latency_ms: if c.hits == 0 { 0.0 } else { c.hit_latency.as_secs_f64() * 1000.0 / c.hits as f64 },
            domains_loaded: c.domains_loaded.iter().cloned().collect(),
            threshold: self.threshold,
        }
    }

    fn validate(&self, record: &QaRecord) -> std::result::Result<(), String> {
        if !self.domains.contains(&record.domain) { return Err(format!("unknown domain '{}'", record.domain)); }
        if record.question.trim().is_empty() { return Err("blank question".to_string()); }
        Ok(())
    }
}
