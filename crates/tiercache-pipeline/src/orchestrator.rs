//! Fixed-precedence query pipeline: canonical answers, then the Q&A index,
//! then the query similarity cache, then the retrieval fallback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tiercache_core::config::{DomainSettings, Settings};
use tiercache_core::error::Result;
use tiercache_core::traits::{Embedder, RetrievalFallback, VectorStore};
use tiercache_core::types::{Domain, DomainFilter};
use tiercache_text::NegativeIntentDetector;
use tiercache_vector::FlatVectorStore;
use tracing::{debug, info, warn};

use crate::canonical::CanonicalAnswerCache;
use crate::domain::{DomainRegistry, DomainStatus};
use crate::qa_index::QuestionAnswerIndex;
use crate::query_cache::QuerySimilarityCache;
use crate::stats::{OrchestratorStats, OutcomeCounters};

const EMPTY_QUERY_PROMPT: &str = "Please ask me a question and I'll look it up for you.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Canonical,
    QaIndex,
    QueryCache,
    Generated,
    NoContext,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
    pub negative_intent: bool,
    /// Similarity of the cached match, when a cache answered.
    pub similarity: Option<f32>,
    pub elapsed: Duration,
}

pub struct RetrievalOrchestrator {
    detector: NegativeIntentDetector,
    domains: Arc<DomainRegistry>,
    canonical: Option<CanonicalAnswerCache>,
    qa_index: Option<QuestionAnswerIndex>,
    query_cache: Option<QuerySimilarityCache>,
    fallback: Arc<dyn RetrievalFallback>,
    bypass_qa_on_negative: bool,
    qa_k: usize,
    counters: Mutex<OutcomeCounters>,
}

impl RetrievalOrchestrator {
    pub fn builder(fallback: Arc<dyn RetrievalFallback>) -> OrchestratorBuilder { OrchestratorBuilder::new(fallback) }

    /// Wire every enabled tier from configuration. Cache files live under
    /// `storage.data_dir`.
    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>, qa_store: Arc<dyn VectorStore>, fallback: Arc<dyn RetrievalFallback>) -> Result<Self> {
        let detector = NegativeIntentDetector::new(settings.intent.sensitivity);
        let mut builder = Self::builder(fallback)
            .detector(detector)
            .domains(Arc::new(DomainRegistry::from_settings(&settings.domains)?))
            .bypass_qa_on_negative(settings.intent.bypass_qa_index)
            .qa_k(settings.qa_index.k);
        if settings.canonical.enabled {
            builder = builder.canonical(CanonicalAnswerCache::from_settings(settings, embedder.clone(), detector)?);
        }
        if settings.qa_index.enabled {
            let index = QuestionAnswerIndex::new(qa_store, embedder.clone(), settings.domains.available.iter().map(String::as_str)).with_settings(&settings.qa_index);
            builder = builder.qa_index(index);
        }
        if settings.query_cache.enabled {
            let path = settings.resolve(&settings.query_cache.file);
            builder = builder.query_cache(QuerySimilarityCache::open(path, settings.storage.compact_ratio, embedder, &settings.query_cache));
        }
        builder.build()
    }

    pub fn answer(&self, query: &str) -> String { self.answer_detailed(query).text }

    pub fn answer_detailed(&self, query: &str) -> Answer {
        let start = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return self.finish(start, EMPTY_QUERY_PROMPT.to_string(), AnswerSource::NoContext, false, None);
        }

        let negative = self.detector.classify(query).negative;
        debug!(query, negative, "query received");

        if let Some(m) = self.canonical.as_ref().and_then(|c| c.find_match(query)) {
            return self.finish(start, m.answer, AnswerSource::Canonical, negative, Some(m.similarity));
        }

        let active = self.domains.active();
        if let Some(index) = &self.qa_index {
            if negative && self.bypass_qa_on_negative {
                debug!("negative intent, qa index bypassed");
            } else if let Some(m) = index.search(query, &active, self.qa_k) {
                return self.finish(start, m.record.answer, AnswerSource::QaIndex, negative, Some(m.similarity));
            }
        }

        if let Some(hit) = self.query_cache.as_ref().and_then(|c| c.lookup(query)) {
            return self.finish(start, hit.response, AnswerSource::QueryCache, negative, Some(hit.similarity));
        }

        let filter = DomainFilter::from_domains(&active);
        match self.fallback.answer(query, &filter) {
            Ok(text) if !text.trim().is_empty() => {
                if let Some(cache) = &self.query_cache { cache.store(query, &text); }
                self.finish(start, text, AnswerSource::Generated, negative, None)
            }
            Ok(_) => {
                info!(domains = %domain_list(&active), "no context in active domains");
                self.finish(start, no_context_message(&active), AnswerSource::NoContext, negative, None)
            }
            Err(e) => {
                warn!(error = %e, "retrieval fallback failed");
                self.finish(start, error_message(&active), AnswerSource::Failed, negative, None)
            }
        }
    }

    fn finish(&self, start: Instant, text: String, source: AnswerSource, negative_intent: bool, similarity: Option<f32>) -> Answer {
        let elapsed = start.elapsed();
        self.counters.lock().record(source, negative_intent, elapsed);
        info!(source = ?source, negative_intent, elapsed_ms = elapsed.as_millis() as u64, "query answered");
        Answer { text, source, negative_intent, similarity, elapsed }
    }

    pub fn activate(&self, domain: &str) -> bool { self.domains.activate(domain) }

    pub fn deactivate(&self, domain: &str) -> bool { self.domains.deactivate(domain) }

    pub fn domain_status(&self) -> DomainStatus { self.domains.status() }

    pub fn domains(&self) -> &Arc<DomainRegistry> { &self.domains }

    pub fn canonical(&self) -> Option<&CanonicalAnswerCache> { self.canonical.as_ref() }

    pub fn qa_index(&self) -> Option<&QuestionAnswerIndex> { self.qa_index.as_ref() }

    pub fn query_cache(&self) -> Option<&QuerySimilarityCache> { self.query_cache.as_ref() }

    pub fn get_stats(&self) -> OrchestratorStats {
        let outcomes = self.counters.lock().clone();
        OrchestratorStats {
            avg_response_ms: outcomes.avg_response_ms(),
            cache_hit_rate: outcomes.cache_hit_rate(),
            outcomes,
            domains: self.domains.status(),
            intent: self.detector.get_stats(),
            canonical: self.canonical.as_ref().map(CanonicalAnswerCache::get_stats),
            qa_index: self.qa_index.as_ref().map(QuestionAnswerIndex::get_stats),
            query_cache: self.query_cache.as_ref().map(QuerySimilarityCache::get_stats),
        }
    }

    /// Compact every journal. The orchestrator stays usable afterwards.
    pub fn close(&self) -> Result<()> {
        if let Some(c) = &self.canonical { c.close()?; }
        if let Some(q) = &self.query_cache { q.close()?; }
        if let Some(i) = &self.qa_index { i.flush()?; }
        info!("orchestrator closed");
        Ok(())
    }
}

/// Open the default persisted store for the Q&A index.
pub fn default_qa_store(settings: &Settings) -> Arc<dyn VectorStore> {
    Arc::new(FlatVectorStore::open(settings.resolve(&settings.qa_index.file), settings.storage.compact_ratio))
}

fn domain_list(active: &[Domain]) -> String {
    if active.is_empty() { "none".to_string() } else { active.iter().map(Domain::as_str).collect::<Vec<_>>().join(", ") }
}

fn no_context_message(active: &[Domain]) -> String {
    format!(
        "I don't have information about that in the active domains ({}). Try rephrasing your question or activating another domain.",
        domain_list(active)
    )
}

fn error_message(active: &[Domain]) -> String {
    format!(
        "I encountered an error while searching the active domains ({}). Please try again in a moment.",
        domain_list(active)
    )
}

pub struct OrchestratorBuilder {
    fallback: Arc<dyn RetrievalFallback>,
    detector: NegativeIntentDetector,
    domains: Option<Arc<DomainRegistry>>,
    canonical: Option<CanonicalAnswerCache>,
    qa_index: Option<QuestionAnswerIndex>,
    query_cache: Option<QuerySimilarityCache>,
    bypass_qa_on_negative: bool,
    qa_k: Option<usize>,
}

impl OrchestratorBuilder {
    pub fn new(fallback: Arc<dyn RetrievalFallback>) -> Self {
        Self { fallback, detector: NegativeIntentDetector::default(), domains: None, canonical: None, qa_index: None, query_cache: None, bypass_qa_on_negative: true, qa_k: None }
    }

    pub fn detector(mut self, detector: NegativeIntentDetector) -> Self { self.detector = detector; self }

    pub fn domains(mut self, domains: Arc<DomainRegistry>) -> Self { self.domains = Some(domains); self }

    pub fn canonical(mut self, cache: CanonicalAnswerCache) -> Self { self.canonical = Some(cache); self }

    pub fn qa_index(mut self, index: QuestionAnswerIndex) -> Self { self.qa_index = Some(index); self }

    pub fn query_cache(mut self, cache: QuerySimilarityCache) -> Self { self.query_cache = Some(cache); self }

    pub fn bypass_qa_on_negative(mut self, bypass: bool) -> Self { self.bypass_qa_on_negative = bypass; self }

    pub fn qa_k(mut self, k: usize) -> Self { self.qa_k = Some(k); self }

    /// Without explicit domains the default registry (`lunar` active) is used.
    pub fn build(self) -> Result<RetrievalOrchestrator> {
        let domains = match self.domains {
            Some(d) => d,
            None => Arc::new(DomainRegistry::from_settings(&DomainSettings::default())?),
        };
        let qa_k = self.qa_k.or_else(|| self.qa_index.as_ref().map(QuestionAnswerIndex::default_k)).unwrap_or(3).max(1);
        info!(
            canonical = self.canonical.is_some(),
            qa_index = self.qa_index.is_some(),
            query_cache = self.query_cache.is_some(),
            "orchestrator built"
        );
        Ok(RetrievalOrchestrator {
            detector: self.detector,
            domains,
            canonical: self.canonical,
            qa_index: self.qa_index,
            query_cache: self.query_cache,
            fallback: self.fallback,
            bypass_qa_on_negative: self.bypass_qa_on_negative,
            qa_k,
            counters: Mutex::new(OutcomeCounters::default()),
        })
    }
}
