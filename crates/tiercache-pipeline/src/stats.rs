//! Per-outcome counters kept by the orchestrator.

use std::time::Duration;

use serde::Serialize;
use tiercache_text::IntentStats;

use crate::canonical::CanonicalStats;
use crate::domain::DomainStatus;
use crate::orchestrator::AnswerSource;
use crate::qa_index::QaStats;
use crate::query_cache::QueryCacheStats;

#[derive(Debug, Clone, Default, Serialize)]
pub struct OutcomeCounters {
    pub total_queries: u64,
    pub canonical_hits: u64,
    pub qa_index_hits: u64,
    pub query_cache_hits: u64,
    pub generated: u64,
    pub no_context: u64,
    pub failed: u64,
    pub negative_intent: u64,
    #[serde(skip)]
    total_time: Duration,
}

impl OutcomeCounters {
    pub fn record(&mut self, source: AnswerSource, negative_intent: bool, elapsed: Duration) {
        self.total_queries += 1;
        if negative_intent { self.negative_intent += 1; }
        self.total_time += elapsed;
        match source {
            AnswerSource::Canonical => self.canonical_hits += 1,
            AnswerSource::QaIndex => self.qa_index_hits += 1,
            AnswerSource::QueryCache => self.query_cache_hits += 1,
            AnswerSource::Generated => self.generated += 1,
            AnswerSource::NoContext => self.no_context += 1,
            AnswerSource::Failed => self.failed += 1,
        }
    }

    pub fn avg_response_ms(&self) -> f64 {
        if self.total_queries == 0 { 0.0 } else { self.total_time.as_secs_f64() * 1000.0 / self.total_queries as f64 }
    }

    /// Share of queries answered without reaching the fallback.
    pub fn cache_hit_rate(&self) -> f64 {
        let cached = self.canonical_hits + self.qa_index_hits + self.query_cache_hits;
        if self.total_queries == 0 { 0.0 } else { cached as f64 / self.total_queries as f64 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStats {
    pub outcomes: OutcomeCounters,
    pub avg_response_ms: f64,
    pub cache_hit_rate: f64,
    pub domains: DomainStatus,
    pub intent: IntentStats,
    pub canonical: Option<CanonicalStats>,
    pub qa_index: Option<QaStats>,
    pub query_cache: Option<QueryCacheStats>,
}
