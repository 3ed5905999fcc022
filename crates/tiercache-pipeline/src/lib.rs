//! The tiered retrieval cache: domain policy, canonical answers, the
//! question/answer index, the query similarity cache and the orchestrator
//! that runs them in order before falling back to full retrieval.

pub mod canonical;
pub mod domain;
pub mod fallback;
pub mod orchestrator;
pub mod qa_index;
pub mod query_cache;
pub mod seed;
pub mod stats;

pub use canonical::{CanonicalAnswerCache, CanonicalMatch, CanonicalRecord, CanonicalStats, MatchKind};
pub use domain::{DomainRegistry, DomainStatus};
pub use fallback::PassageFallback;
pub use orchestrator::{default_qa_store, Answer, AnswerSource, OrchestratorBuilder, RetrievalOrchestrator};
pub use qa_index::{BatchReport, QaMatch, QaStats, QuestionAnswerIndex};
pub use query_cache::{CacheEntry, CacheHit, QueryCacheStats, QuerySimilarityCache};
pub use stats::{OrchestratorStats, OutcomeCounters};
