//! Embedding providers for the retrieval cache.
//!
//! `HashEmbedder` is a deterministic offline embedder; `CachedEmbedder`
//! memoizes any `Embedder` so repeated texts never reach the provider twice.

use std::sync::Arc;

use tiercache_core::config::EmbeddingSettings;
use tiercache_core::traits::Embedder;
use tracing::{info, warn};

pub mod cached;
pub mod hash;

pub use cached::{CachedEmbedder, EmbedCacheStats};
pub use hash::HashEmbedder;

/// Build the configured embedder wrapped in a memo cache.
///
/// Only the hash embedder ships with this workspace; model-backed providers
/// are injected by the caller through the `Embedder` trait.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Arc<dyn Embedder> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake {
        info!(dim = settings.dim, "using hash embedder");
    } else {
        warn!(dim = settings.dim, "no model embedder bundled, falling back to hash embedder");
    }
    Arc::new(CachedEmbedder::new(HashEmbedder::new(settings.dim), settings.cache_size))
}
