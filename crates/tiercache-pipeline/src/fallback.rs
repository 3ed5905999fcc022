use std::sync::Arc;

use tiercache_core::traits::{Embedder, RetrievalFallback, VectorStore};
use tiercache_core::types::{DomainFilter, Meta, StoredItem, DOMAIN_KEY};
use tracing::debug;

/// Retrieval-only fallback: the nearest corpus passages in the active
/// domains, concatenated up to `max_chars`. No text is generated.
pub struct PassageFallback {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
    max_chars: usize,
}

impl PassageFallback {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, k: usize, max_chars: usize) -> Self {
        Self { store, embedder, k: k.max(1), max_chars }
    }

    /// Embed and store one corpus passage.
    pub fn add_passage(&self, id: &str, text: &str, domain: &str) -> anyhow::Result<()> {
        let mut meta = Meta::new();
        meta.insert(DOMAIN_KEY.to_string(), domain.trim().to_lowercase());
        let vector = self.embedder.embed(text)?;
        self.store.upsert(StoredItem { id: id.to_string(), text: text.to_string(), meta }, vector)
    }
}

impl RetrievalFallback for PassageFallback {
    fn answer(&self, query: &str, filter: &DomainFilter) -> anyhow::Result<String> {
        let vector = self.embedder.embed(query)?;
        let hits = self.store.nearest(&vector, filter, self.k)?;
        let mut out = String::new();
        for hit in hits.iter().filter(|h| filter.matches(h.item.domain())) {
            let text = hit.item.text.trim();
            if text.is_empty() { continue; }
            let sep = if out.is_empty() { "" } else { "\n\n" };
            let room = self.max_chars.saturating_sub(out.chars().count() + sep.chars().count());
            if room == 0 { break; }
            out.push_str(sep);
            out.extend(text.chars().take(room));
        }
        debug!(passages = hits.len(), chars = out.chars().count(), "passage fallback");
        Ok(out)
    }
}
