//! Capabilities the core consumes from its collaborators.
//!
//! Every call may block on I/O and may fail; callers decide whether a failure
//! is a miss (lookup stages) or a user-visible error (the final fallback).

use std::sync::Arc;

use crate::types::{DomainFilter, Neighbor, StoredItem};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn dim(&self) -> usize { (**self).dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed(text) }
}

pub trait VectorStore: Send + Sync {
    /// Insert or replace items by `StoredItem::id`.
    fn upsert_batch(&self, items: Vec<(StoredItem, Vec<f32>)>) -> anyhow::Result<()>;

    /// Up to `k` items closest to `vector` among those matching `filter`,
    /// ordered by ascending cosine distance.
    fn nearest(&self, vector: &[f32], filter: &DomainFilter, k: usize) -> anyhow::Result<Vec<Neighbor>>;

    fn delete(&self, id: &str) -> anyhow::Result<bool>;
    fn len(&self) -> anyhow::Result<usize>;
    fn clear(&self) -> anyhow::Result<()>;

    fn upsert(&self, item: StoredItem, vector: Vec<f32>) -> anyhow::Result<()> {
        self.upsert_batch(vec![(item, vector)])
    }

    fn is_empty(&self) -> anyhow::Result<bool> { Ok(self.len()? == 0) }

    /// Make pending writes durable and compact where the backend supports it.
    fn flush(&self) -> anyhow::Result<()> { Ok(()) }
}

impl<T: VectorStore + ?Sized> VectorStore for Arc<T> {
    fn upsert_batch(&self, items: Vec<(StoredItem, Vec<f32>)>) -> anyhow::Result<()> { (**self).upsert_batch(items) }
    fn nearest(&self, vector: &[f32], filter: &DomainFilter, k: usize) -> anyhow::Result<Vec<Neighbor>> { (**self).nearest(vector, filter, k) }
    fn delete(&self, id: &str) -> anyhow::Result<bool> { (**self).delete(id) }
    fn len(&self) -> anyhow::Result<usize> { (**self).len() }
    fn clear(&self) -> anyhow::Result<()> { (**self).clear() }
    fn flush(&self) -> anyhow::Result<()> { (**self).flush() }
}

/// The full-corpus retrieval path consulted when every cache misses.
pub trait RetrievalFallback: Send + Sync {
    /// An empty string means "nothing relevant in the filtered corpus".
    fn answer(&self, query: &str, filter: &DomainFilter) -> anyhow::Result<String>;
}
