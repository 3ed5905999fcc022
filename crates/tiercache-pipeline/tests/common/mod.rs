#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tiercache_core::similarity::l2_normalize;
use tiercache_core::traits::{Embedder, RetrievalFallback};
use tiercache_core::types::DomainFilter;
use tiercache_embed::HashEmbedder;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Returns fixed vectors for known texts; unknown texts fall back to the
/// hash embedder when `fallback_dim` is set, otherwise fail.
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    hash: Option<HashEmbedder>,
    dim: usize,
    pub calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new(dim: usize) -> Self { Self { vectors: HashMap::new(), hash: None, dim, calls: AtomicUsize::new(0) } }

    pub fn with_hash_fallback(mut self) -> Self {
        self.hash = Some(HashEmbedder::new(self.dim));
        self
    }

    pub fn script(mut self, text: &str, vector: &[f32]) -> Self {
        let mut v = vector.to_vec();
        v.resize(self.dim, 0.0);
        l2_normalize(&mut v);
        self.vectors.insert(text.to_string(), v);
        self
    }
}

impl Embedder for ScriptedEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|t| match (self.vectors.get(t), &self.hash) {
                (Some(v), _) => Ok(v.clone()),
                (None, Some(h)) => Ok(h.embed_one(t)),
                (None, None) => Err(anyhow::anyhow!("no scripted vector for {t:?}")),
            })
            .collect()
    }
}

/// Hash embedder that can be switched into a failing state.
pub struct FlakyEmbedder {
    inner: HashEmbedder,
    pub failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(dim: usize) -> Self { Self { inner: HashEmbedder::new(dim), failing: AtomicBool::new(false), calls: AtomicUsize::new(0) } }

    pub fn set_failing(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }
}

impl Embedder for FlakyEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) { anyhow::bail!("embedding provider unavailable"); }
        self.inner.embed_batch(texts)
    }
}

pub enum Reply {
    Text(String),
    Empty,
    Error,
}

/// Fallback with a fixed reply that records every call.
pub struct RecordingFallback {
    reply: Mutex<Reply>,
    pub calls: AtomicUsize,
    pub last_filter: Mutex<Option<DomainFilter>>,
}

impl RecordingFallback {
    pub fn new(reply: Reply) -> Arc<Self> { Arc::new(Self { reply: Mutex::new(reply), calls: AtomicUsize::new(0), last_filter: Mutex::new(None) }) }

    pub fn set_reply(&self, reply: Reply) { *self.reply.lock() = reply; }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl RetrievalFallback for RecordingFallback {
    fn answer(&self, query: &str, filter: &DomainFilter) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_filter.lock() = Some(filter.clone());
        match &*self.reply.lock() {
            Reply::Text(t) => Ok(format!("{t} ({query})")),
            Reply::Empty => Ok(String::new()),
            Reply::Error => Err(anyhow::anyhow!("generation provider timed out")),
        }
    }
}
