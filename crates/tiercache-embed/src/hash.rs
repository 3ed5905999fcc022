use std::hash::Hasher;

use tiercache_core::similarity::l2_normalize;
use tiercache_core::traits::Embedder;
use tiercache_text::tokens;
use twox_hash::XxHash64;

/// Feature-hashing bag-of-words embedder.
///
/// Each normalized token lands in bucket `xxh64(token) % dim` with a weight
/// taken from the upper hash bits; the result is L2 normalized. Texts sharing
/// most of their words score high cosine similarity, which is all the cache
/// tiers need from an offline provider.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 0.5 + 0.5 * (((h >> 32) as u32) as f32 / u32::MAX as f32);
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
