//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (nested keys split on `__`, e.g.
//! `APP_QUERY_CACHE__CAPACITY=500`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment.extract().map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))
    }

    fn validate(&self) -> anyhow::Result<()> {
        let s = self.settings()?;
        if s.domains.capacity == 0 { anyhow::bail!("domains.capacity must be at least 1"); }
        if let Some(unknown) = s.domains.initial.iter().find(|d| !s.domains.available.contains(d)) {
            anyhow::bail!("domains.initial contains '{}' which is not in domains.available", unknown);
        }
        for (name, t) in [
            ("canonical.threshold", s.canonical.threshold),
            ("canonical.negative_threshold", s.canonical.negative_threshold),
            ("qa_index.threshold", s.qa_index.threshold),
            ("query_cache.threshold", s.query_cache.threshold),
            ("intent.sensitivity", s.intent.sensitivity),
        ] {
            if !(0.0..=1.0).contains(&t) { anyhow::bail!("{} must be within [0, 1], got {}", name, t); }
        }
        if s.query_cache.capacity == 0 { anyhow::bail!("query_cache.capacity must be at least 1"); }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub domains: DomainSettings,
    pub intent: IntentSettings,
    pub canonical: CanonicalSettings,
    pub qa_index: QaIndexSettings,
    pub query_cache: QueryCacheSettings,
    pub fallback: FallbackSettings,
    pub embedding: EmbeddingSettings,
}

impl Settings {
    /// Resolve a cache file name against `storage.data_dir`.
    pub fn resolve(&self, file: &str) -> PathBuf {
        resolve_with_base(&expand_path(&self.storage.data_dir), file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: String,
    pub compact_ratio: f64,
}

impl Default for StorageSettings {
    fn default() -> Self { Self { data_dir: "data/cache".to_string(), compact_ratio: 2.0 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSettings {
    pub available: Vec<String>,
    pub capacity: usize,
    pub initial: Vec<String>,
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            available: ["lunar", "numerology", "ifs", "astrology", "crystals", "tarot", "archetypes"].iter().map(|s| s.to_string()).collect(),
            capacity: 1,
            initial: vec!["lunar".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    pub sensitivity: f32,
    /// Skip the question-answer index for negated queries.
    pub bypass_qa_index: bool,
}

impl Default for IntentSettings {
    fn default() -> Self { Self { sensitivity: 0.85, bypass_qa_index: true } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalSettings {
    pub enabled: bool,
    pub file: String,
    pub threshold: f32,
    pub negative_threshold: f32,
    pub seed_file: Option<String>,
}

impl Default for CanonicalSettings {
    fn default() -> Self {
        Self { enabled: true, file: "canonical.jsonl".to_string(), threshold: 0.85, negative_threshold: 0.90, seed_file: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaIndexSettings {
    pub enabled: bool,
    pub file: String,
    pub threshold: f32,
    pub k: usize,
    pub batch_size: usize,
}

impl Default for QaIndexSettings {
    fn default() -> Self { Self { enabled: true, file: "qa_index.jsonl".to_string(), threshold: 0.75, k: 3, batch_size: 64 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCacheSettings {
    pub enabled: bool,
    pub file: String,
    pub threshold: f32,
    pub capacity: usize,
    pub eviction_buffer: usize,
}

impl Default for QueryCacheSettings {
    fn default() -> Self {
        Self { enabled: true, file: "query_cache.jsonl".to_string(), threshold: 0.85, capacity: 1000, eviction_buffer: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub k: usize,
    pub max_chars: usize,
}

impl Default for FallbackSettings {
    fn default() -> Self { Self { k: 4, max_chars: 4000 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub dim: usize,
    pub cache_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { dim: 384, cache_size: 2048 } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
