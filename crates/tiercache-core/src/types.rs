//! Domain types shared by the caches, the vector stores and the orchestrator.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ItemId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key every store filters on.
pub const DOMAIN_KEY: &str = "domain";

/// A named knowledge partition. The set of valid domains is closed and fixed
/// at startup; see `DomainRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn new(name: impl Into<String>) -> Self { Self(name.into().trim().to_lowercase()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self { Self::new(s) }
}

impl From<String> for Domain {
    fn from(s: String) -> Self { Self::new(s) }
}

/// Domain-membership predicate handed to `VectorStore::nearest`.
///
/// `Any` means "no filter" and is what an empty active set produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DomainFilter {
    #[default]
    Any,
    In(Vec<Domain>),
}

impl DomainFilter {
    pub fn from_domains(domains: &[Domain]) -> Self {
        if domains.is_empty() { Self::Any } else { Self::In(domains.to_vec()) }
    }

    pub fn domains(&self) -> &[Domain] {
        match self {
            Self::Any => &[],
            Self::In(domains) => domains,
        }
    }

    pub fn matches(&self, domain: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::In(domains) => domain.is_some_and(|d| domains.iter().any(|x| x.as_str() == d)),
        }
    }

    /// `{"domain": {"in": [...]}}`, or `{}` when unfiltered.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Any => serde_json::json!({}),
            Self::In(domains) => serde_json::json!({ "domain": { "in": domains } }),
        }
    }

    /// SQL predicate for stores that accept one, e.g. `domain IN ('lunar','ifs')`.
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::Any => None,
            Self::In(domains) => {
                let list = domains.iter().map(|d| format!("'{}'", d.as_str().replace('\'', "''"))).collect::<Vec<_>>().join(",");
                Some(format!("{DOMAIN_KEY} IN ({list})"))
            }
        }
    }
}

/// A unit stored in a vector index: the embedded text plus string metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: ItemId,
    pub text: String,
    #[serde(default)]
    pub meta: Meta,
}

impl StoredItem {
    pub fn domain(&self) -> Option<&str> { self.meta.get(DOMAIN_KEY).map(String::as_str) }
}

/// One result of a nearest-neighbour query. `distance` is cosine distance,
/// so `similarity() == 1 - distance`.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub item: StoredItem,
    pub distance: f32,
}

impl Neighbor {
    pub fn similarity(&self) -> f32 { 1.0 - self.distance }
}

/// A curated question/answer pair held by the question-answer index.
///
/// Only `question` is embedded; the answer travels as metadata so that a
/// similarity search measures "is this the same question".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub id: ItemId,
    pub question: String,
    pub answer: String,
    pub domain: Domain,
    #[serde(default)]
    pub source: String,
    #[serde(with = "crate::timestamp", default = "crate::timestamp::now")]
    pub created_at: DateTime<Utc>,
}

impl QaRecord {
    pub fn to_stored_item(&self) -> StoredItem {
        let mut meta = Meta::new();
        meta.insert(DOMAIN_KEY.to_string(), self.domain.as_str().to_string());
        meta.insert("answer".to_string(), self.answer.clone());
        meta.insert("source".to_string(), self.source.clone());
        meta.insert("created_at".to_string(), self.created_at.to_rfc3339());
        meta.insert("doc_type".to_string(), "qa".to_string());
        StoredItem { id: self.id.clone(), text: self.question.clone(), meta }
    }

    /// Rebuild a record from a stored item; `None` when the item is not a Q&A entry.
    pub fn from_stored_item(item: &StoredItem) -> Option<Self> {
        let answer = item.meta.get("answer")?.clone();
        let domain = Domain::new(item.domain()?);
        let created_at = item.meta.get("created_at").and_then(|s| crate::timestamp::parse(s)).unwrap_or_else(Utc::now);
        Some(Self {
            id: item.id.clone(),
            question: item.text.clone(),
            answer,
            domain,
            source: item.meta.get("source").cloned().unwrap_or_default(),
            created_at,
        })
    }
}
