//! Shared building blocks for the tiered retrieval cache: configuration,
//! errors, collaborator traits, record types and the persistence journal.

pub mod config;
pub mod error;
pub mod journal;
pub mod similarity;
pub mod timestamp;
pub mod traits;
pub mod types;
