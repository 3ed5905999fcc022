//! Vector stores implementing `tiercache_core::traits::VectorStore`.
//!
//! `FlatVectorStore` is an exact brute-force index persisted through the
//! journal; with the `lance` feature, `LanceVectorStore` keeps items in a
//! LanceDB table.

pub mod flat;
#[cfg(feature = "lance")]
pub mod lance;
#[cfg(feature = "lance")]
pub mod schema;
#[cfg(feature = "lance")]
pub mod table;

pub use flat::FlatVectorStore;
#[cfg(feature = "lance")]
pub use lance::LanceVectorStore;
