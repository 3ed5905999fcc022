//! Query text handling: normalization, tokenization and negative-intent
//! classification.

pub mod intent;
pub mod tokenize;

pub use intent::{IntentRule, IntentStats, IntentVerdict, NegativeIntentDetector};
pub use tokenize::{contains_word, normalize, token_set, tokens};
