//! Negative-intent classification.
//!
//! Decides whether a query is framed as negation, avoidance or warning
//! ("why should I avoid moon water?") rather than a direct ask. Callers use
//! the verdict to keep cached affirmative answers away from negated questions.

use serde::Serialize;
use tracing::debug;

use crate::tokenize::{contains_word, normalize, token_set};

const PHRASES: &[&str] = &[
	"why should i avoid", "is it dangerous", "why not to", "problems with", "issues with", "side effects",
	"negative effects", "what not to", "when not to", "how to stop", "how to avoid", "why avoid", "get rid of",
];

const CRITICAL: &[&str] = &[
	"not", "never", "no", "don't", "dont", "can't", "cant", "cannot", "won't", "wont", "shouldn't", "shouldnt",
	"isn't", "isnt", "aren't", "doesn't", "didn't", "wouldn't", "couldn't", "mustn't", "nor",
];

const STRONG: &[&str] = &[
	"avoid", "dangerous", "harmful", "stop", "fail", "bad", "wrong", "against", "dispose", "remove", "toxic",
	"unsafe", "risky", "refuse", "reject", "oppose", "prevent", "block", "forbidden", "warning", "caution",
];

const CONTEXTUAL: &[&str] = &[
	"problem", "problems", "issue", "issues", "concern", "concerns", "risk", "risks", "downside", "downsides",
	"drawback", "drawbacks", "mistake", "mistakes",
];

/// Phrases match as plain substrings of the whitespace-collapsed text, so
/// "is it dangerously" still carries "is it dangerous".
fn matched_phrases(normalized: &str) -> impl Iterator<Item = &'static str> {
	let flat = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
	PHRASES.iter().copied().filter(move |p| flat.contains(p))
}

const SHORT_STRONG_QUERY: usize = 5;
const SHORT_CONTEXTUAL_QUERY: usize = 3;
const CONTEXTUAL_RATIO: f32 = 0.30;

/// Which rule produced a negative verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentRule {
	Phrase,
	Critical,
	Strong,
	Contextual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntentVerdict {
	pub negative: bool,
	pub rule: Option<IntentRule>,
}

impl IntentVerdict {
	const AFFIRMATIVE: Self = Self { negative: false, rule: None };

	fn fired(rule: IntentRule) -> Self { Self { negative: true, rule: Some(rule) } }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentStats {
	pub phrases: usize,
	pub critical_words: usize,
	pub strong_words: usize,
	pub contextual_words: usize,
	pub sensitivity: f32,
}

/// Pure text classifier; holds only its sensitivity.
#[derive(Debug, Clone, Copy)]
pub struct NegativeIntentDetector {
	sensitivity: f32,
}

impl Default for NegativeIntentDetector {
	fn default() -> Self { Self::new(0.85) }
}

impl NegativeIntentDetector {
	/// `sensitivity` is clamped to `[0, 1]`; higher means a single strong word
	/// in a longer query is more likely to count.
	pub fn new(sensitivity: f32) -> Self { Self { sensitivity: sensitivity.clamp(0.0, 1.0) } }

	pub fn sensitivity(&self) -> f32 { self.sensitivity }

	pub fn has_negative_intent(&self, query: &str) -> bool { self.classify(query).negative }

	/// Rules are tried in priority order and the first one that fires wins.
	pub fn classify(&self, query: &str) -> IntentVerdict {
		let normalized = normalize(query);
		if normalized.trim().is_empty() { return IntentVerdict::AFFIRMATIVE; }

		if matched_phrases(&normalized).next().is_some() {
			return self.verdict(query, IntentVerdict::fired(IntentRule::Phrase));
		}

		let words = token_set(&normalized);
		let total = words.len();
		let matched = |list: &[&str]| list.iter().filter(|w| words.contains(**w)).count();

		let critical: Vec<&str> = CRITICAL.iter().copied().filter(|w| words.contains(*w)).collect();
		let critical_hit = match critical.as_slice() {
			[] => false,
			["no"] => contains_word(&normalized, "no"),
			_ => true,
		};
		if critical_hit { return self.verdict(query, IntentVerdict::fired(IntentRule::Critical)); }

		let strong = matched(STRONG);
		if strong > 0 {
			let ratio = strong as f32 / total as f32;
			if total <= SHORT_STRONG_QUERY || strong >= 2 || ratio > 1.0 - self.sensitivity {
				return self.verdict(query, IntentVerdict::fired(IntentRule::Strong));
			}
		}

		let contextual = matched(CONTEXTUAL);
		if contextual > 0 {
			let ratio = contextual as f32 / total as f32;
			if total <= SHORT_CONTEXTUAL_QUERY || contextual >= 2 || ratio >= CONTEXTUAL_RATIO {
				return self.verdict(query, IntentVerdict::fired(IntentRule::Contextual));
			}
		}

		IntentVerdict::AFFIRMATIVE
	}

	/// Every matched term, formatted as `"<kind>: '<term>'"`, phrases first.
	pub fn get_negative_indicators(&self, query: &str) -> Vec<String> {
		let normalized = normalize(query);
		let words = token_set(&normalized);
		let mut out: Vec<String> = matched_phrases(&normalized).map(|p| format!("phrase: '{p}'")).collect();
		for (kind, list) in [("critical", CRITICAL), ("strong", STRONG), ("contextual", CONTEXTUAL)] {
			out.extend(list.iter().filter(|w| words.contains(**w)).map(|w| format!("{kind}: '{w}'")));
		}
		out
	}

	pub fn get_stats(&self) -> IntentStats {
		IntentStats {
			phrases: PHRASES.len(),
			critical_words: CRITICAL.len(),
			strong_words: STRONG.len(),
			contextual_words: CONTEXTUAL.len(),
			sensitivity: self.sensitivity,
		}
	}

	fn verdict(&self, query: &str, verdict: IntentVerdict) -> IntentVerdict {
		debug!(query, rule = ?verdict.rule, "negative intent");
		verdict
	}
}
