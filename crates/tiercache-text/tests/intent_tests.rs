use proptest::prelude::*;
use tiercache_text::{IntentRule, NegativeIntentDetector};

fn detector() -> NegativeIntentDetector { NegativeIntentDetector::default() }

#[test]
fn empty_and_whitespace_are_affirmative() {
	let d = detector();
	for q in ["", "   ", "\n\t", "?!..."] {
		let v = d.classify(q);
		assert!(!v.negative, "{q:?}");
		assert_eq!(v.rule, None);
	}
}

#[test]
fn plain_questions_are_affirmative() {
	let d = detector();
	for q in ["What is moon water?", "What are the phases of the moon?", "How do I make moon water at home?", "Tell me about the full moon in Scorpio"] {
		assert!(!d.has_negative_intent(q), "{q}");
	}
}

#[test]
fn phrase_rule_fires_first() {
	let d = detector();
	let v = d.classify("Why should I avoid moon water?");
	assert!(v.negative);
	assert_eq!(v.rule, Some(IntentRule::Phrase));
	assert_eq!(d.classify("Are there side effects of crystal baths?").rule, Some(IntentRule::Phrase));
	assert!(d.get_negative_indicators("Why should I avoid moon water?").contains(&"phrase: 'why should i avoid'".to_string()));
}

#[test]
fn phrases_match_inside_longer_words() {
	let d = detector();
	assert_eq!(d.classify("Is it dangerously easy to overcharge a crystal?").rule, Some(IntentRule::Phrase));
	assert!(d.get_negative_indicators("Is it dangerously easy to overcharge a crystal?").contains(&"phrase: 'is it dangerous'".to_string()));
}

#[test]
fn critical_negators_and_contractions() {
	let d = detector();
	assert_eq!(d.classify("I don't want to charge crystals under the moon").rule, Some(IntentRule::Critical));
	assert_eq!(d.classify("Crystals I can\u{2019}t cleanse with salt").rule, Some(IntentRule::Critical));
	assert_eq!(d.classify("never drink moon water").rule, Some(IntentRule::Critical));
}

#[test]
fn bare_no_must_be_a_standalone_word() {
	let d = detector();
	assert!(!d.has_negative_intent("What do you know about the new moon?"));
	assert!(!d.has_negative_intent("Is there anything notable about Nov moons?"));
	assert_eq!(d.classify("Is there no full moon in February sometimes?").rule, Some(IntentRule::Critical));
}

#[test]
fn strong_words_depend_on_query_length() {
	let d = detector();
	assert_eq!(d.classify("avoid moon water").rule, Some(IntentRule::Strong), "short query");
	assert_eq!(
		d.classify("which harmful and toxic stones fade in the sun during long summer afternoons").rule,
		Some(IntentRule::Strong),
		"two distinct matches"
	);
	// One match in a long query: 1/11 is below 1 - 0.85.
	assert!(!d.has_negative_intent("what should I do to stop feeling tired after the full moon"));
	// With full sensitivity any single match counts.
	assert!(NegativeIntentDetector::new(1.0).has_negative_intent("what should I do to stop feeling tired after the full moon"));
}

#[test]
fn contextual_words_need_density() {
	let d = detector();
	assert_eq!(d.classify("moon water concerns").rule, Some(IntentRule::Contextual));
	assert_eq!(d.classify("common mistakes and issues for beginners reading lunar calendars in spring").rule, Some(IntentRule::Contextual));
	assert!(!d.has_negative_intent("what is the biggest concern people have when starting a lunar journal"));
}

#[test]
fn indicators_list_every_kind() {
	let d = detector();
	let ind = d.get_negative_indicators("Why not avoid risks?");
	assert!(ind.contains(&"critical: 'not'".to_string()));
	assert!(ind.contains(&"strong: 'avoid'".to_string()));
	assert!(ind.contains(&"contextual: 'risks'".to_string()));
	assert!(d.get_negative_indicators("What is moon water?").is_empty());
}

#[test]
fn stats_report_vocabulary_sizes() {
	let stats = NegativeIntentDetector::new(0.7).get_stats();
	assert!(stats.phrases > 0 && stats.critical_words > 0 && stats.strong_words > 0 && stats.contextual_words > 0);
	assert!((stats.sensitivity - 0.7).abs() < 1e-6);
}

proptest! {
	#[test]
	fn classification_ignores_case_and_punctuation(words in proptest::collection::vec("[a-z]{1,8}", 0..12)) {
		let d = detector();
		let plain = words.join(" ");
		let shouty = format!("{}?!", plain.to_uppercase());
		prop_assert_eq!(d.classify(&plain), d.classify(&shouty));
	}
}
