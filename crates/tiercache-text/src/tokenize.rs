use std::collections::BTreeSet;

/// Lowercase, fold curly apostrophes and replace punctuation with spaces.
///
/// An apostrophe survives only between two alphanumerics so contractions
/// ("don't") stay one token while quoting ('moon') does not.
pub fn normalize(text: &str) -> String {
	let chars: Vec<char> = text.chars().map(|c| if c == '\u{2019}' || c == '\u{2018}' { '\'' } else { c }).collect();
	let mut out = String::with_capacity(text.len());
	for (i, &c) in chars.iter().enumerate() {
		if c.is_alphanumeric() {
			out.extend(c.to_lowercase());
		} else if c == '\'' && i > 0 && chars[i - 1].is_alphanumeric() && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric()) {
			out.push('\'');
		} else {
			out.push(' ');
		}
	}
	out
}

pub fn tokens(text: &str) -> Vec<String> {
	normalize(text).split_whitespace().map(str::to_string).collect()
}

pub fn token_set(text: &str) -> BTreeSet<String> {
	tokens(text).into_iter().collect()
}

/// Whole-word (or whole-phrase) containment on normalized text.
pub fn contains_word(text: &str, word: &str) -> bool {
	let hay = format!(" {} ", tokens(text).join(" "));
	let needle = format!(" {} ", tokens(word).join(" "));
	!needle.trim().is_empty() && hay.contains(&needle)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn contractions_survive_and_quotes_do_not() {
		assert_eq!(tokens("Don't use 'moon' water?!"), vec!["don't", "use", "moon", "water"]);
		assert_eq!(tokens("Can\u{2019}t STOP"), vec!["can't", "stop"]);
	}

	#[test]
	fn word_containment_respects_boundaries() {
		assert!(contains_word("I know nothing", "know"));
		assert!(!contains_word("I know nothing", "no"));
		assert!(contains_word("no, thanks", "no"));
		assert!(contains_word("Any problems with it?", "problems with"));
		assert!(!contains_word("anything", ""));
	}
}
