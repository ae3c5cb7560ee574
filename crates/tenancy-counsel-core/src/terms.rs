//! Frequency-based important-term extraction.
//!
//! Derives corpus-specific "important terms" to augment the static domain
//! vocabulary: any non-stop-word longer than three characters that occurs
//! at least `threshold` times in the corpus sample.
//!
//! Extraction walks the whole corpus, so [`TermCache`] memoizes the
//! resulting vocabulary keyed by a SHA-256 digest of the corpus text, the
//! threshold, and the vocabulary lists that feed extraction. Ingestion
//! changes the corpus text and therefore the key.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::vocabulary::Vocabulary;

/// Default minimum corpus frequency for a term to count as important.
pub const DEFAULT_FREQUENCY_THRESHOLD: usize = 2;

/// Tokens of this many characters or fewer are never important.
const MIN_TERM_LEN: usize = 3;

/// Extract terms occurring at least `threshold` times in `corpus`.
///
/// Tokens are lowercased and split on whitespace only; punctuation stays
/// attached, so `"rent,"` and `"rent"` are counted separately.
pub fn extract_important_terms(
    corpus: &str,
    vocab: &Vocabulary,
    threshold: usize,
) -> HashSet<String> {
    let mut frequency: HashMap<String, usize> = HashMap::new();
    for word in corpus.to_lowercase().split_whitespace() {
        if word.chars().count() > MIN_TERM_LEN && !vocab.is_stop_word(word) {
            *frequency.entry(word.to_string()).or_insert(0) += 1;
        }
    }

    frequency
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|(word, _)| word)
        .collect()
}

/// The working importance vocabulary for one scoring pass: extracted
/// terms, baseline domain terms, and multi-word phrases.
pub fn importance_vocabulary(
    corpus: &str,
    vocab: &Vocabulary,
    threshold: usize,
) -> HashSet<String> {
    let mut terms = extract_important_terms(corpus, vocab, threshold);
    terms.extend(vocab.important_terms.iter().cloned());
    terms.extend(vocab.phrases.iter().cloned());
    terms
}

/// Single-slot memo of the most recent importance vocabulary.
///
/// Concurrent retrievals over the same corpus and vocabulary share one
/// extraction; anything else replaces the slot.
#[derive(Default)]
pub struct TermCache {
    slot: Mutex<Option<(String, Arc<HashSet<String>>)>>,
}

impl TermCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the importance vocabulary for `corpus`, computing it on a miss.
    pub fn get_or_compute(
        &self,
        corpus: &str,
        vocab: &Vocabulary,
        threshold: usize,
    ) -> Arc<HashSet<String>> {
        let key = cache_key(corpus, vocab, threshold);

        {
            let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((cached_key, terms)) = slot.as_ref() {
                if *cached_key == key {
                    tracing::debug!("important-term cache hit");
                    return Arc::clone(terms);
                }
            }
        }

        let terms = Arc::new(importance_vocabulary(corpus, vocab, threshold));
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some((key, Arc::clone(&terms)));
        terms
    }
}

fn cache_key(corpus: &str, vocab: &Vocabulary, threshold: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(threshold.to_le_bytes());
    hash_terms(&mut hasher, vocab.stop_words.iter());
    hash_terms(&mut hasher, vocab.important_terms.iter());
    hash_terms(&mut hasher, vocab.phrases.iter());
    hasher.update(corpus.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Feed a term list into the digest in sorted, length-prefixed form so set
/// iteration order never changes the key.
fn hash_terms<'a>(hasher: &mut Sha256, terms: impl Iterator<Item = &'a String>) {
    let mut sorted: Vec<&String> = terms.collect();
    sorted.sort();
    hasher.update((sorted.len() as u64).to_le_bytes());
    for term in sorted {
        hasher.update((term.len() as u64).to_le_bytes());
        hasher.update(term.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_repeated_terms() {
        let vocab = Vocabulary::default();
        let terms = extract_important_terms(
            "Renovation notice. Renovation costs were shared. Renovation",
            &vocab,
            2,
        );
        assert!(terms.contains("renovation"));
        assert!(!terms.contains("notice."));
        assert!(!terms.contains("costs"));
    }

    #[test]
    fn test_ignores_short_and_stop_words() {
        let vocab = Vocabulary::default();
        let terms = extract_important_terms("the the the fee fee fee about about", &vocab, 2);
        assert!(terms.is_empty());
    }

    #[test]
    fn test_threshold_is_tunable() {
        let vocab = Vocabulary::default();
        let corpus = "mould mould heating heating heating";
        let two = extract_important_terms(corpus, &vocab, 2);
        let three = extract_important_terms(corpus, &vocab, 3);
        assert!(two.contains("mould") && two.contains("heating"));
        assert!(!three.contains("mould") && three.contains("heating"));
    }

    #[test]
    fn test_importance_vocabulary_includes_baseline_and_phrases() {
        let vocab = Vocabulary::default();
        let terms = importance_vocabulary("", &vocab, 2);
        assert!(terms.contains("landlord"));
        assert!(terms.contains("capital expenditure"));
    }

    #[test]
    fn test_cache_matches_direct_computation() {
        let vocab = Vocabulary::default();
        let cache = TermCache::new();
        let corpus = "heating heating repair";
        let first = cache.get_or_compute(corpus, &vocab, 2);
        let second = cache.get_or_compute(corpus, &vocab, 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, importance_vocabulary(corpus, &vocab, 2));

        let other = cache.get_or_compute("mould mould", &vocab, 2);
        assert!(other.contains("mould"));
        assert!(!other.contains("heating"));
    }

    #[test]
    fn test_cache_distinguishes_vocabularies() {
        let cache = TermCache::new();
        let corpus = "heating heating mould mould";
        let default_vocab = Vocabulary::default();
        let mut strict = Vocabulary::default();
        strict.stop_words.insert("heating".to_string());

        let first = cache.get_or_compute(corpus, &default_vocab, 2);
        assert!(first.contains("heating"));

        let second = cache.get_or_compute(corpus, &strict, 2);
        assert_eq!(*second, importance_vocabulary(corpus, &strict, 2));
        assert!(!second.contains("heating"));
        assert!(second.contains("mould"));

        let again = cache.get_or_compute(corpus, &default_vocab, 2);
        assert!(again.contains("heating"));
    }
}
