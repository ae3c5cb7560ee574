//! Lexical relevance scoring.
//!
//! Scores a tokenized chunk against a tokenized query. The score is a
//! plain sum of bonuses with no normalization and no upper bound:
//!
//! | Signal | Applies when | Default |
//! |--------|--------------|---------|
//! | provenance | forum chunk from a preferred community | +10 |
//! | phrase | a vocabulary phrase is in the query and in the chunk | +8 |
//! | phrase word | per word of a query phrase found in the chunk | +2 each |
//! | overlap | per token shared by query and chunk | +1 |
//! | important term | shared token is in the importance vocabulary | +4 |
//! | community term | shared token is forum vocabulary | +3 |
//! | related pair | shared token's partner in a related pair is in the chunk | +5 |
//! | recency | forum post younger than the window | `max(0, 5 - months_old)` |
//!
//! Missing or malformed signals (no community, unparseable post date)
//! contribute nothing; scoring never fails.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Provenance, SourceKind};
use crate::terms::{importance_vocabulary, DEFAULT_FREQUENCY_THRESHOLD};
use crate::vocabulary::Vocabulary;

/// Average month length used for post age.
const SECONDS_PER_MONTH: f64 = 60.0 * 60.0 * 24.0 * 30.0;

/// Bonus magnitudes for each scoring signal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_preferred_community")]
    pub preferred_community: f64,
    #[serde(default = "default_phrase_match")]
    pub phrase_match: f64,
    #[serde(default = "default_phrase_word")]
    pub phrase_word: f64,
    #[serde(default = "default_base_overlap")]
    pub base_overlap: f64,
    #[serde(default = "default_important_term")]
    pub important_term: f64,
    #[serde(default = "default_community_term")]
    pub community_term: f64,
    #[serde(default = "default_related_pair")]
    pub related_pair: f64,
    /// Recency bonus for a post made just now.
    #[serde(default = "default_recency_max")]
    pub recency_max: f64,
    /// Posts older than this many months get no recency bonus.
    #[serde(default = "default_recency_window_months")]
    pub recency_window_months: f64,
}

fn default_preferred_community() -> f64 {
    10.0
}
fn default_phrase_match() -> f64 {
    8.0
}
fn default_phrase_word() -> f64 {
    2.0
}
fn default_base_overlap() -> f64 {
    1.0
}
fn default_important_term() -> f64 {
    4.0
}
fn default_community_term() -> f64 {
    3.0
}
fn default_related_pair() -> f64 {
    5.0
}
fn default_recency_max() -> f64 {
    5.0
}
fn default_recency_window_months() -> f64 {
    6.0
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            preferred_community: default_preferred_community(),
            phrase_match: default_phrase_match(),
            phrase_word: default_phrase_word(),
            base_overlap: default_base_overlap(),
            important_term: default_important_term(),
            community_term: default_community_term(),
            related_pair: default_related_pair(),
            recency_max: default_recency_max(),
            recency_window_months: default_recency_window_months(),
        }
    }
}

impl ScoringWeights {
    /// Iterate `(name, value)` pairs, used for config validation.
    pub fn fields(&self) -> [(&'static str, f64); 9] {
        [
            ("preferred_community", self.preferred_community),
            ("phrase_match", self.phrase_match),
            ("phrase_word", self.phrase_word),
            ("base_overlap", self.base_overlap),
            ("important_term", self.important_term),
            ("community_term", self.community_term),
            ("related_pair", self.related_pair),
            ("recency_max", self.recency_max),
            ("recency_window_months", self.recency_window_months),
        ]
    }
}

/// Per-signal contributions to a chunk's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub provenance: f64,
    pub phrase: f64,
    pub overlap: f64,
    pub related_pairs: f64,
    pub recency: f64,
    pub total: f64,
}

/// Tokenized text: cleaned word sequence plus unigram and bigram set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    /// Cleaned words joined by single spaces, used for phrase lookups.
    pub text: String,
    /// Unigrams and adjacent-word bigrams, ordered for deterministic sums.
    pub terms: BTreeSet<String>,
}

impl Tokens {
    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Lowercase, strip punctuation, and produce unigrams plus bigrams.
///
/// Apostrophes are kept so contractions stay single words. Queries and
/// chunks go through this same function.
pub fn tokenize(text: &str) -> Tokens {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !(c.is_ascii_punctuation() && *c != '\''))
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    let mut terms: BTreeSet<String> = words.iter().map(|w| w.to_string()).collect();
    for pair in words.windows(2) {
        terms.insert(format!("{} {}", pair[0], pair[1]));
    }

    Tokens {
        text: words.join(" "),
        terms,
    }
}

/// Scores chunks against a query with a fixed vocabulary and clock.
pub struct Scorer<'a> {
    vocab: &'a Vocabulary,
    weights: &'a ScoringWeights,
    important: &'a HashSet<String>,
    now: DateTime<Utc>,
}

impl<'a> Scorer<'a> {
    /// `important` is the working importance vocabulary, usually from
    /// [`importance_vocabulary`] or a [`TermCache`](crate::terms::TermCache).
    pub fn new(
        vocab: &'a Vocabulary,
        weights: &'a ScoringWeights,
        important: &'a HashSet<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            vocab,
            weights,
            important,
            now,
        }
    }

    pub fn score(&self, chunk: &Tokens, query: &Tokens, provenance: &Provenance) -> f64 {
        self.explain(chunk, query, provenance).total
    }

    /// Score with a per-signal breakdown.
    pub fn explain(&self, chunk: &Tokens, query: &Tokens, provenance: &Provenance) -> ScoreBreakdown {
        let w = self.weights;
        let mut b = ScoreBreakdown::default();

        if provenance.kind == SourceKind::Forum {
            if let Some(community) = &provenance.community {
                if self.vocab.is_preferred_community(community) {
                    b.provenance += w.preferred_community;
                }
            }
        }

        for phrase in &self.vocab.phrases {
            if !query.text.contains(phrase.as_str()) {
                continue;
            }
            if chunk.text.contains(phrase.as_str()) {
                b.phrase += w.phrase_match;
            }
            let words_found = phrase
                .split_whitespace()
                .filter(|part| chunk.text.contains(part))
                .count();
            b.phrase += words_found as f64 * w.phrase_word;
        }

        for term in query.terms.intersection(&chunk.terms) {
            let mut term_score = w.base_overlap;
            if self.important.contains(term) {
                term_score += w.important_term;
            }
            if self.vocab.community_terms.contains(term) {
                term_score += w.community_term;
            }
            b.overlap += term_score;

            for (first, second) in &self.vocab.related_pairs {
                if (term == first && chunk.contains(second))
                    || (term == second && chunk.contains(first))
                {
                    b.related_pairs += w.related_pair;
                }
            }
        }

        if provenance.kind == SourceKind::Forum {
            b.recency = self.recency_bonus(provenance.posted_at.as_deref());
        }

        b.total = b.provenance + b.phrase + b.overlap + b.related_pairs + b.recency;
        b
    }

    fn recency_bonus(&self, posted_at: Option<&str>) -> f64 {
        let Some(posted) = posted_at.and_then(parse_post_date) else {
            return 0.0;
        };
        let age_secs = (self.now - posted).num_seconds().max(0) as f64;
        let months_old = age_secs / SECONDS_PER_MONTH;
        if months_old > self.weights.recency_window_months {
            return 0.0;
        }
        (self.weights.recency_max - months_old).max(0.0)
    }
}

/// Parse a stored post timestamp. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DD`, or Unix seconds. Anything else yields `None`.
pub fn parse_post_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// One-shot scoring from raw text, deriving the importance vocabulary
/// from `corpus_sample` with the default frequency threshold.
///
/// Retrieval computes the importance vocabulary once per query instead;
/// this entry point is for ad hoc scoring and tests.
pub fn score_text(
    chunk_text: &str,
    query_text: &str,
    corpus_sample: &str,
    provenance: &Provenance,
    vocab: &Vocabulary,
    weights: &ScoringWeights,
) -> f64 {
    let important = importance_vocabulary(corpus_sample, vocab, DEFAULT_FREQUENCY_THRESHOLD);
    Scorer::new(vocab, weights, &important, Utc::now()).score(
        &tokenize(chunk_text),
        &tokenize(query_text),
        provenance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn web() -> Provenance {
        Provenance::default()
    }

    fn forum(community: &str, posted_at: Option<&str>) -> Provenance {
        Provenance {
            kind: SourceKind::Forum,
            community: Some(community.to_string()),
            posted_at: posted_at.map(str::to_string),
        }
    }

    fn explain(chunk: &str, query: &str, provenance: &Provenance) -> ScoreBreakdown {
        let vocab = Vocabulary::default();
        let weights = ScoringWeights::default();
        let important = importance_vocabulary("", &vocab, 2);
        Scorer::new(&vocab, &weights, &important, now()).explain(
            &tokenize(chunk),
            &tokenize(query),
            provenance,
        )
    }

    #[test]
    fn test_tokenize_unigrams_and_bigrams() {
        let t = tokenize("Rent, increase!");
        assert_eq!(t.text, "rent increase");
        assert!(t.contains("rent"));
        assert!(t.contains("increase"));
        assert!(t.contains("rent increase"));
        assert_eq!(t.terms.len(), 3);
    }

    #[test]
    fn test_tokenize_keeps_apostrophes() {
        let t = tokenize("The landlord's notice?");
        assert!(t.contains("landlord's"));
        assert!(t.contains("notice"));
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        let b = explain("pet damage deposits are capped", "when is rent due", &web());
        assert_eq!(b.total, 0.0);
    }

    #[test]
    fn test_overlap_weights_are_additive() {
        // "landlord" is important (1 + 4); "advice" is forum vocabulary (1 + 3).
        let b = explain("landlord advice", "landlord advice", &web());
        // Bigram "landlord advice" also matches (1).
        assert_eq!(b.overlap, 5.0 + 4.0 + 1.0);
        assert_eq!(b.total, 10.0);
    }

    #[test]
    fn test_phrase_and_phrase_words() {
        let b = explain("a rent increase notice", "about my rent increase", &web());
        // Exact phrase (8) plus both words present (2 × 2).
        assert_eq!(b.phrase, 12.0);
    }

    #[test]
    fn test_phrase_words_without_exact_phrase() {
        let b = explain("the increase to rent", "rent increase", &web());
        assert_eq!(b.phrase, 4.0);
    }

    #[test]
    fn test_related_pair_bonus() {
        // Query "capital" matches; chunk also holds "expenditure".
        let b = explain("capital expenditure approved", "capital repairs", &web());
        assert_eq!(b.related_pairs, 5.0);
    }

    #[test]
    fn test_preferred_community_boost() {
        let preferred = explain("roof repair", "roof repair", &forum("LandlordBC", None));
        let other = explain("roof repair", "roof repair", &forum("askreddit", None));
        assert_eq!(preferred.provenance, 10.0);
        assert_eq!(other.provenance, 0.0);
        assert!(preferred.total > other.total);
    }

    #[test]
    fn test_preferred_community_ignored_for_web() {
        let p = Provenance {
            kind: SourceKind::Web,
            community: Some("landlordbc".to_string()),
            posted_at: None,
        };
        assert_eq!(explain("x", "y", &p).provenance, 0.0);
    }

    #[test]
    fn test_recency_decays_linearly() {
        let posted = (now() - Duration::days(60)).to_rfc3339();
        let b = explain("roof", "roof", &forum("askreddit", Some(&posted)));
        assert!((b.recency - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recency_outside_window() {
        let b = explain("roof", "roof", &forum("askreddit", Some("2020-01-01")));
        assert_eq!(b.recency, 0.0);
    }

    #[test]
    fn test_malformed_post_date_is_skipped() {
        let b = explain("roof repair", "roof repair", &forum("askreddit", Some("last tuesday")));
        assert_eq!(b.recency, 0.0);
        assert!(b.overlap > 0.0);
    }

    #[test]
    fn test_parse_post_date_formats() {
        assert!(parse_post_date("2025-05-01T10:00:00Z").is_some());
        assert!(parse_post_date("2025-05-01 10:00:00").is_some());
        assert!(parse_post_date("2025-05-01").is_some());
        assert!(parse_post_date("1746093600").is_some());
        assert!(parse_post_date("soon").is_none());
    }

    #[test]
    fn test_deterministic_and_non_negative() {
        let a = explain(
            "capital expenditure rent increase approved by the branch",
            "can my landlord increase rent for capital expenditure",
            &forum("landlordbc", Some("2025-05-01")),
        );
        let b = explain(
            "capital expenditure rent increase approved by the branch",
            "can my landlord increase rent for capital expenditure",
            &forum("landlordbc", Some("2025-05-01")),
        );
        assert_eq!(a, b);
        assert!(a.total >= 0.0);
    }

    #[test]
    fn test_score_text_uses_corpus_terms() {
        let vocab = Vocabulary::default();
        let weights = ScoringWeights::default();
        let plain = score_text("mould mould", "mould", "", &web(), &vocab, &weights);
        let boosted = score_text("mould mould", "mould", "mould mould", &web(), &vocab, &weights);
        assert_eq!(plain, 1.0);
        assert_eq!(boosted, 5.0);
    }
}
