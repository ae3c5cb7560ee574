//! Domain vocabulary injected into the relevance scorer.
//!
//! Every list is plain data: the defaults below describe BC residential
//! tenancy questions, and each list can be replaced independently from
//! the `[vocabulary]` config table or in tests.

use std::collections::HashSet;

use serde::Deserialize;

/// Immutable vocabulary lists used by term extraction and scoring.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Vocabulary {
    /// Closed list of common function words ignored by term extraction.
    #[serde(default = "default_stop_words")]
    pub stop_words: HashSet<String>,
    /// Baseline important terms, always part of the importance vocabulary.
    #[serde(default = "default_important_terms")]
    pub important_terms: HashSet<String>,
    /// Multi-word phrases treated as single concepts.
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
    /// Informal forum vocabulary ("experience", "advice", ...).
    #[serde(default = "default_community_terms")]
    pub community_terms: HashSet<String>,
    /// Term pairs that reinforce each other across query and chunk.
    #[serde(default = "default_related_pairs")]
    pub related_pairs: Vec<(String, String)>,
    /// Forum communities whose posts receive a provenance boost.
    #[serde(default = "default_preferred_communities")]
    pub preferred_communities: HashSet<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            stop_words: default_stop_words(),
            important_terms: default_important_terms(),
            phrases: default_phrases(),
            community_terms: default_community_terms(),
            related_pairs: default_related_pairs(),
            preferred_communities: default_preferred_communities(),
        }
    }
}

impl Vocabulary {
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Case-insensitive allow-list check.
    pub fn is_preferred_community(&self, community: &str) -> bool {
        self.preferred_communities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(community))
    }
}

fn set(words: &[&str]) -> HashSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_stop_words() -> HashSet<String> {
    set(&[
        "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
        "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we",
        "say", "her", "she", "or", "an", "will", "my", "one", "all", "would", "there", "their",
        "what", "so", "up", "out", "if", "about", "who", "get", "which", "go", "me",
    ])
}

fn default_important_terms() -> HashSet<String> {
    set(&[
        "rent",
        "tenant",
        "landlord",
        "deposit",
        "notice",
        "lease",
        "eviction",
        "repair",
        "damage",
        "payment",
        "increase",
        "increases",
        "increased",
        "raising",
        "capital",
        "expenditure",
        "expenditures",
        "expense",
        "decision",
        "decisions",
        "ruling",
        "rulings",
        "precedent",
        "precedents",
        "additional",
        "extra",
        "cost",
        "costs",
        "past",
        "previous",
        "application",
        "approve",
        "approved",
        "approval",
        "rtb",
        "branch",
        "residential",
        "tenancy",
    ])
}

fn default_phrases() -> Vec<String> {
    [
        "rent increase",
        "rental increase",
        "capital expenditure",
        "capital expenditures",
        "additional rent",
        "past decisions",
        "previous rulings",
        "approved increases",
        "residential tenancy branch",
        "tenancy branch",
        "past precedent",
        "past precedents",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_community_terms() -> HashSet<String> {
    set(&[
        "reddit",
        "subreddit",
        "post",
        "comment",
        "thread",
        "vancouverlandlords",
        "landlordbc",
        "legaladvicecanada",
        "experience",
        "advice",
        "similar",
        "situation",
        "help",
    ])
}

fn default_related_pairs() -> Vec<(String, String)> {
    [
        ("capital", "expenditure"),
        ("rent", "increase"),
        ("additional", "rent"),
        ("past", "decision"),
        ("previous", "ruling"),
        ("approved", "increase"),
        ("rental", "cost"),
        ("tenant", "application"),
        ("rtb", "decision"),
        ("branch", "ruling"),
        ("reddit", "experience"),
        ("similar", "situation"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect()
}

fn default_preferred_communities() -> HashSet<String> {
    set(&["vancouverlandlords", "landlordbc", "legaladvicecanada"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_community_is_case_insensitive() {
        let vocab = Vocabulary::default();
        assert!(vocab.is_preferred_community("LandlordBC"));
        assert!(!vocab.is_preferred_community("askreddit"));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let vocab: Vocabulary =
            serde_json::from_str(r#"{ "preferred_communities": ["bcrenters"] }"#).unwrap();
        assert!(vocab.is_preferred_community("bcrenters"));
        assert!(!vocab.is_preferred_community("landlordbc"));
        assert_eq!(vocab.phrases, Vocabulary::default().phrases);
    }
}
