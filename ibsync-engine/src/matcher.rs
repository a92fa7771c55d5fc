//! Name matching
//!
//! Compares two free-text names and classifies the match. Rules are tried in
//! a fixed order and the first one that matches wins:
//!
//! 1. **exact** (score 1.0): equal after normalization, or equal with a
//!    two-token first/last swap
//! 2. **wordset** (score 0.95): same multiset of tokens, at least two of them
//! 3. **fuzzy** (score = similarity): normalized Levenshtein similarity above
//!    0.85 in the forward or name-swapped ordering, both names longer than
//!    5 characters
//! 4. **none** (score 0.0)
//!
//! Small threshold changes silently change who gets matched; the constants
//! below are load-bearing.

use serde::Serialize;
use std::fmt;

/// Similarity a fuzzy match must exceed
pub const FUZZY_THRESHOLD: f64 = 0.85;

/// Both normalized names must be longer than this for a fuzzy match
pub const FUZZY_MIN_LEN: usize = 5;

/// Score reported for a word-set match
pub const WORDSET_SCORE: f64 = 0.95;

/// Match classification, ordered weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    None,
    Fuzzy,
    #[serde(rename = "wordset")]
    WordSet,
    Exact,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchKind::None => "none",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::WordSet => "wordset",
            MatchKind::Exact => "exact",
        };
        f.write_str(name)
    }
}

/// Result of comparing two names
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NameMatch {
    pub kind: MatchKind,
    pub score: f64,
}

impl NameMatch {
    const NONE: NameMatch = NameMatch {
        kind: MatchKind::None,
        score: 0.0,
    };

    pub fn is_match(&self) -> bool {
        self.kind != MatchKind::None
    }
}

/// Lowercase, trim, collapse internal whitespace
pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Move the last token to the front ("first last" -> "last first")
fn swap_order(tokens: &[&str]) -> String {
    match tokens.split_last() {
        Some((last, rest)) if !rest.is_empty() => {
            let mut out = String::from(*last);
            for token in rest {
                out.push(' ');
                out.push_str(token);
            }
            out
        }
        _ => tokens.join(" "),
    }
}

/// Normalized Levenshtein similarity: `(maxLen - distance) / maxLen`
fn similarity(a: &str, b: &str, max_len: usize) -> f64 {
    let distance = strsim::levenshtein(a, b);
    (max_len.saturating_sub(distance)) as f64 / max_len as f64
}

/// Compare two free-text names
///
/// # Examples
///
/// ```
/// use ibsync_engine::matcher::{match_names, MatchKind};
///
/// assert_eq!(match_names("Jan Peeters", "Peeters Jan").kind, MatchKind::Exact);
/// assert_eq!(match_names("Jan", "Jon").kind, MatchKind::None);
/// ```
pub fn match_names(a: &str, b: &str) -> NameMatch {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return NameMatch::NONE;
    }

    let ta: Vec<&str> = na.split(' ').collect();
    let tb: Vec<&str> = nb.split(' ').collect();

    // Exact, including a two-token transposition
    let transposed = ta.len() == 2 && tb.len() == 2 && ta[0] == tb[1] && ta[1] == tb[0];
    if na == nb || transposed {
        return NameMatch {
            kind: MatchKind::Exact,
            score: 1.0,
        };
    }

    // Bijective token match, order ignored
    if ta.len() >= 2 && ta.len() == tb.len() {
        let mut sa = ta.clone();
        let mut sb = tb.clone();
        sa.sort_unstable();
        sb.sort_unstable();
        if sa == sb {
            return NameMatch {
                kind: MatchKind::WordSet,
                score: WORDSET_SCORE,
            };
        }
    }

    // Fuzzy, guarded against short names
    let la = na.chars().count();
    let lb = nb.chars().count();
    if la > FUZZY_MIN_LEN && lb > FUZZY_MIN_LEN {
        let max_len = la.max(lb);
        let forward = similarity(&na, &nb, max_len);
        let swapped = similarity(&na, &swap_order(&tb), max_len);
        let best = forward.max(swapped);
        if best > FUZZY_THRESHOLD {
            return NameMatch {
                kind: MatchKind::Fuzzy,
                score: best,
            };
        }
    }

    NameMatch::NONE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_ignores_case_and_spacing() {
        let m = match_names("Jan Peeters", "  jan   peeters ");
        assert_eq!(m.kind, MatchKind::Exact);
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn test_exact_two_token_swap() {
        let m = match_names("Jan Peeters", "Peeters Jan");
        assert_eq!(m.kind, MatchKind::Exact);
    }

    #[test]
    fn test_three_token_permutation_is_wordset() {
        let m = match_names("Mohammed Al Rashid", "Al Rashid Mohammed");
        assert_eq!(m.kind, MatchKind::WordSet);
        assert_eq!(m.score, WORDSET_SCORE);
    }

    #[test]
    fn test_wordset_requires_all_tokens_consumed() {
        // Subset of tokens is not a bijection
        let m = match_names("Amina Yusuf", "Amina Yusuf Hassan");
        assert_ne!(m.kind, MatchKind::WordSet);
    }

    #[test]
    fn test_single_shared_first_name_is_not_a_match() {
        let m = match_names("Amina", "Amina Yusuf");
        assert_eq!(m.kind, MatchKind::None);
    }

    #[test]
    fn test_fuzzy_spelling_variation() {
        let m = match_names("Mohammed Al-Rashid", "Mohamed Al Rashid");
        assert_eq!(m.kind, MatchKind::Fuzzy);
        assert!(m.score > FUZZY_THRESHOLD, "score was {}", m.score);
        assert!(m.score < 1.0);
    }

    #[test]
    fn test_fuzzy_considers_swapped_order() {
        // One typo, names typed last-first
        let m = match_names("Peeters Janneke", "Janneke Peters");
        assert_eq!(m.kind, MatchKind::Fuzzy);
    }

    #[test]
    fn test_short_names_never_fuzzy() {
        assert_eq!(match_names("Jan", "Jon").kind, MatchKind::None);
        assert_eq!(match_names("Kris B", "Kris C").kind, MatchKind::None);
    }

    #[test]
    fn test_unrelated_names() {
        let m = match_names("Amina Yusuf", "Torben Janssens");
        assert_eq!(m, NameMatch::NONE);
    }

    #[test]
    fn test_empty_input_never_matches() {
        assert_eq!(match_names("", "").kind, MatchKind::None);
        assert_eq!(match_names("   ", "Jan Peeters").kind, MatchKind::None);
    }

    #[test]
    fn test_kind_ordering_reflects_strength() {
        assert!(MatchKind::Exact > MatchKind::WordSet);
        assert!(MatchKind::WordSet > MatchKind::Fuzzy);
        assert!(MatchKind::Fuzzy > MatchKind::None);
    }

    #[test]
    fn test_swap_order_moves_last_token_first() {
        assert_eq!(swap_order(&["a", "b", "c"]), "c a b");
        assert_eq!(swap_order(&["solo"]), "solo");
    }
}
