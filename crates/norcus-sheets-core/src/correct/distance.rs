//! Q-gram string distance

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Q-gram distance (Ukkonen): the L1 distance between the q-gram profiles
/// of two strings.
///
/// Runs of whitespace count as a single space. Identical strings are at
/// distance 0; strings shorter than `q` have an empty profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QGram {
    q: usize,
}

impl Default for QGram {
    fn default() -> Self {
        Self::new(2)
    }
}

impl QGram {
    /// Shingle length `q`, at least 1
    pub fn new(q: usize) -> Self {
        Self { q: q.max(1) }
    }

    pub fn distance(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 0.0;
        }
        let profile_a = self.profile(a);
        let profile_b = self.profile(b);

        let mut sum = 0usize;
        for (shingle, &count_a) in &profile_a {
            let count_b = profile_b.get(shingle).copied().unwrap_or(0);
            sum += count_a.abs_diff(count_b);
        }
        for (shingle, &count_b) in &profile_b {
            if !profile_a.contains_key(shingle) {
                sum += count_b;
            }
        }
        sum as f64
    }

    fn profile(&self, s: &str) -> HashMap<String, usize> {
        let collapsed = whitespace().replace_all(s, " ");
        let chars: Vec<char> = collapsed.chars().collect();
        let mut profile = HashMap::new();
        for window in chars.windows(self.q) {
            *profile.entry(window.iter().collect()).or_insert(0) += 1;
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        let qgram = QGram::default();
        assert_eq!(qgram.distance("Song", "Song"), 0.0);
        assert_eq!(qgram.distance("", ""), 0.0);
    }

    #[test]
    fn test_distance_values() {
        let qgram = QGram::default();
        assert_eq!(qgram.distance("Songg", "Song"), 1.0);
        assert_eq!(qgram.distance("Songg", "Other"), 8.0);
        assert_eq!(qgram.distance("ABCD", "ABCE"), 2.0);
    }

    #[test]
    fn test_symmetric() {
        let qgram = QGram::default();
        for (a, b) in [("Bad Name", "Good Name"), ("x", "xyz"), ("", "Song")] {
            assert_eq!(qgram.distance(a, b), qgram.distance(b, a));
        }
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        let qgram = QGram::default();
        assert_eq!(qgram.distance("Good  Name", "Good Name"), 0.0);
        assert_eq!(qgram.distance("Good\tName", "Good Name"), 0.0);
    }

    #[test]
    fn test_short_strings() {
        let qgram = QGram::default();
        // No bigrams on either side
        assert_eq!(qgram.distance("a", "b"), 0.0);
        assert_eq!(qgram.distance("a", "ab"), 1.0);
    }
}
