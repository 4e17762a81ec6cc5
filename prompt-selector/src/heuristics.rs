//! Deterministic review-quality signals.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref BULLET_RE: Regex = Regex::new(r"(?m)^\s*(?:[-*•]|\d+[.)])\s+\S").unwrap();
    static ref SUMMARY_RE: Regex = Regex::new(r"(?i)\b(?:summary|overview|tl;dr)\b").unwrap();
    static ref ISSUES_RE: Regex =
        Regex::new(r"(?i)\b(?:issues?|bugs?|problems?|concerns?|risks?)\b").unwrap();
    static ref SUGGESTIONS_RE: Regex =
        Regex::new(r"(?i)\b(?:suggestions?|recommendations?|improvements?|fix(?:es)?)\b").unwrap();
    static ref BUG_RE: Regex =
        Regex::new(r"(?i)\b(?:bugs?|defects?|crash(?:es)?|errors?|exceptions?|null pointer)\b")
            .unwrap();
    static ref SUGGEST_RE: Regex =
        Regex::new(r"(?i)\b(?:suggest\w*|recommend\w*|consider|should)\b").unwrap();
}

/// Structure and content signals of one review text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeuristicMetrics {
    pub has_summary: bool,
    pub has_issues: bool,
    pub has_suggestions: bool,
    pub bullet_points: usize,
    pub length_words: usize,
    pub mentions_bug: bool,
    pub mentions_suggest: bool,
}

impl HeuristicMetrics {
    /// How many of the three expected sections are present.
    pub fn sections_present(&self) -> usize {
        [self.has_summary, self.has_issues, self.has_suggestions]
            .into_iter()
            .filter(|b| *b)
            .count()
    }
}

/// Pure and total: any text yields metrics.
pub fn heuristic_metrics(review: &str) -> HeuristicMetrics {
    HeuristicMetrics {
        has_summary: SUMMARY_RE.is_match(review),
        has_issues: ISSUES_RE.is_match(review),
        has_suggestions: SUGGESTIONS_RE.is_match(review),
        bullet_points: BULLET_RE.find_iter(review).count(),
        length_words: review.split_whitespace().count(),
        mentions_bug: BUG_RE.is_match(review),
        mentions_suggest: SUGGEST_RE.is_match(review),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_review() {
        let review = "## Summary\nAdds caching.\n\n\
                      ## Issues\n- Possible null pointer bug in `load`\n\
                      - Missing error handling\n\n\
                      ## Suggestions\n1. Add a unit test\n2) Consider a bounded cache";
        let m = heuristic_metrics(review);
        assert!(m.has_summary && m.has_issues && m.has_suggestions);
        assert_eq!(m.sections_present(), 3);
        assert_eq!(m.bullet_points, 4);
        assert!(m.mentions_bug);
        assert!(m.mentions_suggest);
    }

    #[test]
    fn empty_review() {
        let m = heuristic_metrics("");
        assert_eq!(m, HeuristicMetrics::default());
    }

    #[test]
    fn words_are_whitespace_separated() {
        assert_eq!(heuristic_metrics("one  two\nthree\tfour").length_words, 4);
    }
}
