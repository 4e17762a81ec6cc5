//! Built-in review prompt templates.
//!
//! Every template shares one core (role, diff, static analysis, review
//! criteria) and adds its own reasoning instructions. Order matters: it is the
//! arm order of the selector and is persisted with its state.

use crate::errors::{Error, SelectorResult};

/// Diff and static-analysis text are cut to this many characters.
pub const MAX_SECTION_CHARS: usize = 4000;

/// Stand-in for the static-analysis slot when no analyzer output exists.
pub const STATIC_UNAVAILABLE: &str = "Static analysis not available for this diff.";

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub name: String,
    pub system: String,
    /// Strategy-specific instructions appended after the shared core.
    pub instructions: String,
}

/// System + user messages ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn new(
        name: impl Into<String>,
        system: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            system: system.into(),
            instructions: instructions.into(),
        }
    }

    pub fn render(&self, diff: &str, static_analysis: &str) -> RenderedPrompt {
        let (diff, diff_cut) = truncate_chars(diff, MAX_SECTION_CHARS);
        let (stat, stat_cut) = truncate_chars(static_analysis, MAX_SECTION_CHARS);

        let mut s = String::new();
        s.push_str(
            "You are reviewing a GitHub pull request. Write a professional, structured review.\n",
        );
        s.push_str("Cover correctness, security, maintainability and readability.\n");
        s.push_str("Make every suggestion actionable and reference files/lines where possible.\n");
        s.push_str("\n# Diff\n```diff\n");
        s.push_str(diff);
        if diff_cut {
            s.push_str("\n[... diff truncated ...]");
        }
        s.push_str("\n```\n");
        s.push_str("\n# Static analysis\n```\n");
        s.push_str(stat);
        if stat_cut {
            s.push_str("\n[... static analysis truncated ...]");
        }
        s.push_str("\n```\n");
        s.push_str("\n# Instructions\n");
        s.push_str(&self.instructions);
        s.push('\n');

        RenderedPrompt {
            system: self.system.clone(),
            user: s,
        }
    }
}

/// Cuts `s` to at most `max` chars on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> (&str, bool) {
    match s.char_indices().nth(max) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptRegistry {
    templates: Vec<PromptTemplate>,
}

const REVIEWER: &str =
    "You are a senior software engineer doing code review. Be precise, constructive and concise.";

impl PromptRegistry {
    /// The seven built-in strategies, in selector arm order.
    pub fn builtin() -> Self {
        let templates = vec![
            PromptTemplate::new(
                "Zero-shot",
                REVIEWER,
                "- Review the diff directly.\n- List the problems you find, then concrete fixes.",
            ),
            PromptTemplate::new(
                "Few-shot",
                REVIEWER,
                "Follow the style of these examples:\n\
                 Example 1: \"`db.rs` line 42: the query is built with string concatenation; \
                 use a bound parameter to avoid SQL injection.\"\n\
                 Example 2: \"`handler.rs`: `unwrap()` on user input will panic on malformed \
                 requests; return a 400 instead.\"\n\
                 Then review the diff above in the same way.",
            ),
            PromptTemplate::new(
                "Chain-of-Thought",
                REVIEWER,
                "Reason step by step:\n\
                 1. Summarize what the change is trying to do.\n\
                 2. Walk through the modified code and check its logic.\n\
                 3. Look for edge cases, error handling gaps and security issues.\n\
                 4. Conclude with a prioritized list of findings and fixes.",
            ),
            PromptTemplate::new(
                "Tree-of-Thought",
                REVIEWER,
                "Explore the change along separate branches before concluding:\n\
                 A. Correctness and edge cases.\n\
                 B. Security and input handling.\n\
                 C. Performance and resource use.\n\
                 D. Design, naming and maintainability.\n\
                 Evaluate each branch, drop weak findings, \
                 and merge the strong ones into one review.",
            ),
            PromptTemplate::new(
                "Self-Consistency",
                REVIEWER,
                "Draft three independent reviews (A, B, C) of the diff.\n\
                 Keep only the findings that at least two drafts agree on.\n\
                 Output the final consolidated review, not the drafts.",
            ),
            PromptTemplate::new(
                "Reflection",
                REVIEWER,
                "First write an initial review.\n\
                 Then critique it: what is wrong, vague or missing?\n\
                 Finally output a refined review that fixes those weaknesses.",
            ),
            PromptTemplate::new(
                "Meta",
                "You are a staff engineer and review coach. \
                 Produce a review a maintainer can act on immediately.",
                "Structure the review with these sections:\n\
                 ## Summary\n\
                 ## Critical Bugs\n\
                 ## Important Improvements\n\
                 ## Code Quality\n\
                 ## Tests & CI\n\
                 ## Positive notes\n\
                 Use bullet points; write \"None\" for an empty section.",
            ),
        ];
        Self { templates }
    }

    /// # Errors
    /// [`Error::Validation`] on an empty list or duplicate names.
    pub fn from_templates(templates: Vec<PromptTemplate>) -> SelectorResult<Self> {
        if templates.is_empty() {
            return Err(Error::Validation("prompt registry is empty".into()));
        }
        for (i, t) in templates.iter().enumerate() {
            if templates[..i].iter().any(|o| o.name == t.name) {
                return Err(Error::Validation(format!("duplicate prompt `{}`", t.name)));
            }
        }
        Ok(Self { templates })
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_is_fixed() {
        assert_eq!(
            PromptRegistry::builtin().names(),
            vec![
                "Zero-shot",
                "Few-shot",
                "Chain-of-Thought",
                "Tree-of-Thought",
                "Self-Consistency",
                "Reflection",
                "Meta"
            ]
        );
    }

    #[test]
    fn render_fills_both_slots() {
        let reg = PromptRegistry::builtin();
        let p = reg.get("Meta").unwrap().render("+fn a() {}", STATIC_UNAVAILABLE);
        assert!(p.user.contains("+fn a() {}"));
        assert!(p.user.contains(STATIC_UNAVAILABLE));
        assert!(p.user.contains("## Critical Bugs"));
        assert!(!p.system.is_empty());
    }

    #[test]
    fn long_diff_is_truncated_on_char_boundary() {
        let diff = "é".repeat(MAX_SECTION_CHARS + 10);
        let p = PromptRegistry::builtin().get("Zero-shot").unwrap().render(&diff, "");
        assert!(p.user.contains("[... diff truncated ...]"));
        assert!(!p.user.contains(&"é".repeat(MAX_SECTION_CHARS + 1)));
        assert!(p.user.contains(&"é".repeat(MAX_SECTION_CHARS)));
    }

    #[test]
    fn truncate_chars_is_noop_for_short_text() {
        assert_eq!(truncate_chars("abc", 3), ("abc", false));
        assert_eq!(truncate_chars("abcd", 3), ("abc", true));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let t = PromptTemplate::new("X", "s", "i");
        assert!(PromptRegistry::from_templates(vec![t.clone(), t]).is_err());
        assert!(PromptRegistry::from_templates(vec![]).is_err());
    }
}
