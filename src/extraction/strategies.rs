//! Match strategies used by the candidate extractor.

use regex::Regex;

/// How a strategy decides whether its capture is a full module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulePolicy {
    /// The delimiter itself declares a full module.
    Always,
    /// Inspect the captured code for a leading top-level declaration.
    Detect,
}

/// A single extraction attempt over a model response.
pub trait MatchStrategy: Send + Sync {
    /// Stable identifier used in logs and candidate records.
    fn name(&self) -> &'static str;

    /// Returns the captured payload when the strategy applies to `text`.
    fn attempt_match(&self, text: &str) -> Option<String>;

    /// Full-module policy applied to this strategy's captures.
    fn module_policy(&self) -> ModulePolicy {
        ModulePolicy::Detect
    }
}

/// A regex-delimited block; the first capture group is the payload.
#[derive(Debug, Clone)]
pub struct DelimitedBlock {
    name: &'static str,
    pattern: Regex,
    policy: ModulePolicy,
}

impl DelimitedBlock {
    /// Creates a strategy from a pattern whose group 1 holds the payload.
    pub fn new(name: &'static str, pattern: Regex, policy: ModulePolicy) -> Self {
        Self {
            name,
            pattern,
            policy,
        }
    }

    /// `<<<PYBODY>>>` ... `<<<END>>>`, the format the system prompt asks for.
    pub fn body_sentinels() -> Self {
        Self::new(
            "body_sentinels",
            Regex::new(r"(?is)<<<\s*PYBODY\s*>>>[\t ]*\n(.*?)\n[\t ]*<<<\s*END\s*>>>")
                .expect("body sentinel regex is valid"),
            ModulePolicy::Detect,
        )
    }

    /// `<<<PY>>>` ... `<<<END>>>`, an explicitly complete module.
    pub fn module_sentinels() -> Self {
        Self::new(
            "module_sentinels",
            Regex::new(r"(?is)<<<\s*PY\s*>>>[\t ]*\n(.*?)\n[\t ]*<<<\s*END\s*>>>")
                .expect("module sentinel regex is valid"),
            ModulePolicy::Always,
        )
    }

    /// Markdown fence with an optional python language tag.
    pub fn fenced() -> Self {
        Self::new(
            "fenced",
            Regex::new(r"(?is)```(?:python3?|py)?[\t ]*\n(.*?)\n[\t ]*```")
                .expect("fenced block regex is valid"),
            ModulePolicy::Detect,
        )
    }
}

impl MatchStrategy for DelimitedBlock {
    fn name(&self) -> &'static str {
        self.name
    }

    fn attempt_match(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn module_policy(&self) -> ModulePolicy {
        self.policy
    }
}

/// Matches any text; the terminal fallback of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeText;

impl MatchStrategy for WholeText {
    fn name(&self) -> &'static str {
        "whole_text"
    }

    fn attempt_match(&self, text: &str) -> Option<String> {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_sentinels_require_own_lines() {
        let strategy = DelimitedBlock::body_sentinels();
        assert!(strategy.attempt_match("<<<PYBODY>>> return 1 <<<END>>>").is_none());
        assert_eq!(
            strategy.attempt_match("<<<PYBODY>>>\nreturn 1\n<<<END>>>"),
            Some("return 1".to_string())
        );
    }

    #[test]
    fn test_module_sentinels_do_not_match_body_sentinels() {
        let strategy = DelimitedBlock::module_sentinels();
        assert!(strategy.attempt_match("<<<PYBODY>>>\nreturn 1\n<<<END>>>").is_none());
    }

    #[test]
    fn test_body_sentinels_capture_first_block_lazily() {
        let strategy = DelimitedBlock::body_sentinels();
        let text = "<<<PYBODY>>>\na\n<<<END>>>\n<<<PYBODY>>>\nb\n<<<END>>>";
        assert_eq!(strategy.attempt_match(text), Some("a".to_string()));
    }

    #[test]
    fn test_fenced_accepts_language_tags() {
        let strategy = DelimitedBlock::fenced();
        for fence in ["```\nx\n```", "```python\nx\n```", "```py\nx\n```", "```Python3\nx\n```"] {
            assert_eq!(strategy.attempt_match(fence), Some("x".to_string()), "{fence}");
        }
        assert!(strategy.attempt_match("```rust\nx\n```").is_none());
    }

    #[test]
    fn test_module_policies() {
        assert_eq!(DelimitedBlock::module_sentinels().module_policy(), ModulePolicy::Always);
        assert_eq!(DelimitedBlock::body_sentinels().module_policy(), ModulePolicy::Detect);
        assert_eq!(WholeText.module_policy(), ModulePolicy::Detect);
    }

    #[test]
    fn test_whole_text_always_matches() {
        assert_eq!(WholeText.attempt_match(""), Some(String::new()));
    }
}
