//! Candidate extraction from raw model responses.
//!
//! Models follow output-format instructions inconsistently, so extraction
//! is a fixed-priority chain of match strategies:
//! 1. Body sentinels (`<<<PYBODY>>> ... <<<END>>>`)
//! 2. Full-module sentinels (`<<<PY>>> ... <<<END>>>`)
//! 3. Fenced code block (```` ```python ... ``` ````)
//! 4. The whole response text
//!
//! Extraction always yields a candidate, possibly empty. Reasoning markup
//! (`<think>...</think>`) should be removed with [`strip_meta`] first.
//!
//! # Example
//!
//! ```
//! use fix_forge::extraction::{extract_candidate, strip_meta};
//!
//! let raw = "<think>off by one</think>\n<<<PYBODY>>>\n    return n + 1\n<<<END>>>";
//! let candidate = extract_candidate(&strip_meta(raw));
//! assert_eq!(candidate.code, "return n + 1");
//! assert!(!candidate.is_full_module);
//! ```

pub mod strategies;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use strategies::{DelimitedBlock, MatchStrategy, ModulePolicy, WholeText};

use crate::assembler::is_full_module;
use crate::utils::{dedent, strip_newlines};

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?</think>").expect("think block regex is valid")
});

/// A code payload extracted from a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Dedented code text with surrounding blank lines removed.
    pub code: String,
    /// Whether the code is already a complete module rather than a bare body.
    pub is_full_module: bool,
    /// Name of the strategy that produced the candidate.
    pub strategy: String,
}

impl Candidate {
    /// Returns true when there is no code to assemble.
    pub fn is_empty(&self) -> bool {
        self.code.trim().is_empty()
    }
}

/// Removes reasoning traces and trims the response.
pub fn strip_meta(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").trim().to_string()
}

/// Ordered chain of match strategies.
pub struct CandidateExtractor {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl std::fmt::Debug for CandidateExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateExtractor")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DelimitedBlock::body_sentinels()),
            Box::new(DelimitedBlock::module_sentinels()),
            Box::new(DelimitedBlock::fenced()),
            Box::new(WholeText),
        ])
    }
}

impl CandidateExtractor {
    /// Creates an extractor that tries `strategies` in order.
    pub fn new(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the configured strategies in priority order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extracts the highest-priority candidate from `text`.
    ///
    /// Falls back to the whole text when no configured strategy matches.
    pub fn extract(&self, text: &str) -> Candidate {
        for strategy in &self.strategies {
            if let Some(captured) = strategy.attempt_match(text) {
                return build_candidate(&captured, strategy.module_policy(), strategy.name());
            }
        }
        build_candidate(text, WholeText.module_policy(), WholeText.name())
    }
}

fn build_candidate(captured: &str, policy: ModulePolicy, strategy: &str) -> Candidate {
    let dedented = dedent(captured);
    let code = strip_newlines(&dedented).to_string();
    let is_full_module = match policy {
        ModulePolicy::Always => true,
        ModulePolicy::Detect => is_full_module(&code),
    };
    Candidate {
        code,
        is_full_module,
        strategy: strategy.to_string(),
    }
}

/// Extracts a candidate with the default strategy chain.
pub fn extract_candidate(text: &str) -> Candidate {
    static DEFAULT: LazyLock<CandidateExtractor> = LazyLock::new(CandidateExtractor::default);
    DEFAULT.extract(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_meta_removes_think_blocks() {
        let raw = "<THINK>\nmulti\nline\n</think>  answer <think>x</think>\n";
        assert_eq!(strip_meta(raw), "answer");
    }

    #[test]
    fn test_strip_meta_without_markup_trims() {
        assert_eq!(strip_meta("  \n return 1 \n"), "return 1");
    }

    #[test]
    fn test_body_block_extracted_and_dedented() {
        let raw = "Here:\n<<<PYBODY>>>\n    if n <= 1:\n        return n\n    return n * 2\n<<<END>>>\nDone";
        let candidate = extract_candidate(raw);
        assert_eq!(candidate.code, "if n <= 1:\n    return n\nreturn n * 2");
        assert!(!candidate.is_full_module);
        assert_eq!(candidate.strategy, "body_sentinels");
    }

    #[test]
    fn test_body_block_with_full_module_inside() {
        let raw = "<<<PYBODY>>>\ndef add(a, b):\n    return a + b\n<<<END>>>";
        let candidate = extract_candidate(raw);
        assert!(candidate.is_full_module);
        assert_eq!(candidate.code, "def add(a, b):\n    return a + b");
    }

    #[test]
    fn test_sentinels_tolerate_spacing_and_case() {
        let raw = "<<< pybody >>>  \nreturn 1\n  <<< end >>>";
        let candidate = extract_candidate(raw);
        assert_eq!(candidate.code, "return 1");
        assert_eq!(candidate.strategy, "body_sentinels");
    }

    #[test]
    fn test_module_block_always_full_module() {
        let raw = "<<<PY>>>\nx = 1\n<<<END>>>";
        let candidate = extract_candidate(raw);
        assert_eq!(candidate.code, "x = 1");
        assert!(candidate.is_full_module);
        assert_eq!(candidate.strategy, "module_sentinels");
    }

    #[test]
    fn test_body_block_wins_over_fenced_block() {
        let raw = "```python\nreturn 0\n```\n<<<PYBODY>>>\nreturn a + b\n<<<END>>>";
        let candidate = extract_candidate(raw);
        assert_eq!(candidate.code, "return a + b");
    }

    #[test]
    fn test_body_block_wins_over_module_block() {
        let raw = "<<<PY>>>\nimport os\n<<<END>>>\n<<<PYBODY>>>\nreturn 2\n<<<END>>>";
        assert_eq!(extract_candidate(raw).code, "return 2");
    }

    #[test]
    fn test_fenced_block_detects_module() {
        let body = extract_candidate("Fix:\n```python\n    return a + b\n```");
        assert_eq!(body.code, "return a + b");
        assert!(!body.is_full_module);

        let module = extract_candidate("```\nimport math\nx = math.pi\n```");
        assert!(module.is_full_module);
        assert_eq!(module.strategy, "fenced");
    }

    #[test]
    fn test_fallback_returns_trimmed_text() {
        let candidate = extract_candidate("I am not sure how to fix this.");
        assert_eq!(candidate.code, "I am not sure how to fix this.");
        assert!(!candidate.is_full_module);
        assert_eq!(candidate.strategy, "whole_text");
    }

    #[test]
    fn test_extract_is_idempotent_on_bare_code() {
        let first = extract_candidate("<<<PYBODY>>>\n    x = 1\n    return x\n<<<END>>>");
        let second = extract_candidate(&first.code);
        assert_eq!(second.code, first.code);
        assert_eq!(second.is_full_module, first.is_full_module);
    }

    #[test]
    fn test_empty_response_yields_empty_candidate() {
        let candidate = extract_candidate("");
        assert!(candidate.is_empty());
    }

    #[test]
    fn test_custom_chain_without_fallback_still_returns_text() {
        let extractor = CandidateExtractor::new(vec![Box::new(DelimitedBlock::module_sentinels())]);
        let candidate = extractor.extract("return 5");
        assert_eq!(candidate.code, "return 5");
        assert_eq!(candidate.strategy, "whole_text");
    }

    #[test]
    fn test_default_strategy_order() {
        assert_eq!(
            CandidateExtractor::default().strategy_names(),
            vec!["body_sentinels", "module_sentinels", "fenced", "whole_text"]
        );
    }
}
