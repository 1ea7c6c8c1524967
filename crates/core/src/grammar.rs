//! Artifact grammar: the pluggable description of the target document format.
//!
//! Classification and extraction never hardcode markup: they ask the grammar
//! where an artifact starts and ends, which lines are provider-added fences,
//! and which phrases signal a conversational reply. Swapping the grammar
//! retargets the whole pipeline to another document format.

use serde::{Deserialize, Serialize};

/// Markers and phrase lists describing one document format.
///
/// All marker and phrase matching is ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactGrammar {
    /// Tokens that open an artifact, e.g. `<!DOCTYPE html`
    pub start_markers: Vec<String>,

    /// Tokens that close an artifact, e.g. `</html>`
    pub end_markers: Vec<String>,

    /// Provider-added wrappers, e.g. a triple backtick with an optional language tag
    pub fence_tokens: Vec<String>,

    /// Phrases that signal prose instead of an artifact
    pub hedging_phrases: Vec<String>,

    /// Substrings that indicate structural syntax on a line
    pub delimiters: Vec<String>,

    /// How many leading characters count as the "opening" of a reply
    #[serde(default = "default_hedging_window")]
    pub hedging_window: usize,
}

fn default_hedging_window() -> usize {
    500
}

/// Where hedging phrases were found in a reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HedgingScan {
    /// Matches inside the hedging window
    pub early: usize,
    /// Matches anywhere in the text
    pub total: usize,
}

impl ArtifactGrammar {
    /// Grammar for complete HTML documents.
    pub fn html() -> Self {
        Self {
            start_markers: vec!["<!doctype html".into(), "<html".into()],
            end_markers: vec!["</html>".into()],
            fence_tokens: vec!["```".into(), "~~~".into()],
            hedging_phrases: [
                "could you clarify",
                "could you please clarify",
                "can you clarify",
                "could you provide more",
                "i need more information",
                "before i proceed",
                "would you like me to",
                "i'm sorry",
                "i am sorry",
                "i apologize",
                "unfortunately, i",
                "i cannot",
                "i can't",
                "i'd be happy to help",
                "here is a summary of",
                "here's a summary of",
                "summary of changes",
                "i've made the following changes",
                "i have made the following changes",
                "let me know if",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            delimiters: vec!["<".into(), ">".into()],
            hedging_window: default_hedging_window(),
        }
    }

    /// Byte offset of the earliest start marker anywhere in `text`.
    pub fn find_start(&self, text: &str) -> Option<usize> {
        let haystack = text.to_ascii_lowercase();
        self.start_markers
            .iter()
            .filter_map(|m| haystack.find(&m.to_ascii_lowercase()))
            .min()
    }

    /// Byte offset just past the last end marker in `text`.
    pub fn find_last_end(&self, text: &str) -> Option<usize> {
        let haystack = text.to_ascii_lowercase();
        self.end_markers
            .iter()
            .filter_map(|m| {
                let needle = m.to_ascii_lowercase();
                haystack.rfind(&needle).map(|pos| pos + needle.len())
            })
            .max()
    }

    pub fn has_end_marker(&self, text: &str) -> bool {
        self.find_last_end(text).is_some()
    }

    /// Whether the line carries any structural syntax of the target format.
    pub fn has_structural_syntax(&self, line: &str) -> bool {
        self.delimiters.iter().any(|d| line.contains(d.as_str()))
    }

    /// Whether a line is nothing but a fence token plus an optional language tag.
    ///
    /// A line that also carries structural syntax is never a fence.
    pub fn is_fence_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() || self.has_structural_syntax(trimmed) {
            return false;
        }
        self.fence_tokens.iter().any(|token| {
            trimmed.strip_prefix(token.as_str()).is_some_and(|rest| {
                rest.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+')
            })
        })
    }

    /// Count hedging phrases in the opening window and in the whole text.
    pub fn scan_hedging(&self, text: &str) -> HedgingScan {
        let haystack = text.to_ascii_lowercase();
        let window_end = haystack
            .char_indices()
            .nth(self.hedging_window)
            .map_or(haystack.len(), |(i, _)| i);
        let opening = &haystack[..window_end];

        let mut scan = HedgingScan::default();
        for phrase in &self.hedging_phrases {
            let needle = phrase.to_ascii_lowercase();
            if needle.is_empty() {
                continue;
            }
            if opening.contains(&needle) {
                scan.early += 1;
            }
            scan.total += haystack.matches(&needle).count();
        }
        scan
    }
}

impl Default for ArtifactGrammar {
    fn default() -> Self {
        Self::html()
    }
}
