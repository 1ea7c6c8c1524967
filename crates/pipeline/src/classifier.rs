//! Response classification: artifact, conversational prose, or nothing usable.

use docforge_core::{ArtifactGrammar, Classification, grammar::HedgingScan};

/// The classifier's verdict plus the evidence behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub classification: Classification,
    /// Byte offset of the first start marker, when one was found
    pub start_offset: Option<usize>,
    pub hedging: HedgingScan,
}

impl Classified {
    /// A short, human-readable explanation for non-artifact replies.
    pub fn describe(&self) -> String {
        match self.classification {
            Classification::Artifact => "reply contains an artifact".into(),
            Classification::Conversational => format!(
                "reply is conversational ({} hedging phrase(s), {} in the opening)",
                self.hedging.total, self.hedging.early
            ),
            Classification::Empty => "reply contains no artifact markers".into(),
        }
    }
}

/// Labels accumulated text using an [`ArtifactGrammar`].
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    grammar: ArtifactGrammar,
}

impl ResponseClassifier {
    pub fn new(grammar: ArtifactGrammar) -> Self {
        Self { grammar }
    }

    /// A start marker anywhere wins over hedging, even hedging that comes first.
    pub fn classify(&self, text: &str) -> Classified {
        let hedging = self.grammar.scan_hedging(text);

        if let Some(offset) = self.grammar.find_start(text) {
            return Classified {
                classification: Classification::Artifact,
                start_offset: Some(offset),
                hedging,
            };
        }

        let classification = if hedging.total > 0 {
            Classification::Conversational
        } else {
            Classification::Empty
        };
        Classified {
            classification,
            start_offset: None,
            hedging,
        }
    }
}
