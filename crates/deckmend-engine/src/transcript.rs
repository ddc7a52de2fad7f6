//! Quality signals for lecture transcripts.
//!
//! Machine transcripts carry timestamps, filler words, and misheard terms.
//! [`TranscriptStats::measure`] counts those signals so a reader can tell
//! which transcripts need checking against the recording before their cards
//! are trusted.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?\b").unwrap());
static FILLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:um+|uh+|like|you know)\b").unwrap());
static ALL_CAPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{2,}\b").unwrap());
static UNCLEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\?{3,}").unwrap());

/// Counts of transcription quality signals in one text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptStats {
    /// `12:34` or `1:02:03` markers.
    pub timestamps: usize,
    /// `um`, `uh`, `like`, `you know`.
    pub filler_words: usize,
    /// Words in capitals, often misheard names or acronyms.
    pub all_caps_words: usize,
    /// Runs of `???` left where the transcriber gave up.
    pub unclear_marks: usize,
    /// Technical terms present, in vocabulary order; worth verifying by ear.
    pub technical_terms: Vec<String>,
}

impl TranscriptStats {
    /// Measure `text` against the `technical` vocabulary (whole words, any case).
    pub fn measure(text: &str, technical: &[String]) -> Self {
        let technical_terms = technical
            .iter()
            .filter(|term| {
                Regex::new(&format!(r"(?i)\b{}\b", regex_lite::escape(term)))
                    .is_ok_and(|re| re.is_match(text))
            })
            .cloned()
            .collect();
        Self {
            timestamps: TIMESTAMP.find_iter(text).count(),
            filler_words: FILLER.find_iter(text).count(),
            all_caps_words: ALL_CAPS.find_iter(text).count(),
            unclear_marks: UNCLEAR.find_iter(text).count(),
            technical_terms,
        }
    }

    /// Whether the text shows the marks of spoken-word transcription.
    pub fn is_transcript(&self) -> bool {
        self.timestamps > 0 || self.filler_words > 0
    }
}
