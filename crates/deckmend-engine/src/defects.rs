//! Defect detection for stored and generated notes.
//!
//! Each check is independent; a note may carry several tags at once.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::markup::has_markup;
use crate::rules::RuleSet;
use crate::text::{has_terminal_punctuation, sentence_spans, word_count};

/// A detected quality problem.
///
/// Variants are declared in repair order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectTag {
    EmbeddedMarkup,
    FigureReference,
    GrammarDefect,
    CorruptedFragment,
    PlaceholderText,
    IncompleteAnswer,
    MissingPunctuation,
}

impl DefectTag {
    pub fn as_str(self) -> &'static str {
        match self {
            DefectTag::EmbeddedMarkup => "embedded_markup",
            DefectTag::FigureReference => "figure_reference",
            DefectTag::GrammarDefect => "grammar_defect",
            DefectTag::CorruptedFragment => "corrupted_fragment",
            DefectTag::PlaceholderText => "placeholder_text",
            DefectTag::IncompleteAnswer => "incomplete_answer",
            DefectTag::MissingPunctuation => "missing_punctuation",
        }
    }
}

impl fmt::Display for DefectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static FIGURE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfig(?:ure|s?\.)?\s*\d+\s*[-.–]\s*\d+").unwrap());

// Page-index and OCR noise: "12, 45, 78", "318f Neurons", ", 378 Tower", "test, 59"
static CORRUPTION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r",\s*\d+,\s*\d+,\s*\d+",
        r"\d+f\s+\w+",
        r",\s*\d+\s*[A-Z][a-z]+",
        r"\d+,\s*\d+\s*[A-Z]",
        r"(?i)\btest,\s*\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DANGLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(?:is|are)\s").unwrap());

static CLOZE_DELETION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{c[1-9]\d*::[^}]*\S[^}]*\}\}").unwrap());

pub fn has_figure_reference(text: &str) -> bool {
    FIGURE_REF.is_match(text)
}

/// Drop every sentence that cites a figure; the other sentences are kept verbatim.
pub fn remove_figure_references(text: &str) -> String {
    sentence_spans(text)
        .into_iter()
        .filter(|sentence| !FIGURE_REF.is_match(sentence))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn is_corrupted(answer: &str) -> bool {
    CORRUPTION.iter().any(|re| re.is_match(answer))
}

/// Whether the answer starts with a bare `is`/`are`.
pub fn is_dangling(answer: &str) -> bool {
    DANGLING.is_match(answer.trim_start())
}

/// Whether a field is empty, holds a known placeholder phrase, or holds the
/// generic fallback answer.
pub fn is_placeholder(text: &str, rules: &RuleSet) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == rules.canned.fallback {
        return true;
    }
    let lower = trimmed.to_lowercase();
    rules.placeholders.iter().any(|p| lower.contains(p.as_str()))
}

pub fn is_incomplete(question: &str, answer: &str, rules: &RuleSet) -> bool {
    word_count(answer) < rules.min_answer_words
        || is_dangling(answer)
        || rules.incomplete_rule(question, answer).is_some()
}

/// Whether `text` holds at least one non-empty `{{cN::...}}` deletion.
pub fn has_cloze_deletion(text: &str) -> bool {
    CLOZE_DELETION.is_match(text)
}

/// Checks for the `Text` field of a cloze note.
///
/// A text without a usable deletion produces no card, which is reported as
/// placeholder content. Other fields of a cloze note are free-form.
pub fn detect_cloze(text: &str) -> Vec<DefectTag> {
    let mut tags = Vec::new();
    if has_markup(text) {
        tags.push(DefectTag::EmbeddedMarkup);
    }
    if !has_cloze_deletion(text) {
        tags.push(DefectTag::PlaceholderText);
    }
    tags
}

/// Run every check on a question/answer pair.
///
/// Tags come back in repair order.
pub fn detect(question: &str, answer: &str, rules: &RuleSet) -> Vec<DefectTag> {
    let mut tags = Vec::new();
    if has_markup(question) || has_markup(answer) {
        tags.push(DefectTag::EmbeddedMarkup);
    }
    if has_figure_reference(question) || has_figure_reference(answer) {
        tags.push(DefectTag::FigureReference);
    }
    if rules.grammar_match(question).is_some() {
        tags.push(DefectTag::GrammarDefect);
    }
    if is_corrupted(answer) {
        tags.push(DefectTag::CorruptedFragment);
    }
    if question.trim().is_empty() || is_placeholder(answer, rules) {
        tags.push(DefectTag::PlaceholderText);
    }
    if is_incomplete(question, answer, rules) {
        tags.push(DefectTag::IncompleteAnswer);
    }
    let missing = |text: &str| !text.trim().is_empty() && !has_terminal_punctuation(text);
    if missing(question) || missing(answer) {
        tags.push(DefectTag::MissingPunctuation);
    }
    tags
}
