//! Cloze deletion helpers.
//!
//! Cloze deletions use the format `{{c1::text}}`; a trailing `::hint` is
//! accepted when reading. Definition cards become cloze cards by hiding the
//! defined term inside its own definition.
//!
//! ```
//! use deckmend_builder::cloze::{cloze_from_definition, cloze_numbers};
//!
//! let text = cloze_from_definition(
//!     "dopamine",
//!     "Dopamine is a neurotransmitter that signals reward.",
//! )
//! .unwrap();
//! assert_eq!(text, "{{c1::Dopamine}} is a neurotransmitter that signals reward.");
//! assert_eq!(cloze_numbers(&text), vec![1]);
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;

/// Definitions this short read as a bare term swap, not a card.
const MIN_DEFINITION_WORDS: usize = 5;

static DELETION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{c(\d+)::(.*?)(?:::[^}]*)?\}\}").unwrap());

/// Create a cloze deletion with the given number.
pub fn cloze(number: u32, text: &str) -> String {
    format!("{{{{c{}::{}}}}}", number, text)
}

/// Hide the first case-insensitive occurrence of `term` in `definition`.
///
/// The deletion keeps the casing found in the definition. Returns `None`
/// when the definition has five words or fewer, or does not mention the term.
pub fn cloze_from_definition(term: &str, definition: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() || definition.split_whitespace().count() <= MIN_DEFINITION_WORDS {
        return None;
    }
    let pattern = Regex::new(&format!("(?i){}", regex_lite::escape(term))).ok()?;
    let found = pattern.find(definition)?;
    Some(format!(
        "{}{}{}",
        &definition[..found.start()],
        cloze(1, found.as_str()),
        &definition[found.end()..]
    ))
}

/// Distinct cloze numbers used in `text`, ascending.
pub fn cloze_numbers(text: &str) -> Vec<u32> {
    let mut numbers: Vec<u32> = DELETION
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

/// Why a cloze text would not produce a usable card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClozeIssue {
    NoDeletions,
    EmptyDeletion(u32),
    ZeroNumber,
    Unbalanced,
}

impl fmt::Display for ClozeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClozeIssue::NoDeletions => write!(f, "no cloze deletions"),
            ClozeIssue::EmptyDeletion(n) => write!(f, "cloze c{} hides nothing", n),
            ClozeIssue::ZeroNumber => write!(f, "cloze numbers start at c1"),
            ClozeIssue::Unbalanced => write!(f, "unbalanced cloze braces"),
        }
    }
}

/// Check a cloze text and return its card numbers.
pub fn validate_cloze(text: &str) -> Result<Vec<u32>, ClozeIssue> {
    if text.matches("{{").count() != text.matches("}}").count() {
        return Err(ClozeIssue::Unbalanced);
    }
    for caps in DELETION.captures_iter(text) {
        let number: u32 = caps[1].parse().map_err(|_| ClozeIssue::Unbalanced)?;
        if number == 0 {
            return Err(ClozeIssue::ZeroNumber);
        }
        if caps[2].trim().is_empty() {
            return Err(ClozeIssue::EmptyDeletion(number));
        }
    }
    match cloze_numbers(text) {
        numbers if numbers.is_empty() => Err(ClozeIssue::NoDeletions),
        numbers => Ok(numbers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloze() {
        assert_eq!(cloze(1, "test"), "{{c1::test}}");
        assert_eq!(cloze(10, "big number"), "{{c10::big number}}");
    }

    #[test]
    fn test_cloze_from_definition_case_insensitive() {
        let text = cloze_from_definition(
            "Basal ganglia",
            "The basal ganglia are subcortical nuclei that select voluntary movements.",
        );
        assert_eq!(
            text.as_deref(),
            Some("The {{c1::basal ganglia}} are subcortical nuclei that select voluntary movements.")
        );
    }

    #[test]
    fn test_cloze_from_definition_only_first_occurrence() {
        let text = cloze_from_definition(
            "GABA",
            "GABA is inhibitory; drugs acting on GABA receptors calm neurons.",
        )
        .unwrap();
        assert_eq!(cloze_numbers(&text), vec![1]);
        assert_eq!(text.matches("{{c1::").count(), 1);
        assert!(text.ends_with("drugs acting on GABA receptors calm neurons."));
    }

    #[test]
    fn test_cloze_from_definition_needs_long_definition() {
        assert_eq!(cloze_from_definition("soma", "The soma: cell body."), None);
        assert_eq!(cloze_from_definition("soma", "soma has five words here"), None);
    }

    #[test]
    fn test_cloze_from_definition_term_absent() {
        assert_eq!(
            cloze_from_definition("axon", "A long projection that carries signals away from cells."),
            None
        );
        assert_eq!(
            cloze_from_definition("  ", "A long projection that carries signals away from cells."),
            None
        );
    }

    #[test]
    fn test_cloze_from_definition_escapes_term() {
        let text = cloze_from_definition(
            "Na+",
            "Na+ ions rush into the cell during depolarization of the membrane.",
        );
        assert_eq!(
            text.as_deref(),
            Some("{{c1::Na+}} ions rush into the cell during depolarization of the membrane.")
        );
    }

    #[test]
    fn test_cloze_numbers() {
        let text = "{{c2::pons}}, {{c1::medulla}}, {{c2::midbrain::hint}}";
        assert_eq!(cloze_numbers(text), vec![1, 2]);
        assert!(cloze_numbers("plain text").is_empty());
    }

    #[test]
    fn test_validate_cloze() {
        assert_eq!(validate_cloze("The {{c1::pons}} relays."), Ok(vec![1]));
        assert_eq!(validate_cloze("no deletions"), Err(ClozeIssue::NoDeletions));
        assert_eq!(validate_cloze("{{c1:: }} gap"), Err(ClozeIssue::EmptyDeletion(1)));
        assert_eq!(validate_cloze("{{c0::zero}}"), Err(ClozeIssue::ZeroNumber));
        assert_eq!(validate_cloze("{{c1::open"), Err(ClozeIssue::Unbalanced));
    }
}
