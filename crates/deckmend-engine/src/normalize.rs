//! The card normalizer.
//!
//! [`Normalizer::normalize`] takes a note in any state and returns its
//! canonical form plus what was wrong with it. Repairs run in
//! [`DefectTag`] order and repeat until the note stops changing, so
//! normalizing an already normalized note is a no-op:
//!
//! ```
//! use deckmend_engine::normalize::{CardState, Normalizer};
//! use deckmend_engine::{Note, NoteSchema};
//!
//! let schema = NoteSchema::basic();
//! let note = Note::new("Neuro", &schema)
//!     .with_field("Front", "How do Flow through a Neuron function?")
//!     .with_field("Back", "Ions cross the membrane and the signal travels from dendrites to the axon terminals.");
//!
//! let normalizer = Normalizer::default();
//! let first = normalizer.normalize(&note, &schema);
//! assert_eq!(first.state, CardState::Repaired);
//! assert_eq!(first.note.question(&schema), "How does neural transmission work through a neuron?");
//!
//! let second = normalizer.normalize(&first.note, &schema);
//! assert_eq!(second.state, CardState::Ok);
//! assert_eq!(second.note, first.note);
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{PlaceholderPolicy, RepairConfig};
use crate::defects::{
    DefectTag, detect, detect_cloze, has_figure_reference, is_corrupted, is_dangling,
    is_incomplete, is_placeholder, remove_figure_references,
};
use crate::error::Result;
use crate::markup::{has_markup, strip_markup};
use crate::note::Note;
use crate::rules::RuleSet;
use crate::schema::{FieldRole, NoteSchema};
use crate::text::{capitalize, ensure_terminal, question_subject, word_count};

/// Upper bound on repair passes before a note is left flagged.
const MAX_PASSES: usize = 8;

/// Outcome of normalizing one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    /// No defects found; the note is untouched.
    Ok,
    /// Defects found and all of them repaired.
    Repaired,
    /// Some defects could not be repaired; the note needs human review.
    Flagged,
    /// Placeholder content under [`PlaceholderPolicy::Drop`]; never written.
    Dropped,
}

impl CardState {
    pub fn as_str(self) -> &'static str {
        match self {
            CardState::Ok => "ok",
            CardState::Repaired => "repaired",
            CardState::Flagged => "flagged",
            CardState::Dropped => "dropped",
        }
    }
}

/// A normalized note and its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// The repaired note; the input unchanged for `Ok` and `Dropped`.
    pub note: Note,
    pub state: CardState,
    /// Defects found before repair.
    pub defects: Vec<DefectTag>,
    /// Defects still present after repair.
    pub unrepaired: Vec<DefectTag>,
}

/// Detects and repairs defects with a compiled [`RuleSet`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: RuleSet,
    policy: PlaceholderPolicy,
}

impl Default for Normalizer {
    fn default() -> Self {
        match Self::new(&RepairConfig::default()) {
            Ok(normalizer) => normalizer,
            Err(e) => unreachable!("built-in repair tables are invalid: {}", e),
        }
    }
}

impl Normalizer {
    /// Compile the repair tables in `config`.
    pub fn new(config: &RepairConfig) -> Result<Self> {
        Ok(Self {
            rules: RuleSet::compile(config)?,
            policy: config.placeholder_policy,
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Defects of a note: question/answer checks plus markup in any other field.
    ///
    /// Cloze note types are checked for a usable deletion in `Text` instead.
    pub fn inspect(&self, note: &Note, schema: &NoteSchema) -> Vec<DefectTag> {
        let mut tags = if schema.is_cloze() {
            detect_cloze(note.role(schema, FieldRole::Text))
        } else {
            detect(note.question(schema), note.answer(schema), &self.rules)
        };
        if !tags.contains(&DefectTag::EmbeddedMarkup)
            && note.fields.iter().any(|(_, value)| has_markup(value))
        {
            tags.insert(0, DefectTag::EmbeddedMarkup);
        }
        tags
    }

    /// Normalize one note.
    pub fn normalize(&self, note: &Note, schema: &NoteSchema) -> Normalized {
        let defects = self.inspect(note, schema);
        if defects.is_empty() {
            return Normalized {
                note: note.clone(),
                state: CardState::Ok,
                defects,
                unrepaired: Vec::new(),
            };
        }

        if self.policy == PlaceholderPolicy::Drop
            && defects.contains(&DefectTag::PlaceholderText)
        {
            return Normalized {
                note: note.clone(),
                state: CardState::Dropped,
                defects,
                unrepaired: Vec::new(),
            };
        }

        let mut current = note.clone();
        for pass in 0..MAX_PASSES {
            let next = self.repair_pass(&current, schema);
            if next == current {
                break;
            }
            trace!(pass, note_id = ?note.id, "repair pass changed note");
            current = next;
        }

        let unrepaired = self.inspect(&current, schema);
        let state = if unrepaired.is_empty() {
            CardState::Repaired
        } else {
            CardState::Flagged
        };
        Normalized {
            note: current,
            state,
            defects,
            unrepaired,
        }
    }

    fn repair_pass(&self, note: &Note, schema: &NoteSchema) -> Note {
        let mut note = note.clone();
        for (_, value) in note.fields.iter_mut() {
            if has_markup(value) {
                *value = strip_markup(value);
            }
        }
        // Cloze text is the card itself; nothing else can be derived for it.
        if schema.is_cloze() {
            return note;
        }

        let mut question = note.question(schema).trim().to_string();
        let mut answer = note.answer(schema).trim().to_string();

        if has_figure_reference(&question) {
            question = remove_figure_references(&question);
        }
        if has_figure_reference(&answer) {
            answer = remove_figure_references(&answer);
        }
        if let Some(rewritten) = self.rules.rewrite_question(&question) {
            question = rewritten;
        }
        if is_corrupted(&answer) {
            answer = self.rules.canned.answer_for(&question).to_string();
        }

        // Nothing can be derived for an empty question.
        if !question.is_empty() {
            if is_placeholder(&answer, &self.rules) {
                answer = self.rules.canned.answer_for(&question).to_string();
            }
            if is_incomplete(&question, &answer, &self.rules) {
                answer = self.complete_answer(&question, &answer);
            }
            question = ensure_terminal(&question, '?');
        }
        answer = ensure_terminal(&answer, '.');

        note.set_role(schema, FieldRole::Question, question);
        note.set_role(schema, FieldRole::Answer, answer);
        note
    }

    fn complete_answer(&self, question: &str, answer: &str) -> String {
        let rules = &self.rules;
        if is_dangling(answer) {
            return match question_subject(question) {
                Some(subject) => {
                    ensure_terminal(&format!("{} {}", capitalize(subject), answer.trim()), '.')
                }
                None => rules.canned.answer_for(question).to_string(),
            };
        }
        if let Some(rule) = rules.incomplete_rule(question, answer) {
            return rule.answer.clone();
        }
        if word_count(answer) >= rules.min_answer_words {
            return answer.to_string();
        }
        match rules.canned.lookup(question) {
            Some(canned) => canned.to_string(),
            None => format!(
                "{} {}",
                ensure_terminal(answer, '.'),
                rules.clarifying_clause
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CELL_BODY_ANSWER, FALLBACK_ANSWER};

    const GOOD_ANSWER: &str =
        "The basal ganglia are subcortical nuclei that help select and initiate voluntary movements.";

    fn basic(question: &str, answer: &str) -> Note {
        Note::new("Neuro", &NoteSchema::basic())
            .with_id(1)
            .with_field("Front", question)
            .with_field("Back", answer)
    }

    fn assert_fixed_point(normalizer: &Normalizer, result: &Normalized) {
        let schema = NoteSchema::basic();
        let again = normalizer.normalize(&result.note, &schema);
        assert_eq!(again.note, result.note);
        if result.state == CardState::Repaired {
            assert_eq!(again.state, CardState::Ok);
        }
    }

    #[test]
    fn clean_note_untouched() {
        let note = basic("What are the basal ganglia?", GOOD_ANSWER);
        let result = Normalizer::default().normalize(&note, &NoteSchema::basic());
        assert_eq!(result.state, CardState::Ok);
        assert_eq!(result.note, note);
    }

    #[test]
    fn cell_body_answer_replaced() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let note = basic(
            "What structure is at the center of the neuron?",
            "An ovoid structure labeled cell body is at the center of the neuron.",
        );
        let result = normalizer.normalize(&note, &schema);
        assert_eq!(result.defects, vec![DefectTag::IncompleteAnswer]);
        assert_eq!(result.state, CardState::Repaired);
        assert_eq!(result.note.answer(&schema), CELL_BODY_ANSWER);
        assert!(word_count(result.note.answer(&schema)) >= 15);
        assert_fixed_point(&normalizer, &result);
    }

    #[test]
    fn grammar_defect_rewritten() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let note = basic("How do Flow through a Neuron function?", GOOD_ANSWER);
        let result = normalizer.normalize(&note, &schema);
        assert_eq!(result.defects, vec![DefectTag::GrammarDefect]);
        assert_eq!(
            result.note.question(&schema),
            "How does neural transmission work through a neuron?"
        );
        assert_fixed_point(&normalizer, &result);
    }

    #[test]
    fn corrupted_answer_uses_canned_or_fallback() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();

        let hanoi = normalizer.normalize(
            &basic("What is the Tower of Hanoi used for?", "Text, 378 Tower of Hanoi test, 59"),
            &schema,
        );
        assert_eq!(hanoi.state, CardState::Repaired);
        assert_eq!(
            hanoi.note.answer(&schema),
            "Problem-solving task used to assess executive function and working memory."
        );
        assert_fixed_point(&normalizer, &hanoi);

        let other = normalizer.normalize(
            &basic("What does this item measure?", "Text, 378 Tower of Hanoi test, 59"),
            &schema,
        );
        assert_eq!(other.state, CardState::Flagged);
        assert_eq!(other.note.answer(&schema), FALLBACK_ANSWER);
        assert_eq!(other.unrepaired, vec![DefectTag::PlaceholderText]);
        assert_fixed_point(&normalizer, &other);
    }

    #[test]
    fn figure_sentence_removed() {
        let config = RepairConfig {
            min_answer_words: 5,
            ..RepairConfig::default()
        };
        let normalizer = Normalizer::new(&config).unwrap();
        let schema = NoteSchema::basic();
        let result = normalizer.normalize(
            &basic(
                "What do the basal ganglia do?",
                "Figure 12-3 shows the basal ganglia pathways. The basal ganglia regulate movement.",
            ),
            &schema,
        );
        assert_eq!(result.defects, vec![DefectTag::FigureReference]);
        assert_eq!(result.note.answer(&schema), "The basal ganglia regulate movement.");
        assert_eq!(result.state, CardState::Repaired);
    }

    #[test]
    fn markup_stripped_from_every_field() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::memory_optimized("Memory");
        let note = Note::new("Neuro", &schema)
            .with_field("Question", "<div>What are the basal ganglia?</div>")
            .with_field("Answer", format!("<style>.card {{ color: red; }}</style>{}", GOOD_ANSWER))
            .with_field("Source", "<b>Lecture 4</b>");
        let result = normalizer.normalize(&note, &schema);
        assert_eq!(result.state, CardState::Repaired);
        assert_eq!(result.note.question(&schema), "What are the basal ganglia?");
        assert_eq!(result.note.answer(&schema), GOOD_ANSWER);
        assert_eq!(result.note.role(&schema, FieldRole::Source), "Lecture 4");
        assert!(result.note.fields.iter().all(|(_, v)| !has_markup(v)));
    }

    #[test]
    fn dangling_answer_gets_subject() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let result = normalizer.normalize(
            &basic(
                "What is the insular cortex?",
                "is a region folded deep within the lateral sulcus of each hemisphere",
            ),
            &schema,
        );
        assert_eq!(result.state, CardState::Repaired);
        assert_eq!(
            result.note.answer(&schema),
            "The insular cortex is a region folded deep within the lateral sulcus of each hemisphere."
        );
        assert_fixed_point(&normalizer, &result);
    }

    #[test]
    fn characterizes_fragment_rebuilt_from_question() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let result = normalizer.normalize(
            &basic("What characterizes Korsakoff syndrome?", "is enigmatic"),
            &schema,
        );
        assert_eq!(result.state, CardState::Repaired);
        assert!(
            result
                .note
                .answer(&schema)
                .starts_with("Korsakoff syndrome is enigmatic."),
            "{}",
            result.note.answer(&schema)
        );
        assert_fixed_point(&normalizer, &result);
    }

    #[test]
    fn fallback_answer_stays_flagged() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let result = normalizer.normalize(&basic("What is a gene?", "Review this answer"), &schema);
        assert_eq!(result.note.answer(&schema), FALLBACK_ANSWER);
        assert_eq!(result.state, CardState::Flagged);

        let again = normalizer.normalize(&result.note, &schema);
        assert_eq!(again.note, result.note);
        assert_eq!(again.state, CardState::Flagged);
    }

    #[test]
    fn cloze_extra_left_alone() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::cloze();
        let note = Note::new("Neuro", &schema)
            .with_field(
                "Text",
                "The {{c1::pons}} relays signals between the cerebrum and the cerebellum.",
            )
            .with_field("Extra", "");
        let result = normalizer.normalize(&note, &schema);
        assert_eq!(result.state, CardState::Ok);
        assert_eq!(result.note, note);
    }

    #[test]
    fn cloze_markup_stripped_and_missing_deletion_flagged() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::cloze();

        let marked = Note::new("Neuro", &schema)
            .with_field("Text", "<b>The {{c1::pons}}</b> relays signals")
            .with_field("Extra", "");
        let result = normalizer.normalize(&marked, &schema);
        assert_eq!(result.state, CardState::Repaired);
        assert_eq!(result.note.role(&schema, FieldRole::Text), "The {{c1::pons}} relays signals");
        assert_eq!(result.note.role(&schema, FieldRole::Answer), "");

        let bare = Note::new("Neuro", &schema)
            .with_field("Text", "The pons relays signals.")
            .with_field("Extra", "");
        let result = normalizer.normalize(&bare, &schema);
        assert_eq!(result.state, CardState::Flagged);
        assert_eq!(result.note, bare);
    }

    #[test]
    fn short_answer_gets_clause() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let result = normalizer.normalize(&basic("What do glial cells do?", "Support neurons"), &schema);
        assert_eq!(result.state, CardState::Repaired);
        assert_eq!(
            result.note.answer(&schema),
            "Support neurons. This process is essential for proper neural communication and brain function."
        );
        assert_fixed_point(&normalizer, &result);
    }

    #[test]
    fn short_answer_prefers_canned() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let result = normalizer.normalize(&basic("What does dopamine do?", "Reward"), &schema);
        assert_eq!(
            result.note.answer(&schema),
            normalizer.rules().canned.lookup("What does dopamine do?").unwrap()
        );
    }

    #[test]
    fn placeholder_substituted_or_dropped() {
        let schema = NoteSchema::basic();
        let note = basic("What is the cerebellum?", "Review this answer");

        let substitute = Normalizer::default().normalize(&note, &schema);
        assert_eq!(substitute.state, CardState::Repaired);
        assert!(substitute.defects.contains(&DefectTag::PlaceholderText));
        assert_ne!(substitute.note.answer(&schema), "Review this answer");

        let config = RepairConfig {
            placeholder_policy: PlaceholderPolicy::Drop,
            ..RepairConfig::default()
        };
        let dropped = Normalizer::new(&config).unwrap().normalize(&note, &schema);
        assert_eq!(dropped.state, CardState::Dropped);
        assert_eq!(dropped.note, note);
    }

    #[test]
    fn empty_question_flagged() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let result = normalizer.normalize(&basic("", GOOD_ANSWER), &schema);
        assert_eq!(result.state, CardState::Flagged);
        assert_eq!(result.unrepaired, vec![DefectTag::PlaceholderText]);
        assert_fixed_point(&normalizer, &result);
    }

    #[test]
    fn missing_punctuation_added() {
        let normalizer = Normalizer::default();
        let schema = NoteSchema::basic();
        let answer = GOOD_ANSWER.trim_end_matches('.');
        let result = normalizer.normalize(&basic("What are the basal ganglia", answer), &schema);
        assert_eq!(result.defects, vec![DefectTag::MissingPunctuation]);
        assert_eq!(result.note.question(&schema), "What are the basal ganglia?");
        assert_eq!(result.note.answer(&schema), GOOD_ANSWER);
    }

    #[test]
    fn subject_extraction() {
        assert_eq!(question_subject("What is the thalamus?"), Some("the thalamus"));
        assert_eq!(question_subject("Which are glia?"), Some("glia"));
        assert_eq!(
            question_subject("What characterizes Korsakoff syndrome?"),
            Some("Korsakoff syndrome")
        );
        assert_eq!(question_subject("How does it work?"), None);
    }
}
