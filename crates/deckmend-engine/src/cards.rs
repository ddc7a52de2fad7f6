//! Turning extracted candidates into notes.

use crate::config::ExtractConfig;
use crate::extract::{CandidateKind, CandidatePair};
use crate::note::Note;
use crate::schema::{FieldRole, NoteSchema};
use crate::text::{capitalize, ensure_terminal, sentence_spans};

const KEY_TERM_LIMIT: usize = 5;

fn strip_trailing(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '?', '!', ';', ':', ','])
}

/// Phrase a learning objective as a question.
///
/// ```
/// use deckmend_engine::cards::objective_to_question;
///
/// assert_eq!(
///     objective_to_question("Explain synaptic transmission."),
///     "How does synaptic transmission work?"
/// );
/// ```
pub fn objective_to_question(objective: &str) -> String {
    let objective = strip_trailing(objective);
    let (verb, rest) = objective
        .split_once(char::is_whitespace)
        .map_or((objective, ""), |(v, r)| (v, r.trim()));
    if rest.is_empty() {
        return format!("What should you know about {}?", objective);
    }
    match verb.to_lowercase().as_str() {
        "define" => format!("What is {}?", rest),
        "explain" => format!("How does {} work?", rest),
        "describe" => format!("What characterizes {}?", rest),
        "identify" => format!("What are {}?", rest),
        "compare" => format!("How do {} compare?", rest),
        "analyze" => format!("How do you analyze {}?", rest),
        "understand" => format!("What is important about {}?", rest),
        _ => format!("What should you know about {}?", objective),
    }
}

pub fn definition_to_question(term: &str) -> String {
    format!("What is {}?", strip_trailing(term))
}

/// Ask what happens under a process trigger.
///
/// ```
/// use deckmend_engine::cards::process_to_question;
///
/// assert_eq!(
///     process_to_question("during slow-wave sleep"),
///     "What happens during slow-wave sleep?"
/// );
/// assert_eq!(
///     process_to_question("the process of long-term potentiation"),
///     "What happens during the process of long-term potentiation?"
/// );
/// ```
pub fn process_to_question(trigger: &str) -> String {
    let trigger = strip_trailing(trigger);
    if trigger.to_lowercase().starts_with("the process of ") {
        format!("What happens during {}?", trigger)
    } else {
        format!("What happens {}?", trigger)
    }
}

/// Objective words worth searching for: not stopwords or action verbs,
/// longer than three characters, at most five.
fn key_terms(objective: &str, config: &ExtractConfig) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in objective.split(|c: char| !c.is_alphanumeric() && c != '-') {
        let word = word.to_lowercase();
        let skip = word.chars().count() <= 3
            || config.stopwords.contains(&word)
            || config.action_verbs.contains(&word)
            || terms.contains(&word);
        if !skip {
            terms.push(word);
        }
        if terms.len() == KEY_TERM_LIMIT {
            break;
        }
    }
    terms
}

/// First sentence of `text` that mentions a key term of `objective`.
///
/// Sentences repeating the objective itself are skipped. Long sentences are
/// cut at `config.answer_max_chars` with `...`.
pub fn answer_from_text(objective: &str, text: &str, config: &ExtractConfig) -> Option<String> {
    let terms = key_terms(objective, config);
    if terms.is_empty() {
        return None;
    }
    let objective_lower = strip_trailing(objective).to_lowercase();
    let sentence = text
        .lines()
        .flat_map(sentence_spans)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .find(|s| {
            let lower = s.to_lowercase();
            !lower.contains(&objective_lower) && terms.iter().any(|t| lower.contains(t.as_str()))
        })?;

    if sentence.chars().count() > config.answer_max_chars {
        let cut: String = sentence.chars().take(config.answer_max_chars).collect();
        Some(format!("{}...", cut.trim_end()))
    } else {
        Some(sentence.to_string())
    }
}

/// Give every objective an answer from `text`; objectives without one are dropped.
pub fn attach_answers(
    candidates: Vec<CandidatePair>,
    text: &str,
    config: &ExtractConfig,
) -> Vec<CandidatePair> {
    candidates
        .into_iter()
        .filter_map(|mut candidate| match candidate.kind {
            CandidateKind::Definition | CandidateKind::Process => Some(candidate),
            CandidateKind::Objective => {
                candidate.body = answer_from_text(&candidate.term, text, config)?;
                Some(candidate)
            }
        })
        .collect()
}

/// Build a note for `schema` from a candidate.
///
/// The body becomes the answer; for objectives call [`attach_answers`] first.
pub fn to_note(
    candidate: &CandidatePair,
    schema: &NoteSchema,
    deck: &str,
    course_tag: &str,
) -> Note {
    let question = match candidate.kind {
        CandidateKind::Objective => objective_to_question(&candidate.term),
        CandidateKind::Definition => definition_to_question(&candidate.term),
        CandidateKind::Process => process_to_question(&candidate.term),
    };
    let answer = ensure_terminal(&capitalize(candidate.body.trim()), '.');

    let mut note = Note::new(deck, schema);
    note.set_role(schema, FieldRole::Question, question);
    note.set_role(schema, FieldRole::Answer, answer);
    note.set_role(schema, FieldRole::Priority, candidate.priority.as_str());
    note.set_role(schema, FieldRole::Source, candidate.source.as_str());
    if let Some(chapter) = &candidate.chapter {
        note.set_role(schema, FieldRole::Chapter, chapter.as_str());
    }
    note.add_tag(course_tag);
    note.add_tag(candidate.priority.as_tag());
    note.add_tag(candidate.kind.as_str());
    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionRule;
    use crate::note::Priority;

    fn definition() -> CandidatePair {
        CandidatePair {
            term: "Parkinson's disease".into(),
            body: "movement disorder caused by dopamine neuron loss".into(),
            kind: CandidateKind::Definition,
            priority: Priority::High,
            source: ExtractionRule::ColonDefinition,
            chapter: Some("Chapter 4".into()),
        }
    }

    #[test]
    fn objective_templates() {
        assert_eq!(objective_to_question("Define long-term potentiation"), "What is long-term potentiation?");
        assert_eq!(
            objective_to_question("Describe the structure of a neuron."),
            "What characterizes the structure of a neuron?"
        );
        assert_eq!(objective_to_question("Identify the cranial nerves"), "What are the cranial nerves?");
        assert_eq!(
            objective_to_question("Compare rods and cones"),
            "How do rods and cones compare?"
        );
        assert_eq!(
            objective_to_question("Recognize symptoms of stroke"),
            "What should you know about Recognize symptoms of stroke?"
        );
    }

    #[test]
    fn memory_optimized_note_from_definition() {
        let schema = NoteSchema::memory_optimized("PSYC Memory");
        let note = to_note(&definition(), &schema, "PSYC 2240", "PSYC2240");
        assert_eq!(note.question(&schema), "What is Parkinson's disease?");
        assert_eq!(
            note.answer(&schema),
            "Movement disorder caused by dopamine neuron loss."
        );
        assert_eq!(note.role(&schema, FieldRole::Priority), "high");
        assert_eq!(note.role(&schema, FieldRole::Source), "colon_definition");
        assert_eq!(note.role(&schema, FieldRole::Chapter), "Chapter 4");
        assert_eq!(note.tags, vec!["PSYC2240", "high-priority", "definition"]);
        assert_eq!(note.deck, "PSYC 2240");
    }

    #[test]
    fn process_note_asks_what_happens() {
        let schema = NoteSchema::basic();
        let candidate = CandidatePair {
            term: "when the membrane reaches threshold".into(),
            body: "voltage-gated sodium channels open and an action potential fires".into(),
            kind: CandidateKind::Process,
            priority: Priority::Medium,
            source: ExtractionRule::ProcessTrigger,
            chapter: None,
        };
        let note = to_note(&candidate, &schema, "Neuro", "PSYC2240");
        assert_eq!(note.question(&schema), "What happens when the membrane reaches threshold?");
        assert_eq!(
            note.answer(&schema),
            "Voltage-gated sodium channels open and an action potential fires."
        );
        assert_eq!(note.tags, vec!["PSYC2240", "medium-priority", "process"]);
    }

    #[test]
    fn basic_schema_ignores_missing_roles() {
        let schema = NoteSchema::basic();
        let note = to_note(&definition(), &schema, "Deck", "");
        assert_eq!(note.fields.len(), 2);
        assert_eq!(note.tags, vec!["high-priority", "definition"]);
    }

    #[test]
    fn answers_found_in_source_text() {
        let config = ExtractConfig::default();
        let text = "Explain how action potentials propagate\n\
                    Glia support neurons. Action potentials propagate along the axon by sequential opening of sodium channels.";
        assert_eq!(
            answer_from_text("Explain how action potentials propagate", text, &config).as_deref(),
            Some("Action potentials propagate along the axon by sequential opening of sodium channels.")
        );
        assert_eq!(answer_from_text("Explain it", text, &config), None);
    }

    #[test]
    fn long_answers_truncated() {
        let config = ExtractConfig {
            answer_max_chars: 20,
            ..ExtractConfig::default()
        };
        let answer = answer_from_text(
            "Describe the hippocampus",
            "The hippocampus consolidates declarative memories during sleep.",
            &config,
        )
        .unwrap();
        assert_eq!(answer, "The hippocampus cons...");
    }

    #[test]
    fn objectives_without_answers_dropped() {
        let objective = CandidatePair {
            term: "Describe the cerebellum".into(),
            body: "Describe the cerebellum".into(),
            kind: CandidateKind::Objective,
            priority: Priority::High,
            source: ExtractionRule::MarkedObjective,
            chapter: None,
        };
        let kept = attach_answers(
            vec![objective, definition()],
            "Dopamine neurons degenerate.",
            &ExtractConfig::default(),
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].kind, CandidateKind::Definition);
    }
}
