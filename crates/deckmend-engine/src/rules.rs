//! Repair rule tables.
//!
//! Three small, ordered tables drive the text repairs: grammar rewrites for
//! known-bad question templates, canned answers looked up by keywords in the
//! question, and topic-specific replacements for short answers. All three
//! are plain data in [`RepairConfig`](crate::config::RepairConfig) and are
//! compiled once into a [`RuleSet`].

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::config::RepairConfig;
use crate::text::{has_terminal_punctuation, word_count};
use crate::error::{Error, Result};

/// How a matching grammar rule rewrites the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rewrite {
    /// Replace the whole question.
    Fixed(String),
    /// Expand `$1`-style capture references from the pattern.
    Template(String),
}

/// One entry of the grammar rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarRule {
    pub name: String,
    /// Regex matched against the whole question; add `(?i)` for case-insensitivity.
    pub pattern: String,
    pub rewrite: Rewrite,
}

impl GrammarRule {
    fn new(name: &str, pattern: &str, rewrite: Rewrite) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            rewrite,
        }
    }

    /// The built-in table, checked top to bottom.
    pub fn defaults() -> Vec<GrammarRule> {
        vec![
            GrammarRule::new(
                "neural-transmission",
                r"(?i)^how do\b.*\bflow through\b.*\bneurons?\b.*\bfunction\?$",
                Rewrite::Fixed("How does neural transmission work through a neuron?".into()),
            ),
            GrammarRule::new(
                "how-do-function",
                r"(?i)^how do\s+(.+?)\s+function\?$",
                Rewrite::Template("How does $1 function?".into()),
            ),
            GrammarRule::new(
                "characterizes-enigmatic",
                r"(?i)^what characterizes\s+(.+?)\s+is\s+enigmatic\?$",
                Rewrite::Template("Why is $1 considered enigmatic?".into()),
            ),
            GrammarRule::new(
                "characterizes-unclear",
                r"(?i)^what characterizes\s+(.+?)\s+is\s+(unclear|unknown|mysterious)\?$",
                Rewrite::Template("What makes $1 $2?".into()),
            ),
            GrammarRule::new(
                "characterizes-is",
                r"(?i)^what characterizes\s+(.+?)\s+is\s+(.+?)\?$",
                Rewrite::Template("What is $2 about $1?".into()),
            ),
            GrammarRule::new(
                "define-imperative",
                r"(?i)^define\s+(.+?)[.?!]?$",
                Rewrite::Template("What is $1?".into()),
            ),
        ]
    }
}

/// A canned answer and the question keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannedAnswer {
    pub keywords: Vec<String>,
    pub answer: String,
}

/// Ordered keyword → answer table with a generic fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannedAnswers {
    pub entries: Vec<CannedAnswer>,
    pub fallback: String,
}

/// Generic answer used when no canned entry matches.
pub const FALLBACK_ANSWER: &str =
    "Review this concept in your textbook - content needs verification.";

/// Canned explanation for the neuron cell body.
pub const CELL_BODY_ANSWER: &str = "The cell body (soma) is the ovoid structure at the center of the neuron that contains the nucleus and most organelles. It integrates incoming signals from dendrites and generates action potentials that travel down the axon to communicate with other neurons.";

const DEFAULT_CANNED: &[(&[&str], &str)] = &[
    (
        &["tourette"],
        "Tourette syndrome is a neurodevelopmental disorder marked by repetitive involuntary motor and vocal tics linked to basal ganglia dysfunction.",
    ),
    (
        &["tower of hanoi", "hanoi"],
        "Problem-solving task used to assess executive function and working memory.",
    ),
    (
        &["temporal lobe"],
        "The temporal lobe processes auditory information and supports language comprehension, memory formation, and object recognition.",
    ),
    (
        &["parietal lobe"],
        "The parietal lobe integrates touch and body position information and supports spatial awareness and attention.",
    ),
    (
        &["frontal lobe"],
        "The frontal lobe controls planning, decision making, voluntary movement, and executive functions such as working memory.",
    ),
    (
        &["occipital lobe"],
        "The occipital lobe contains the primary visual cortex and processes visual information such as shape, color, and motion.",
    ),
    (
        &["dopamine"],
        "Dopamine is a neurotransmitter involved in reward, motivation, and motor control; losing dopamine neurons causes Parkinson's disease.",
    ),
    (
        &["serotonin"],
        "Serotonin is a neurotransmitter that regulates mood, sleep, appetite, and emotional processing throughout the brain.",
    ),
    (
        &["acetylcholine"],
        "Acetylcholine is a neurotransmitter that activates muscles at the neuromuscular junction and supports attention and memory.",
    ),
    (
        &["alzheimer"],
        "Alzheimer's disease is a progressive neurodegenerative disorder marked by amyloid plaques, neurofibrillary tangles, and gradual memory loss.",
    ),
    (
        &["parkinson"],
        "Parkinson's disease is a movement disorder caused by loss of dopamine neurons in the substantia nigra, producing tremor and rigidity.",
    ),
    (
        &["huntington"],
        "Huntington's disease is an inherited neurodegenerative disorder that damages the basal ganglia and causes involuntary movements.",
    ),
    (
        &["pet scan", "pet"],
        "A PET scan uses radioactive tracers to measure metabolic activity and blood flow in the brain.",
    ),
    (
        &["fmri"],
        "Functional MRI measures changes in blood oxygenation to show which brain regions are active during a task.",
    ),
    (
        &["mri"],
        "MRI uses strong magnetic fields and radio waves to produce detailed structural images of the brain.",
    ),
    (
        &["working memory"],
        "Working memory is a limited-capacity system that temporarily holds and manipulates information needed for ongoing tasks.",
    ),
    (
        &["long-term memory"],
        "Long-term memory stores information for extended periods and includes explicit declarative and implicit procedural memories.",
    ),
    (
        &["episodic memory"],
        "Episodic memory is memory for personally experienced events tied to a specific time and place.",
    ),
    (
        &["neuroplasticity", "plasticity"],
        "Neuroplasticity is the brain's ability to reorganize its structure and connections in response to experience, learning, or injury.",
    ),
    (
        &["action potential"],
        "An action potential is a brief electrical signal that travels down the axon when the membrane reaches threshold.",
    ),
    (
        &["synapse", "synaptic"],
        "A synapse is the junction where a neuron passes a chemical or electrical signal to another cell.",
    ),
    (
        &["cerebellum"],
        "The cerebellum coordinates balance, posture, and fine motor movements and contributes to motor learning.",
    ),
    (
        &["hippocampus"],
        "The hippocampus is a medial temporal lobe structure essential for forming new declarative memories and spatial navigation.",
    ),
    (
        &["amygdala"],
        "The amygdala is a medial temporal lobe structure that processes emotions, especially fear, and emotional memories.",
    ),
    (
        &["hypothalamus"],
        "The hypothalamus regulates hunger, thirst, body temperature, and hormone release through the pituitary gland.",
    ),
    (
        &["thalamus"],
        "The thalamus relays sensory and motor signals to the cerebral cortex and helps regulate consciousness and sleep.",
    ),
    (
        &["myelin"],
        "Myelin is a fatty insulating sheath around axons that speeds the conduction of action potentials.",
    ),
    (&["cell body", "soma"], CELL_BODY_ANSWER),
];

impl Default for CannedAnswers {
    fn default() -> Self {
        Self {
            entries: DEFAULT_CANNED
                .iter()
                .map(|(keywords, answer)| CannedAnswer {
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                    answer: answer.to_string(),
                })
                .collect(),
            fallback: FALLBACK_ANSWER.to_string(),
        }
    }
}

impl CannedAnswers {
    /// First entry whose keyword occurs in `question`.
    pub fn lookup(&self, question: &str) -> Option<&str> {
        let question = question.to_lowercase();
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .keywords
                    .iter()
                    .any(|kw| contains_keyword(&question, &kw.to_lowercase()))
            })
            .map(|entry| entry.answer.as_str())
    }

    /// The matching canned answer, or the fallback.
    pub fn answer_for(&self, question: &str) -> &str {
        self.lookup(question).unwrap_or(&self.fallback)
    }
}

/// Topic-specific replacement for a short answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteAnswerRule {
    /// Any of these in the question; empty matches every question.
    #[serde(default)]
    pub question_keywords: Vec<String>,
    /// Any of these in the answer; empty matches every answer.
    #[serde(default)]
    pub answer_keywords: Vec<String>,
    /// The rule applies only to answers with fewer words than this.
    pub below_words: usize,
    pub answer: String,
}

impl IncompleteAnswerRule {
    pub fn defaults() -> Vec<IncompleteAnswerRule> {
        vec![IncompleteAnswerRule {
            question_keywords: Vec::new(),
            answer_keywords: vec!["cell body".into(), "soma".into()],
            below_words: 20,
            answer: CELL_BODY_ANSWER.to_string(),
        }]
    }

    /// Keywords here match whole words only.
    pub fn matches(&self, question: &str, answer: &str) -> bool {
        let any_word = |haystack: &str, keywords: &[String]| {
            let haystack = haystack.to_lowercase();
            keywords.is_empty()
                || keywords
                    .iter()
                    .any(|kw| contains_word(&haystack, &kw.to_lowercase()))
        };
        word_count(answer) < self.below_words
            && answer != self.answer
            && any_word(question, &self.question_keywords)
            && any_word(answer, &self.answer_keywords)
    }
}

/// Substring match; keywords of three characters or fewer must sit on word boundaries.
pub fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if keyword.chars().count() <= 3 {
        contains_word(haystack, keyword)
    } else {
        haystack.contains(keyword)
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// A grammar rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledGrammarRule {
    pub rule: GrammarRule,
    regex: Regex,
}

impl CompiledGrammarRule {
    fn rewrite(&self, question: &str) -> Option<String> {
        let caps = self.regex.captures(question)?;
        let rewritten = match &self.rule.rewrite {
            Rewrite::Fixed(text) => text.clone(),
            Rewrite::Template(template) => {
                let mut out = String::new();
                caps.expand(template, &mut out);
                out
            }
        };
        Some(rewritten)
    }
}

/// Compiled, validated repair tables plus the thresholds detection needs.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub grammar: Vec<CompiledGrammarRule>,
    pub canned: CannedAnswers,
    pub incomplete: Vec<IncompleteAnswerRule>,
    pub min_answer_words: usize,
    /// Lowercased placeholder phrases.
    pub placeholders: Vec<String>,
    pub clarifying_clause: String,
}

impl RuleSet {
    /// Compile the tables in `config`.
    ///
    /// Every substitute answer must already be a clean answer (enough words,
    /// terminal punctuation), otherwise repairing a note could need another
    /// repair. Such tables are rejected as [`Error::Config`].
    pub fn compile(config: &RepairConfig) -> Result<Self> {
        let grammar = config
            .grammar_rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| CompiledGrammarRule {
                        rule: rule.clone(),
                        regex,
                    })
                    .map_err(|e| {
                        Error::Config(format!("grammar rule '{}': {}", rule.name, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let check = |what: &str, answer: &str| {
            if word_count(answer) < config.min_answer_words || !has_terminal_punctuation(answer) {
                Err(Error::Config(format!(
                    "{} is not a complete answer of at least {} words: {:?}",
                    what, config.min_answer_words, answer
                )))
            } else {
                Ok(())
            }
        };
        check("canned fallback", &config.canned.fallback)?;
        for entry in &config.canned.entries {
            check("canned answer", &entry.answer)?;
        }
        for rule in &config.incomplete_rules {
            check("incomplete-answer rule", &rule.answer)?;
            if word_count(&rule.answer) < rule.below_words {
                return Err(Error::Config(format!(
                    "incomplete-answer rule replacement is shorter than its own threshold of {} words",
                    rule.below_words
                )));
            }
        }
        let clause_words = word_count(&config.clarifying_clause);
        if clause_words < config.min_answer_words {
            return Err(Error::Config(format!(
                "clarifying clause needs at least {} words",
                config.min_answer_words
            )));
        }

        Ok(Self {
            grammar,
            canned: config.canned.clone(),
            incomplete: config.incomplete_rules.clone(),
            min_answer_words: config.min_answer_words,
            placeholders: config.placeholders.iter().map(|p| p.to_lowercase()).collect(),
            clarifying_clause: config.clarifying_clause.trim().to_string(),
        })
    }

    /// Name of the first grammar rule matching `question`.
    pub fn grammar_match(&self, question: &str) -> Option<&str> {
        self.grammar
            .iter()
            .find(|r| r.regex.is_match(question))
            .map(|r| r.rule.name.as_str())
    }

    /// Rewrite `question` with the first matching grammar rule.
    pub fn rewrite_question(&self, question: &str) -> Option<String> {
        self.grammar.iter().find_map(|r| r.rewrite(question))
    }

    /// First incomplete-answer rule that applies.
    pub fn incomplete_rule(&self, question: &str, answer: &str) -> Option<&IncompleteAnswerRule> {
        self.incomplete.iter().find(|r| r.matches(question, answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::compile(&RepairConfig::default()).unwrap()
    }

    #[test]
    fn flow_through_neuron_rewritten() {
        let rules = rules();
        assert_eq!(
            rules.rewrite_question("How do Flow through a Neuron function?").as_deref(),
            Some("How does neural transmission work through a neuron?")
        );
        assert_eq!(
            rules.grammar_match("How do Flow through a Neuron function?"),
            Some("neural-transmission")
        );
    }

    #[test]
    fn how_do_function_keeps_subject() {
        assert_eq!(
            rules().rewrite_question("How do basal ganglia function?").as_deref(),
            Some("How does basal ganglia function?")
        );
    }

    #[test]
    fn characterizes_is_keeps_predicate() {
        let rules = rules();
        assert_eq!(
            rules
                .rewrite_question("What characterizes Huntington's disease is enigmatic?")
                .as_deref(),
            Some("Why is Huntington's disease considered enigmatic?")
        );
        assert_eq!(
            rules
                .rewrite_question("What characterizes the default mode network is unclear?")
                .as_deref(),
            Some("What makes the default mode network unclear?")
        );
        assert_eq!(
            rules
                .rewrite_question("What characterizes Broca's aphasia is impaired speech?")
                .as_deref(),
            Some("What is impaired speech about Broca's aphasia?")
        );
        assert_eq!(
            rules.grammar_match("What characterizes Huntington's disease is enigmatic?"),
            Some("characterizes-enigmatic")
        );
    }

    #[test]
    fn define_becomes_question() {
        assert_eq!(
            rules().rewrite_question("Define long-term potentiation").as_deref(),
            Some("What is long-term potentiation?")
        );
    }

    #[test]
    fn rewritten_questions_match_no_rule() {
        let rules = rules();
        for q in [
            "How do Flow through a Neuron function?",
            "How do basal ganglia function?",
            "What characterizes Broca's aphasia is impaired speech?",
            "What characterizes Huntington's disease is enigmatic?",
            "What characterizes sleep is mysterious?",
            "Define myelin.",
        ] {
            let fixed = rules.rewrite_question(q).unwrap();
            assert_eq!(rules.grammar_match(&fixed), None, "{fixed}");
        }
    }

    #[test]
    fn canned_lookup_first_match_wins() {
        let canned = CannedAnswers::default();
        assert!(canned
            .answer_for("What is the Tower of Hanoi used to test?")
            .starts_with("Problem-solving task"));
        assert!(canned.answer_for("What does fMRI measure?").starts_with("Functional MRI"));
        assert!(canned.answer_for("What does the hypothalamus do?").starts_with("The hypothalamus"));
        assert_eq!(canned.answer_for("What is a gene?"), FALLBACK_ANSWER);
    }

    #[test]
    fn short_keywords_need_word_boundaries() {
        assert!(contains_keyword("what does a pet scan show", "pet"));
        assert!(!contains_keyword("a competent clinician", "pet"));
        assert!(!contains_keyword("fmri signal", "mri"));
        assert!(contains_keyword("alzheimer's disease", "alzheimer"));
    }

    #[test]
    fn cell_body_rule_matches_short_answer() {
        let rules = rules();
        let answer = "An ovoid structure labeled cell body is at the center of the neuron.";
        let rule = rules.incomplete_rule("What is this structure?", answer).unwrap();
        assert_eq!(rule.answer, CELL_BODY_ANSWER);
        assert!(word_count(CELL_BODY_ANSWER) >= 15);
        assert!(rules.incomplete_rule("What is this structure?", CELL_BODY_ANSWER).is_none());
    }

    #[test]
    fn rule_keywords_match_whole_words() {
        let rule = &IncompleteAnswerRule::defaults()[0];
        assert!(!rule.matches("Q?", "It handles somatosensory input."));
    }

    #[test]
    fn default_tables_compile() {
        let rules = rules();
        assert_eq!(rules.grammar.len(), 6);
        assert!(rules.canned.entries.len() > 20);
    }

    #[test]
    fn short_canned_answer_rejected() {
        let mut config = RepairConfig::default();
        config.canned.entries.push(CannedAnswer {
            keywords: vec!["gaba".into()],
            answer: "Inhibitory.".into(),
        });
        assert!(matches!(RuleSet::compile(&config), Err(Error::Config(_))));
    }

    #[test]
    fn bad_pattern_rejected() {
        let mut config = RepairConfig::default();
        config.grammar_rules.push(GrammarRule::new("broken", "(", Rewrite::Fixed("x?".into())));
        let err = RuleSet::compile(&config).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
