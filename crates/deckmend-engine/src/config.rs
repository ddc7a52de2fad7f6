//! TOML configuration.
//!
//! Every table has a built-in default, so an empty file is a valid
//! configuration and users override only what they need:
//!
//! ```toml
//! [repair]
//! min_answer_words = 10
//! placeholder_policy = "drop"
//!
//! [[repair.canned.entries]]
//! keywords = ["gaba"]
//! answer = "GABA is the main inhibitory neurotransmitter of the adult central nervous system."
//!
//! [vocabulary]
//! high = ["aphasia", "amnesia"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rules::{CannedAnswers, GrammarRule, IncompleteAnswerRule};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub anki: AnkiConfig,
    pub batch: BatchConfig,
    pub extract: ExtractConfig,
    pub vocabulary: VocabularyConfig,
    pub repair: RepairConfig,
}

impl Config {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Where AnkiConnect listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnkiConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl AnkiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch sizing and retry policy for store writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 50,
            max_attempts: 3,
            backoff_ms: 200,
        }
    }
}

/// Extractor thresholds and word lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub objective_min_chars: usize,
    pub objective_max_chars: usize,
    pub definition_min_chars: usize,
    pub definition_max_chars: usize,
    /// Bounds on the described part of a process sentence.
    pub process_min_chars: usize,
    pub process_max_chars: usize,
    /// An objective must contain one of these verbs.
    pub action_verbs: Vec<String>,
    /// Case-insensitive regexes; any hit rejects a candidate.
    pub blocklist: Vec<String>,
    /// Words that never make a definition term on their own.
    pub stopwords: Vec<String>,
    /// Maximum length of an answer pulled from source text for an objective.
    pub answer_max_chars: usize,
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            objective_min_chars: 20,
            objective_max_chars: 200,
            definition_min_chars: 10,
            definition_max_chars: 300,
            process_min_chars: 20,
            process_max_chars: 150,
            action_verbs: strings(&[
                "define",
                "explain",
                "describe",
                "identify",
                "analyze",
                "compare",
                "contrast",
                "evaluate",
                "apply",
                "understand",
                "recognize",
                "distinguish",
                "demonstrate",
                "discuss",
                "examine",
                "interpret",
            ]),
            blocklist: strings(&[
                r"\bi\s+(?:think|feel|like|remember)\b",
                r"\b(?:professor|instructor|teacher)\b",
                r"\b(?:homework|assignment)\b",
                r"\bdue\s+(?:date|on|by|next|tomorrow)\b",
                r"\b(?:next week|last week|today)\b",
            ]),
            stopwords: strings(&[
                "a", "an", "the", "this", "that", "these", "those", "it", "its", "there", "here",
                "what", "which", "who", "whom", "whose", "when", "where", "why", "how", "he", "she",
                "they", "we", "you", "i", "one", "each", "all", "some", "many", "most", "such",
                "and", "or", "but", "if", "so", "also", "then", "thus", "however", "example",
            ]),
            answer_max_chars: 200,
        }
    }
}

/// Keyword lists for relevance filtering and priority scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// A definition must mention one of these to be kept.
    pub domain: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
    /// Terms a transcriber is likely to mishear; listed per transcript.
    pub technical: Vec<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            domain: strings(&[
                "brain", "neuro", "neural", "neuron", "cortex", "cortical", "lobe", "memory",
                "synap", "axon", "dendrite", "myelin", "transmitter", "dopamine", "serotonin",
                "acetylcholine", "gaba", "glutamate", "receptor", "hormone", "cerebr",
                "cerebellum", "hippocamp", "amygdala", "thalamus", "hypothalamus", "ganglia",
                "brainstem", "spinal", "nerve", "sensory", "motor", "cognit", "behavior",
                "emotion", "learning", "attention", "perception", "language", "sleep",
                "disease", "disorder", "syndrome", "lesion", "aphasia", "amnesia", "plasticity",
                "potential", "membrane", "glia", "psych",
            ]),
            high: strings(&[
                "disease",
                "disorder",
                "syndrome",
                "parkinson",
                "alzheimer",
                "huntington",
                "schizophrenia",
                "aphasia",
                "amnesia",
                "hippocampus",
                "amygdala",
                "cerebellum",
                "brainstem",
                "frontal lobe",
                "temporal lobe",
                "parietal lobe",
                "occipital lobe",
                "thalamus",
            ]),
            medium: strings(&[
                "neuron",
                "synapse",
                "neurotransmitter",
                "dopamine",
                "serotonin",
                "acetylcholine",
                "action potential",
                "myelin",
                "axon",
                "dendrite",
                "cortex",
                "memory",
                "receptor",
                "plasticity",
            ]),
            technical: strings(&[
                "neuron",
                "synapse",
                "neurotransmitter",
                "dopamine",
                "serotonin",
                "cortex",
                "hippocampus",
                "amygdala",
                "cerebellum",
                "brainstem",
                "action potential",
                "myelin",
                "axon",
                "dendrite",
                "plasticity",
                "GABA",
                "acetylcholine",
                "norepinephrine",
                "vestibular",
            ]),
        }
    }
}

/// What the normalizer does with placeholder answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// Replace with a canned answer looked up from the question.
    #[default]
    Substitute,
    /// Mark the note dropped; it is never written.
    Drop,
}

/// Repair thresholds and rule tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub min_answer_words: usize,
    pub placeholder_policy: PlaceholderPolicy,
    /// Case-insensitive phrases that mark an answer as a placeholder.
    pub placeholders: Vec<String>,
    /// Appended to short answers no rule or canned entry covers.
    pub clarifying_clause: String,
    pub grammar_rules: Vec<GrammarRule>,
    pub canned: CannedAnswers,
    pub incomplete_rules: Vec<IncompleteAnswerRule>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            min_answer_words: 8,
            placeholder_policy: PlaceholderPolicy::default(),
            placeholders: strings(&[
                "review this concept",
                "content needs verification",
                "review this answer",
                "needs review",
                "answer to be extracted",
            ]),
            clarifying_clause:
                "This process is essential for proper neural communication and brain function."
                    .to_string(),
            grammar_rules: GrammarRule::defaults(),
            canned: CannedAnswers::default(),
            incomplete_rules: IncompleteAnswerRule::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rewrite;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [repair]
            min_answer_words = 10
            placeholder_policy = "drop"

            [batch]
            size = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.repair.min_answer_words, 10);
        assert_eq!(config.repair.placeholder_policy, PlaceholderPolicy::Drop);
        assert_eq!(config.batch.size, 10);
        assert_eq!(config.batch.max_attempts, 3);
        assert_eq!(config.repair.grammar_rules.len(), 6);
        assert_eq!(config.anki.port, 8765);
    }

    #[test]
    fn grammar_rules_from_toml() {
        let config = Config::parse(
            r#"
            [[repair.grammar_rules]]
            name = "whats"
            pattern = "(?i)^whats (.+)$"
            rewrite = { template = "What is $1" }
            "#,
        )
        .unwrap();
        assert_eq!(config.repair.grammar_rules.len(), 1);
        assert_eq!(
            config.repair.grammar_rules[0].rewrite,
            Rewrite::Template("What is $1".into())
        );
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = Config::parse("[repair\nmin_answer_words = 1").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deckmend.toml");
        std::fs::write(&path, "[anki]\nport = 9000\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.anki.port, 9000);
    }
}
