//! Concept extraction from normalized source text.
//!
//! Rules run in a fixed order and a line claimed by an earlier rule is not
//! looked at again:
//!
//! 1. Learning objectives: lines after an `Objectives`/`LOQ` marker, plus
//!    numbered or bulleted lines that open with an action verb.
//! 2. Definitions: `Term: definition`, `Term is/are/refers to/means ...`,
//!    and `Term (definition)` sentences in the remaining lines.
//! 3. Processes: sentences no definition rule matched that open with a
//!    trigger, either `When/If/During <condition>, <what happens>` or
//!    `The process of <name> <verb>s ...`.
//!
//! Candidates then pass a validity filter, a domain relevance filter
//! (definitions and processes), deduplication by normalized term, and
//! priority scoring.
//!
//! # Example
//!
//! ```
//! use deckmend_engine::config::Config;
//! use deckmend_engine::extract::Extractor;
//! use deckmend_engine::Priority;
//!
//! let config = Config::default();
//! let extractor = Extractor::new(&config.extract, &config.vocabulary).unwrap();
//! let found = extractor.extract("Parkinson's disease: Movement disorder caused by dopamine neuron loss.");
//!
//! assert_eq!(found.candidates[0].term, "Parkinson's disease");
//! assert_eq!(found.candidates[0].priority, Priority::High);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ExtractConfig, VocabularyConfig};
use crate::error::{Error, Result};
use crate::note::Priority;
use crate::text::sentence_spans;

/// What a candidate will become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Objective,
    Definition,
    Process,
}

impl CandidateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CandidateKind::Objective => "objective",
            CandidateKind::Definition => "definition",
            CandidateKind::Process => "process",
        }
    }
}

/// Which rule produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRule {
    MarkedObjective,
    NumberedObjective,
    BulletObjective,
    ColonDefinition,
    CopulaDefinition,
    Parenthetical,
    ProcessTrigger,
}

impl ExtractionRule {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionRule::MarkedObjective => "marked_objective",
            ExtractionRule::NumberedObjective => "numbered_objective",
            ExtractionRule::BulletObjective => "bullet_objective",
            ExtractionRule::ColonDefinition => "colon_definition",
            ExtractionRule::CopulaDefinition => "copula_definition",
            ExtractionRule::Parenthetical => "parenthetical",
            ExtractionRule::ProcessTrigger => "process_trigger",
        }
    }

    pub fn kind(self) -> CandidateKind {
        match self {
            ExtractionRule::MarkedObjective
            | ExtractionRule::NumberedObjective
            | ExtractionRule::BulletObjective => CandidateKind::Objective,
            ExtractionRule::ProcessTrigger => CandidateKind::Process,
            _ => CandidateKind::Definition,
        }
    }
}

/// A term or objective found in source text, not yet a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePair {
    /// The defined term, the objective statement itself, or a process
    /// trigger such as `during slow-wave sleep`.
    pub term: String,
    /// The definition text, the objective statement, or what happens.
    pub body: String,
    pub kind: CandidateKind,
    pub priority: Priority,
    pub source: ExtractionRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    /// Candidates rejected by the validity or relevance filters.
    pub rejected: usize,
    /// Candidates folded into an earlier one with the same term.
    pub merged: usize,
    /// Accepted hits per rule, before deduplication.
    pub per_rule: BTreeMap<ExtractionRule, usize>,
}

/// Result of [`Extractor::extract`]. An empty candidate list is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub candidates: Vec<CandidatePair>,
    pub stats: ExtractStats,
}

static OBJECTIVE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:learning\s+objectives?|loqs?|objectives?)\b\s*:?\s*(.*)$").unwrap()
});
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}[.)]\s+(.+)$").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[•*\-–]\s*(.+)$").unwrap());
static INLINE_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";|\s\d{1,2}[.)]\s|•").unwrap());
static CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^chapter\s+(\d{1,3})\b").unwrap());
static COLON_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][\w'’-]*(?:\s+[\w'’-]+){0,3})\s*:\s+(.+)$").unwrap()
});
static COPULA_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z][\w'’-]*(?:\s+[\w'’-]+){0,3}?)\s+(?:is|are|refers\s+to|means)\s+(.+)$")
        .unwrap()
});
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-zA-Z\s]{2,20})\s*\(([^)]{10,150})\)").unwrap());
static CONDITION_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(when|if|during)\s+([^,]{3,80}?)\s*,\s*(.+?)[.!]?$").unwrap()
});
// The name is the shortest run of one to three words followed by a verb in `-s`.
static PROCESS_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^the\s+process\s+of\s+((?:[\w'’-]+\s+){0,2}?[\w'’-]+)\s+([a-z]+s\b.*?)[.!]?$")
        .unwrap()
});
const TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Priority from the vocabulary: any `high` keyword, else any `medium`, else low.
pub fn score_priority(text: &str, vocabulary: &VocabularyConfig) -> Priority {
    let lower = text.to_lowercase();
    let hit = |list: &[String]| list.iter().any(|kw| lower.contains(&kw.to_lowercase()));
    if hit(&vocabulary.high) {
        Priority::High
    } else if hit(&vocabulary.medium) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Dedup key: lowercase, single spaces, no trailing punctuation.
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(TRAILING_PUNCT)
        .to_string()
}

/// Rule-based concept extractor.
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractConfig,
    vocabulary: VocabularyConfig,
    blocklist: Vec<Regex>,
}

struct Raw {
    term: String,
    body: String,
    source: ExtractionRule,
    chapter: Option<String>,
}

impl Extractor {
    /// Build an extractor, compiling the blocklist patterns.
    pub fn new(config: &ExtractConfig, vocabulary: &VocabularyConfig) -> Result<Self> {
        let blocklist = config
            .blocklist
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?i){}", pattern))
                    .map_err(|e| Error::Config(format!("blocklist pattern {:?}: {}", pattern, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config: config.clone(),
            vocabulary: vocabulary.clone(),
            blocklist,
        })
    }

    pub fn vocabulary(&self) -> &VocabularyConfig {
        &self.vocabulary
    }

    /// Extract deduplicated, scored candidates from normalized text.
    pub fn extract(&self, text: &str) -> Extraction {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let chapters = chapter_per_line(&lines);
        let mut consumed = vec![false; lines.len()];
        let mut raw = Vec::new();

        self.collect_objectives(&lines, &chapters, &mut consumed, &mut raw);
        for (i, line) in lines.iter().enumerate() {
            if consumed[i] || line.is_empty() {
                continue;
            }
            for sentence in sentence_spans(line) {
                let sentence = sentence.trim();
                let found = match_definition(sentence).or_else(|| match_process(sentence));
                if let Some((term, body, source)) = found {
                    raw.push(Raw {
                        term,
                        body,
                        source,
                        chapter: chapters[i].clone(),
                    });
                }
            }
        }

        let mut stats = ExtractStats::default();
        let mut candidates: Vec<CandidatePair> = Vec::new();
        let mut by_term: HashMap<String, usize> = HashMap::new();

        for item in raw {
            if let Err(reason) = self.validate(&item) {
                debug!(term = %item.term, rule = item.source.as_str(), reason, "rejected candidate");
                stats.rejected += 1;
                continue;
            }
            *stats.per_rule.entry(item.source).or_default() += 1;

            let priority =
                score_priority(&format!("{} {}", item.term, item.body), &self.vocabulary);
            let candidate = CandidatePair {
                term: item.term,
                body: item.body,
                kind: item.source.kind(),
                priority,
                source: item.source,
                chapter: item.chapter,
            };

            let key = normalize_term(&candidate.term);
            match by_term.get(&key) {
                Some(&index) => {
                    stats.merged += 1;
                    let kept = &candidates[index];
                    let better = candidate.priority > kept.priority
                        || (candidate.priority == kept.priority
                            && candidate.body.len() > kept.body.len());
                    if better {
                        candidates[index] = candidate;
                    }
                }
                None => {
                    by_term.insert(key, candidates.len());
                    candidates.push(candidate);
                }
            }
        }

        debug!(
            candidates = candidates.len(),
            rejected = stats.rejected,
            merged = stats.merged,
            "extraction finished"
        );
        Extraction { candidates, stats }
    }

    fn collect_objectives(
        &self,
        lines: &[&str],
        chapters: &[Option<String>],
        consumed: &mut [bool],
        raw: &mut Vec<Raw>,
    ) {
        let mut in_block = false;
        for (i, line) in lines.iter().enumerate() {
            let push = |raw: &mut Vec<Raw>, body: &str, source| {
                for objective in split_objectives(body) {
                    raw.push(Raw {
                        term: objective.clone(),
                        body: objective,
                        source,
                        chapter: chapters[i].clone(),
                    });
                }
            };

            if let Some(caps) = OBJECTIVE_MARKER.captures(line) {
                in_block = true;
                consumed[i] = true;
                let rest = caps.get(1).map_or("", |m| m.as_str());
                push(raw, rest, ExtractionRule::MarkedObjective);
                continue;
            }
            if CHAPTER.is_match(line) || line.is_empty() {
                in_block = false;
                continue;
            }

            let listed = NUMBERED
                .captures(line)
                .map(|c| (c, ExtractionRule::NumberedObjective))
                .or_else(|| BULLET.captures(line).map(|c| (c, ExtractionRule::BulletObjective)));

            match listed {
                Some((caps, source)) => {
                    let body = caps.get(1).map_or("", |m| m.as_str());
                    if in_block || self.starts_with_action_verb(body) {
                        consumed[i] = true;
                        push(raw, body, source);
                    }
                }
                None if in_block && self.starts_with_action_verb(line) => {
                    consumed[i] = true;
                    push(raw, line, ExtractionRule::MarkedObjective);
                }
                None => in_block = false,
            }
        }
    }

    fn starts_with_action_verb(&self, text: &str) -> bool {
        let first = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        self.config.action_verbs.iter().any(|v| *v == first)
    }

    fn contains_action_verb(&self, text: &str) -> bool {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|word| {
                let word = word.to_lowercase();
                self.config.action_verbs.iter().any(|v| *v == word)
            })
    }

    fn validate(&self, item: &Raw) -> std::result::Result<(), &'static str> {
        let combined = format!("{} {}", item.term, item.body);
        if self.blocklist.iter().any(|re| re.is_match(&combined)) {
            return Err("blocklisted");
        }
        let len = item.body.chars().count();
        match item.source.kind() {
            CandidateKind::Objective => {
                if len < self.config.objective_min_chars || len > self.config.objective_max_chars {
                    return Err("objective length");
                }
                if !self.contains_action_verb(&item.body) {
                    return Err("no action verb");
                }
            }
            CandidateKind::Definition => {
                if len < self.config.definition_min_chars || len > self.config.definition_max_chars
                {
                    return Err("definition length");
                }
                let first = item
                    .term
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_lowercase();
                if first.is_empty() || self.config.stopwords.iter().any(|s| *s == first) {
                    return Err("stopword term");
                }
                self.check_relevance(&combined)?;
            }
            CandidateKind::Process => {
                if len < self.config.process_min_chars || len > self.config.process_max_chars {
                    return Err("process length");
                }
                self.check_relevance(&combined)?;
            }
        }
        Ok(())
    }

    fn check_relevance(&self, text: &str) -> std::result::Result<(), &'static str> {
        let lower = text.to_lowercase();
        let relevant = self
            .vocabulary
            .domain
            .iter()
            .any(|kw| lower.contains(&kw.to_lowercase()));
        if relevant { Ok(()) } else { Err("off-topic") }
    }
}

fn chapter_per_line(lines: &[&str]) -> Vec<Option<String>> {
    let mut current = None;
    lines
        .iter()
        .map(|line| {
            if let Some(caps) = CHAPTER.captures(line) {
                current = caps.get(1).map(|n| format!("Chapter {}", n.as_str()));
            }
            current.clone()
        })
        .collect()
}

/// Split an objective body on `;`, inline numbering, and bullets.
fn split_objectives(body: &str) -> Vec<String> {
    INLINE_DELIMITER
        .split(body)
        .map(|part| {
            let part = part.trim();
            let part = NUMBERED
                .captures(part)
                .or_else(|| BULLET.captures(part))
                .and_then(|c| c.get(1))
                .map_or(part, |m| m.as_str());
            part.trim().to_string()
        })
        .filter(|part| !part.is_empty())
        .collect()
}

const ARTICLES: &[&str] = &["a ", "an ", "the "];

fn strip_article(term: &str) -> &str {
    let lower = term.to_lowercase();
    ARTICLES
        .iter()
        .find(|a| lower.starts_with(*a))
        .map_or(term, |a| term[a.len()..].trim_start())
}

fn match_definition(sentence: &str) -> Option<(String, String, ExtractionRule)> {
    if let Some(caps) = COLON_DEFINITION.captures(sentence) {
        return Some((
            caps[1].trim().to_string(),
            caps[2].trim().to_string(),
            ExtractionRule::ColonDefinition,
        ));
    }
    if let Some(caps) = COPULA_DEFINITION.captures(sentence) {
        return Some((
            strip_article(caps[1].trim()).to_string(),
            caps[2].trim().to_string(),
            ExtractionRule::CopulaDefinition,
        ));
    }
    PARENTHETICAL.captures(sentence).map(|caps| {
        (
            caps[1].trim().to_string(),
            caps[2].trim().to_string(),
            ExtractionRule::Parenthetical,
        )
    })
}

fn match_process(sentence: &str) -> Option<(String, String, ExtractionRule)> {
    if sentence.ends_with('?') {
        return None;
    }
    if let Some(caps) = CONDITION_TRIGGER.captures(sentence) {
        return Some((
            format!("{} {}", caps[1].to_lowercase(), caps[2].trim()),
            caps[3].trim().to_string(),
            ExtractionRule::ProcessTrigger,
        ));
    }
    PROCESS_OF.captures(sentence).map(|caps| {
        let name = caps[1].trim();
        (
            format!("the process of {}", name),
            format!("{} {}", name, caps[2].trim()),
            ExtractionRule::ProcessTrigger,
        )
    })
}
