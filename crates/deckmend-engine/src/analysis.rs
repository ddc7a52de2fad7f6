//! The analysis document: what was read, what was extracted, which cards
//! would be built. Written as indented UTF-8 JSON between the `extract` and
//! `build`/`import` steps.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cards::{attach_answers, to_note};
use crate::config::ExtractConfig;
use crate::error::Result;
use crate::extract::{CandidatePair, ExtractStats, Extractor};
use crate::note::Note;
use crate::schema::NoteSchema;
use crate::source::{SourceFormat, SourceText, read_bytes};
use crate::text::word_count;
use crate::transcript::TranscriptStats;

/// Per-source reading statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStat {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub characters: usize,
    pub words: usize,
    pub readable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Quality signals for plain-text sources, which are usually transcripts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptStats>,
}

impl SourceStat {
    pub fn new(path: impl Into<PathBuf>, format: SourceFormat, text: &SourceText) -> Self {
        let path = path.into();
        match text {
            SourceText::Text(text) => Self {
                path,
                format,
                characters: text.chars().count(),
                words: word_count(text),
                readable: true,
                error: None,
                transcript: None,
            },
            SourceText::Unreadable { reason } => Self {
                path,
                format,
                characters: 0,
                words: 0,
                readable: false,
                error: Some(reason.clone()),
                transcript: None,
            },
        }
    }

    /// Attach transcript quality signals measured against `technical`.
    pub fn with_transcript(mut self, text: &str, technical: &[String]) -> Self {
        self.transcript = Some(TranscriptStats::measure(text, technical));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDocument {
    pub source_stats: Vec<SourceStat>,
    pub extracted_definitions: Vec<CandidatePair>,
    pub candidate_cards: Vec<Note>,
    #[serde(default)]
    pub extraction: ExtractStats,
    pub generation_date: DateTime<Utc>,
}

/// Where the cards of an analysis go.
#[derive(Debug, Clone)]
pub struct CardTarget<'a> {
    pub schema: &'a NoteSchema,
    pub deck: &'a str,
    pub course_tag: &'a str,
}

impl AnalysisDocument {
    /// Read every source, extract candidates from the combined text, and
    /// build cards for `target`. Unreadable sources are recorded and skipped.
    pub fn analyze(
        paths: &[PathBuf],
        extractor: &Extractor,
        config: &ExtractConfig,
        target: &CardTarget<'_>,
    ) -> Self {
        let mut source_stats = Vec::with_capacity(paths.len());
        let mut texts = Vec::new();

        for path in paths {
            let (format, text) = match std::fs::read(path) {
                Ok(bytes) => {
                    let format = SourceFormat::infer(path, &bytes);
                    (format, read_bytes(&bytes, format))
                }
                Err(e) => (
                    SourceFormat::from_path(path).unwrap_or(SourceFormat::Text),
                    SourceText::Unreadable {
                        reason: e.to_string(),
                    },
                ),
            };
            let mut stat = SourceStat::new(path, format, &text);
            match &text {
                SourceText::Text(text) => {
                    if format == SourceFormat::Text {
                        stat = stat.with_transcript(text, &extractor.vocabulary().technical);
                    }
                    texts.push(text.clone())
                }
                SourceText::Unreadable { reason } => {
                    warn!(path = %path.display(), reason = %reason, "skipping unreadable source")
                }
            }
            source_stats.push(stat);
        }

        let combined = texts.join("\n");
        let extraction = extractor.extract(&combined);
        let candidates = attach_answers(extraction.candidates, &combined, config);
        let candidate_cards: Vec<Note> = candidates
            .iter()
            .map(|c| to_note(c, target.schema, target.deck, target.course_tag))
            .collect();

        info!(
            sources = source_stats.len(),
            readable = texts.len(),
            candidates = candidates.len(),
            rejected = extraction.stats.rejected,
            merged = extraction.stats.merged,
            "analysis finished"
        );

        Self {
            source_stats,
            extracted_definitions: candidates,
            candidate_cards,
            extraction: extraction.stats,
            generation_date: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn analyze_reads_extracts_and_builds() {
        let dir = tempfile::tempdir().unwrap();
        let lecture = dir.path().join("lecture.txt");
        std::fs::write(
            &lecture,
            "Chapter 3\nParkinson's disease: Movement disorder caused by dopamine neuron loss.\n",
        )
        .unwrap();
        let missing = dir.path().join("missing.pdf");

        let config = Config::default();
        let extractor = Extractor::new(&config.extract, &config.vocabulary).unwrap();
        let schema = NoteSchema::basic();
        let target = CardTarget {
            schema: &schema,
            deck: "PSYC 2240",
            course_tag: "PSYC2240",
        };
        let doc = AnalysisDocument::analyze(&[lecture, missing], &extractor, &config.extract, &target);

        assert_eq!(doc.source_stats.len(), 2);
        assert!(doc.source_stats[0].readable);
        assert_eq!(doc.source_stats[0].format, SourceFormat::Text);
        assert!(!doc.source_stats[1].readable);
        assert_eq!(doc.source_stats[1].format, SourceFormat::Pdf);
        assert!(doc.source_stats[1].error.is_some());
        assert!(doc.source_stats[1].transcript.is_none());

        assert_eq!(doc.extracted_definitions.len(), 1);
        assert_eq!(doc.candidate_cards[0].question(&schema), "What is Parkinson's disease?");
        assert_eq!(doc.candidate_cards[0].deck, "PSYC 2240");
    }

    #[test]
    fn text_sources_carry_transcript_stats() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("lecture-04.txt");
        std::fs::write(
            &transcript,
            "12:05 Um, so the amygdala, you know, tags fear memories.\n12:40 ??? and the HPA axis.\n",
        )
        .unwrap();

        let config = Config::default();
        let extractor = Extractor::new(&config.extract, &config.vocabulary).unwrap();
        let schema = NoteSchema::basic();
        let target = CardTarget {
            schema: &schema,
            deck: "Neuro",
            course_tag: "NEURO",
        };
        let doc = AnalysisDocument::analyze(&[transcript], &extractor, &config.extract, &target);

        let stats = doc.source_stats[0].transcript.as_ref().unwrap();
        assert_eq!(stats.timestamps, 2);
        assert_eq!(stats.filler_words, 2);
        assert_eq!(stats.unclear_marks, 1);
        assert_eq!(stats.all_caps_words, 1);
        assert_eq!(stats.technical_terms, vec!["amygdala"]);
    }

    #[test]
    fn json_round_trip_through_file() {
        let doc = AnalysisDocument {
            source_stats: Vec::new(),
            extracted_definitions: Vec::new(),
            candidate_cards: vec![
                Note::new("Neuro", &NoteSchema::basic())
                    .with_field("Front", "What is GABA?")
                    .with_field("Back", "The main inhibitory \"neurotransmitter\"."),
            ],
            extraction: ExtractStats::default(),
            generation_date: Utc::now(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        doc.write_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"source_stats\""));
        assert!(raw.contains("\"generation_date\""));
        assert_eq!(AnalysisDocument::read_from(&path).unwrap(), doc);
    }
}
