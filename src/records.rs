// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript records and the catalog that loads them.
//!
//! Records are produced by the external extraction and normalization stages
//! and stored as `{"transcripts": [...]}`. Metadata fields may hold the
//! sentinel `UNKNOWN`; use [`known`] and [`known_list`] to read them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::{Error, Result};

/// Sentinel written by the extraction stage when a field could not be determined.
pub const UNKNOWN: &str = "UNKNOWN";

static ROLE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(AI:|User:)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Ai,
    User,
}

impl Role {
    /// Label used when composing embedding text.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Ai => "AI",
            Role::User => "USER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// A single interview transcript with its extracted metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(alias = "id")]
    pub transcript_id: String,
    #[serde(default)]
    pub split: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Raw `AI: ... User: ...` text, only used when `messages` is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, alias = "tools", skip_serializing_if = "Vec::is_empty")]
    pub ai_tools_mentioned: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, alias = "use_cases", skip_serializing_if = "Vec::is_empty")]
    pub primary_use_cases: Vec<String>,
    #[serde(default, alias = "pain_points", skip_serializing_if = "Vec::is_empty")]
    pub key_pain_points: Vec<String>,
    #[serde(default, alias = "project_summary", skip_serializing_if = "Option::is_none")]
    pub last_project_summary: Option<String>,

    // Normalized categories written by the normalization stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_normalized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_case_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pain_point_categories: Vec<String>,
}

impl TranscriptRecord {
    pub fn job_title(&self) -> Option<&str> {
        known(&self.job_title)
    }

    pub fn industry(&self) -> Option<&str> {
        known(&self.industry)
    }

    pub fn sentiment(&self) -> Option<&str> {
        known(&self.sentiment)
    }

    pub fn experience_level(&self) -> Option<&str> {
        known(&self.experience_level)
    }

    pub fn project_summary(&self) -> Option<&str> {
        known(&self.last_project_summary)
    }

    pub fn tools(&self) -> Vec<&str> {
        known_list(&self.ai_tools_mentioned)
    }

    pub fn use_cases(&self) -> Vec<&str> {
        known_list(&self.primary_use_cases)
    }

    pub fn pain_points(&self) -> Vec<&str> {
        known_list(&self.key_pain_points)
    }
}

/// Returns the trimmed value unless it is missing, empty or `UNKNOWN`.
pub fn known(value: &Option<String>) -> Option<&str> {
    value.as_deref().and_then(known_str)
}

fn known_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN) {
        None
    } else {
        Some(trimmed)
    }
}

/// Returns the known items of a list field, in order.
pub fn known_list(values: &[String]) -> Vec<&str> {
    values.iter().filter_map(|v| known_str(v)).collect()
}

/// Splits raw transcript text on `AI:` / `User:` markers into messages.
///
/// Text before the first marker is dropped, as are empty turns.
pub fn parse_transcript(text: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current: Option<Role> = None;
    let mut last = 0;

    for marker in ROLE_MARKER.find_iter(text) {
        push_turn(&mut messages, current, &text[last..marker.start()]);
        current = Some(if marker.as_str() == "AI:" {
            Role::Ai
        } else {
            Role::User
        });
        last = marker.end();
    }
    push_turn(&mut messages, current, &text[last..]);

    messages
}

fn push_turn(messages: &mut Vec<Message>, role: Option<Role>, part: &str) {
    let content = part.trim();
    if let (Some(role), false) = (role, content.is_empty()) {
        messages.push(Message {
            role,
            content: content.to_string(),
        });
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptFile {
    transcripts: Vec<TranscriptRecord>,
}

/// Per-transcript summary returned by [`TranscriptCatalog::list`].
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSummary {
    pub transcript_id: String,
    pub split: String,
    pub message_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

/// Read-only mapping of transcript ID to record, ordered by ID.
///
/// The order records appeared in the source file is kept alongside.
#[derive(Debug, Clone, Default)]
pub struct TranscriptCatalog {
    records: BTreeMap<String, TranscriptRecord>,
    file_order: Vec<String>,
}

impl TranscriptCatalog {
    /// Builds a catalog, rejecting empty or duplicate IDs.
    ///
    /// Records without `messages` get them parsed from `text`.
    pub fn from_records(records: Vec<TranscriptRecord>) -> Result<Self> {
        let mut map = BTreeMap::new();
        let mut file_order = Vec::with_capacity(records.len());
        for mut record in records {
            if record.transcript_id.trim().is_empty() {
                return Err(Error::data("transcript record with empty transcript_id"));
            }
            if record.messages.is_empty() {
                if let Some(text) = record.text.take() {
                    record.messages = parse_transcript(&text);
                }
            }
            let id = record.transcript_id.clone();
            if map.insert(id.clone(), record).is_some() {
                return Err(Error::data(format!("duplicate transcript_id '{}'", id)));
            }
            file_order.push(id);
        }
        Ok(Self {
            records: map,
            file_order,
        })
    }

    /// Loads `{"transcripts": [...]}` from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
        let file: TranscriptFile = serde_json::from_str(&content)
            .map_err(|e| Error::json(format!("failed to parse {}", path.display()), e))?;
        let catalog = Self::from_records(file.transcripts)?;
        tracing::debug!(count = catalog.len(), path = %path.display(), "loaded transcripts");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&TranscriptRecord> {
        self.records
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("transcript '{}'", id)))
    }

    pub fn records(&self) -> &BTreeMap<String, TranscriptRecord> {
        &self.records
    }

    /// Iterates records in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &TranscriptRecord> {
        self.records.values()
    }

    /// Iterates records in the order they were loaded.
    pub fn iter_file_order(&self) -> impl Iterator<Item = &TranscriptRecord> {
        self.file_order.iter().filter_map(|id| self.records.get(id))
    }

    /// Lists summaries in ID order, optionally restricted to one split.
    pub fn list(&self, split: Option<&str>) -> Vec<TranscriptSummary> {
        self.iter()
            .filter(|r| split.map_or(true, |s| r.split == s))
            .map(|r| TranscriptSummary {
                transcript_id: r.transcript_id.clone(),
                split: r.split.clone(),
                message_count: r.messages.len(),
                job_title: r.job_title.clone(),
                industry: r.industry.clone(),
                sentiment: r.sentiment.clone(),
            })
            .collect()
    }
}
