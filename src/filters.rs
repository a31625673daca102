// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata filtering for search candidates.
//!
//! Split matches exactly, sentiment case-insensitively, and industry as a
//! case-insensitive substring of the raw industry field. An absent or empty
//! filter lets every record through.

use std::collections::BTreeSet;

use crate::records::TranscriptRecord;

/// Filters applied before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub split: Option<String>,
    pub sentiment: Option<String>,
    pub industry: Option<String>,
}

impl MetadataFilter {
    pub fn new(split: Option<String>, sentiment: Option<String>, industry: Option<String>) -> Self {
        Self {
            split: non_empty(split),
            sentiment: non_empty(sentiment),
            industry: non_empty(industry),
        }
    }

    /// True when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.split.is_none() && self.sentiment.is_none() && self.industry.is_none()
    }

    pub fn matches(&self, record: &TranscriptRecord) -> bool {
        matches_split(record, self.split.as_deref())
            && matches_sentiment(record, self.sentiment.as_deref())
            && matches_industry(record, self.industry.as_deref())
    }

    /// IDs of the records that pass every filter.
    pub fn filter<'a>(
        &self,
        records: impl IntoIterator<Item = &'a TranscriptRecord>,
    ) -> BTreeSet<String> {
        records
            .into_iter()
            .filter(|record| self.matches(record))
            .map(|record| record.transcript_id.clone())
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Check if the record belongs to the given split
pub fn matches_split(record: &TranscriptRecord, split: Option<&str>) -> bool {
    match split {
        Some(split) if !split.is_empty() => record.split == split,
        _ => true,
    }
}

/// Check sentiment, ignoring case; an unknown sentiment never matches
pub fn matches_sentiment(record: &TranscriptRecord, sentiment: Option<&str>) -> bool {
    match sentiment {
        Some(wanted) if !wanted.trim().is_empty() => record
            .sentiment()
            .map_or(false, |s| s.eq_ignore_ascii_case(wanted.trim())),
        _ => true,
    }
}

/// Check the raw industry field for a case-insensitive substring
pub fn matches_industry(record: &TranscriptRecord, industry: Option<&str>) -> bool {
    match industry {
        Some(needle) if !needle.trim().is_empty() => record.industry().map_or(false, |raw| {
            raw.to_lowercase().contains(&needle.trim().to_lowercase())
        }),
        _ => true,
    }
}
