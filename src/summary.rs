// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frequency summary of transcript metadata.
//!
//! Unknown values never land in a bucket; each field counts them separately
//! under `unknown`. For list fields, a record counts as unknown when it has no
//! known items at all.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::records::{known, known_list, TranscriptRecord};

/// One bucket of a frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Frequency table for one metadata field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    /// Sorted by count descending, then value ascending
    pub counts: Vec<ValueCount>,
    pub unknown: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataSummary {
    pub total: usize,
    pub splits: BTreeMap<String, usize>,
    pub sentiment: FieldSummary,
    pub experience_level: FieldSummary,
    pub industry: FieldSummary,
    pub job_category: FieldSummary,
    pub tools: FieldSummary,
    pub use_cases: FieldSummary,
    pub pain_points: FieldSummary,
}

#[derive(Default)]
struct Tally {
    counts: HashMap<String, usize>,
    unknown: usize,
}

impl Tally {
    fn add(&mut self, value: Option<&str>) {
        match value {
            Some(v) => *self.counts.entry(v.to_string()).or_insert(0) += 1,
            None => self.unknown += 1,
        }
    }

    fn add_all(&mut self, values: &[&str]) {
        if values.is_empty() {
            self.unknown += 1;
        }
        for value in values {
            *self.counts.entry(value.to_string()).or_insert(0) += 1;
        }
    }

    fn finish(self) -> FieldSummary {
        let mut counts: Vec<ValueCount> = self
            .counts
            .into_iter()
            .map(|(value, count)| ValueCount { value, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
        FieldSummary {
            counts,
            unknown: self.unknown,
        }
    }
}

/// Summarizes metadata across `records`, optionally restricted to one split.
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a TranscriptRecord>,
    split: Option<&str>,
) -> MetadataSummary {
    let mut total = 0;
    let mut splits = BTreeMap::new();
    let mut sentiment = Tally::default();
    let mut experience_level = Tally::default();
    let mut industry = Tally::default();
    let mut job_category = Tally::default();
    let mut tools = Tally::default();
    let mut use_cases = Tally::default();
    let mut pain_points = Tally::default();

    for record in records
        .into_iter()
        .filter(|r| split.map_or(true, |s| r.split == s))
    {
        total += 1;
        *splits.entry(record.split.clone()).or_insert(0) += 1;

        let lowered = record.sentiment().map(str::to_lowercase);
        sentiment.add(lowered.as_deref());
        experience_level.add(record.experience_level());
        industry.add(known(&record.industry_normalized).or_else(|| record.industry()));
        job_category.add(known(&record.job_category).or_else(|| record.job_title()));
        tools.add_all(&record.tools());
        use_cases.add_all(&categories_or(&record.use_case_categories, record.use_cases()));
        pain_points.add_all(&categories_or(&record.pain_point_categories, record.pain_points()));
    }

    MetadataSummary {
        total,
        splits,
        sentiment: sentiment.finish(),
        experience_level: experience_level.finish(),
        industry: industry.finish(),
        job_category: job_category.finish(),
        tools: tools.finish(),
        use_cases: use_cases.finish(),
        pain_points: pain_points.finish(),
    }
}

fn categories_or<'a>(categories: &'a [String], raw: Vec<&'a str>) -> Vec<&'a str> {
    let categories = known_list(categories);
    if categories.is_empty() {
        raw
    } else {
        categories
    }
}
