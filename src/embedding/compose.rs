// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding input text for a transcript.
//!
//! The transcript comes first, followed by each known metadata field under its
//! own label. Unknown fields are left out entirely rather than embedded as
//! empty sections.

use crate::errors::{Error, Result};
use crate::records::TranscriptRecord;

const SECTION_SEPARATOR: &str = "\n\n";

/// Composes the document text embedded for `record`.
///
/// Fails with a data error when the record has no messages to embed.
pub fn compose_embedding_text(record: &TranscriptRecord) -> Result<String> {
    if record.messages.is_empty() {
        return Err(Error::data(format!(
            "transcript '{}' has no messages to embed",
            record.transcript_id
        )));
    }

    let transcript = record
        .messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let mut sections = vec![format!("INTERVIEW TRANSCRIPT:\n{}", transcript)];

    if let Some(job_title) = record.job_title() {
        sections.push(format!("JOB TITLE: {}", job_title));
    }
    if let Some(industry) = record.industry() {
        sections.push(format!("INDUSTRY: {}", industry));
    }
    push_list(&mut sections, "AI TOOLS", &record.tools());
    push_list(&mut sections, "USE CASES", &record.use_cases());
    push_list(&mut sections, "PAIN POINTS", &record.pain_points());
    if let Some(summary) = record.project_summary() {
        sections.push(format!("PROJECT SUMMARY: {}", summary));
    }

    Ok(sections.join(SECTION_SEPARATOR))
}

fn push_list(sections: &mut Vec<String>, label: &str, values: &[&str]) {
    if !values.is_empty() {
        sections.push(format!("{}: {}", label, values.join(", ")));
    }
}
