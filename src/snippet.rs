// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short previews of a transcript for search results.
//!
//! Lengths are counted in characters, not bytes.

use crate::records::Message;

/// Characters taken from the start of each message.
pub const FRAGMENT_CHARS: usize = 100;

/// Fragments are appended while the running total stays within this budget.
pub const SNIPPET_BUDGET: usize = 200;

/// Hard cap on the joined snippet before the ellipsis.
pub const SNIPPET_MAX_CHARS: usize = 250;

const FRAGMENT_SEPARATOR: &str = " ... ";

/// Builds the preview for a transcript's messages.
///
/// The fragment that pushes the running total over the budget is still
/// included; nothing after it is.
pub fn make_snippet(messages: &[Message]) -> String {
    let mut fragments = Vec::new();
    let mut total = 0;

    for message in messages {
        let fragment: String = message.content.chars().take(FRAGMENT_CHARS).collect();
        total += fragment.chars().count();
        fragments.push(fragment);
        if total > SNIPPET_BUDGET {
            break;
        }
    }

    let joined = fragments.join(FRAGMENT_SEPARATOR);
    if joined.chars().count() > SNIPPET_MAX_CHARS {
        let mut truncated: String = joined.chars().take(SNIPPET_MAX_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        joined
    }
}
