//! Review listing parsing
//!
//! This module handles:
//! - Splitting a listing page into article blocks
//! - Extracting one review record per block
//! - Reporting skipped blocks with a typed reason

mod html;

pub use html::*;

use crate::models::ReviewRecord;
use std::fmt;

/// Why an article block produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The block has no header link
    MissingIdentity,
    /// The header link could not be resolved against the page URL
    InvalidUrl(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingIdentity => f.write_str("no header link"),
            SkipReason::InvalidUrl(href) => write!(f, "unresolvable link '{}'", href),
        }
    }
}

/// Result of extracting a single article block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleOutcome {
    Extracted(ReviewRecord),
    Skipped(SkipReason),
}

/// All article outcomes of one listing page, in page order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub outcomes: Vec<ArticleOutcome>,
}

impl PageExtraction {
    /// True when the page had no article blocks at all
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            pending_space = true;
            continue;
        }

        if pending_space && !result.is_empty() {
            match newline_count {
                0 => result.push(' '),
                1 => result.push('\n'),
                _ => result.push_str("\n\n"),
            }
        }
        newline_count = 0;
        pending_space = false;
        result.push(c);
    }

    result
}

/// Trimmed, whitespace-normalized text; `None` when nothing is left
pub fn non_empty_text(text: &str) -> Option<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
