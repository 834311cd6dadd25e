//! Bin Insights
//!
//! Aggregates fill history into usage statistics and asks a language model
//! for a short advisory summary. Every failure degrades to a fixed,
//! human-readable fallback message.

mod stats;
mod summarizer;

pub use stats::WeeklyStats;
pub use summarizer::{
    analyze_bin, bullet_lines, GeminiSummarizer, InsightsConfig, Summarizer, SummaryRequest,
    EMPTY_ANALYSIS, FAILED_ANALYSIS, MISSING_API_KEY,
};

use thiserror::Error;

/// Summarization errors
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("API key not configured (env var {0})")]
    MissingCredentials(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}
