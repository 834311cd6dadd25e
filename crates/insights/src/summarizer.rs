//! Language-Model Summaries

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;
use telemetry::{Bin, Reading};
use tracing::{debug, error, warn};

use crate::stats::WeeklyStats;
use crate::InsightError;

/// Shown when no API key is configured
pub const MISSING_API_KEY: &str = "API Key not found. Please check your environment configuration.";
/// Shown when the model call fails
pub const FAILED_ANALYSIS: &str = "Failed to analyze data. Please try again later.";
/// Shown when the model answers with nothing
pub const EMPTY_ANALYSIS: &str = "Could not generate analysis.";

/// Readings included in a request
const RECENT_READINGS: usize = 10;

/// Summarization client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            api_key_env: "API_KEY".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Everything the model is told about a bin
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub name: String,
    pub location: String,
    pub height_cm: f64,
    /// Up to the last ten readings, oldest first
    pub recent: Vec<Reading>,
    pub weekly: Option<WeeklyStats>,
}

impl SummaryRequest {
    pub fn from_bin(bin: &Bin) -> Self {
        Self {
            name: bin.name.clone(),
            location: bin.location.clone(),
            height_cm: bin.height_cm,
            recent: bin.recent(RECENT_READINGS).cloned().collect(),
            weekly: WeeklyStats::from_history(&bin.history),
        }
    }

    /// Prompt text sent to the model
    pub fn prompt(&self) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "You are advising a facility manager on waste collection.");
        let _ = writeln!(prompt, "Bin: {}", self.name);
        let _ = writeln!(prompt, "Location: {}", self.location);
        let _ = writeln!(prompt, "Capacity (height): {}cm", self.height_cm);
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Recent readings:");
        for reading in &self.recent {
            let _ = writeln!(
                prompt,
                "Time: {}, Fill: {}%",
                reading.timestamp.format("%H:%M:%S"),
                reading.fill_percentage
            );
        }

        if let Some(weekly) = &self.weekly {
            let _ = writeln!(prompt);
            let _ = writeln!(prompt, "Weekly pattern:");
            let _ = writeln!(prompt, "Average fill rate: {:.1}% per hour", weekly.average_fill_rate);
            let _ = writeln!(prompt, "Peak day: {}", weekly.peak_day);
            let _ = writeln!(prompt, "Peak hour: {:02}:00 UTC", weekly.peak_hour);
        }

        let _ = writeln!(prompt);
        let _ = writeln!(
            prompt,
            "Reply with exactly three short bullet points covering: peak usage times, \
             how the pickup schedule could be optimized, and any anomalies such as \
             sudden spikes or overflow risk."
        );
        prompt
    }
}

/// Produces free-text advice for a bin
pub trait Summarizer: Send + Sync {
    fn summarize(&self, request: &SummaryRequest) -> impl Future<Output = Result<String, InsightError>> + Send;
}

/// Client for the Gemini `generateContent` REST endpoint
pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_key: Option<String>,
    config: InsightsConfig,
}

impl GeminiSummarizer {
    /// Build a client, reading the API key from the configured env var
    pub fn from_config(config: InsightsConfig) -> Result<Self, InsightError> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("{} is not set; bin analysis will return a fallback message", config.api_key_env);
        }
        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicit key
    pub fn with_api_key(config: InsightsConfig, api_key: Option<String>) -> Result<Self, InsightError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<String, InsightError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| InsightError::MissingCredentials(self.config.api_key_env.clone()))?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": request.prompt() }] }]
        });

        debug!("Requesting summary for {} from {}", request.name, self.config.model);
        let response: Value = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract_text(&response)
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: &Value) -> Result<String, InsightError> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| InsightError::InvalidResponse("no candidate content".to_string()))?;

    Ok(parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(""))
}

/// Summarize a bin, degrading every failure to a fixed message
pub async fn analyze_bin<S: Summarizer>(summarizer: &S, bin: &Bin) -> String {
    let request = SummaryRequest::from_bin(bin);
    match summarizer.summarize(&request).await {
        Ok(text) if text.trim().is_empty() => EMPTY_ANALYSIS.to_string(),
        Ok(text) => text,
        Err(InsightError::MissingCredentials(var)) => {
            warn!("Analysis of {} skipped: {} not set", bin.id, var);
            MISSING_API_KEY.to_string()
        }
        Err(e) => {
            error!("Analysis of {} failed: {}", bin.id, e);
            FAILED_ANALYSIS.to_string()
        }
    }
}

/// Split model output into display bullets, dropping `- ` then `1. ` markers
pub fn bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = line.strip_prefix("- ").unwrap_or(line);
            strip_number_marker(line).to_string()
        })
        .collect()
}

/// Remove a leading single-digit `N.` plus one whitespace char of any width
fn strip_number_marker(line: &str) -> &str {
    let mut chars = line.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(d), Some('.'), Some(s)) if d.is_ascii_digit() && s.is_whitespace() => chars.as_str(),
        _ => line,
    }
}
