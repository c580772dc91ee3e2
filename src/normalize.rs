use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::{Diagnostic, PipelineError, Result};

static REPLY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?:回复|Reply)[^\]]*\]").expect("valid reply regex"));

/// One or more bracketed tokens (`[图片]`, `[图片][表情]`) and nothing else.
static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*\[[^\[\]]*\])+\s*$").expect("valid placeholder regex")
});

/// Textual encodings tried in order, after a trailing `Z` has been removed.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Numeric timestamps above this are epoch milliseconds.
const MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContent {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSender {
    #[serde(default)]
    pub name: Option<String>,
}

/// One record of the exported transcript, as found on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub content: Option<RawContent>,
    #[serde(default)]
    pub sender: Option<RawSender>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl RawMessage {
    /// Convenience constructor, mostly for tests and embedding.
    pub fn new(sender: &str, text: &str, timestamp: Value) -> Self {
        Self {
            content: Some(RawContent {
                text: Some(text.to_string()),
            }),
            sender: Some(RawSender {
                name: Some(sender.to_string()),
            }),
            timestamp: Some(timestamp),
        }
    }

    fn text(&self) -> &str {
        self.content
            .as_ref()
            .and_then(|c| c.text.as_deref())
            .unwrap_or("")
    }

    fn sender_name(&self) -> &str {
        self.sender
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or("Unknown")
    }
}

/// A surviving message; `index` is its position in the filtered sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub index: usize,
    pub sender: String,
    pub timestamp: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub messages: Vec<NormalizedMessage>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses an input document and returns its `messages` array.
pub fn parse_input(json: &str) -> Result<Vec<RawMessage>> {
    let doc: Value = serde_json::from_str(json)?;
    let messages = match doc {
        Value::Object(mut map) => map.remove("messages"),
        _ => None,
    }
    .ok_or_else(|| PipelineError::MalformedInput("missing top-level `messages` array".into()))?;
    if !messages.is_array() {
        return Err(PipelineError::MalformedInput(
            "`messages` is not an array".into(),
        ));
    }
    serde_json::from_value(messages).map_err(|e| PipelineError::MalformedInput(e.to_string()))
}

/// Removes reply citations and trims. Returns `None` if the message should be dropped.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = REPLY_PATTERN.replace_all(text, "");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() < 2 || PLACEHOLDER_PATTERN.is_match(cleaned) {
        return None;
    }
    Some(cleaned.to_string())
}

fn epoch_seconds(value: f64) -> f64 {
    if value > MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    }
}

fn naive_to_seconds(dt: NaiveDateTime) -> f64 {
    let utc = dt.and_utc();
    utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_micros()) / 1_000_000.0
}

/// Parses a textual timestamp into epoch seconds. Naive date-times are read as UTC.
/// Empty and `"None"` give 0; `None` means the value is unparseable.
pub fn parse_timestamp_str(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "None" {
        return Some(0.0);
    }
    if let Ok(value) = raw.parse::<f64>() {
        if value.is_finite() {
            return Some(epoch_seconds(value));
        }
    }
    let clean = raw.strip_suffix('Z').unwrap_or(raw);
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(clean, fmt) {
            return Some(naive_to_seconds(dt));
        }
    }
    NaiveDate::parse_from_str(clean, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(naive_to_seconds)
}

/// Parses any JSON timestamp value into epoch seconds.
pub fn parse_timestamp(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Number(n) => n.as_f64().map(epoch_seconds),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// Filters and cleans raw messages, re-indexing survivors from 0.
pub fn normalize(raw: &[RawMessage], config: &PipelineConfig) -> Normalized {
    let skip = config
        .max_messages
        .map_or(0, |max| raw.len().saturating_sub(max));
    if skip > 0 {
        debug!("Keeping the last {} of {} messages", raw.len() - skip, raw.len());
    }

    let mut out = Normalized::default();
    for msg in &raw[skip..] {
        let Some(text) = clean_text(msg.text()) else {
            continue;
        };
        let index = out.messages.len();
        let timestamp = match msg.timestamp.as_ref() {
            None => 0.0,
            Some(value) => parse_timestamp(value).unwrap_or_else(|| {
                let raw = value.to_string();
                warn!("Unable to parse timestamp {raw} of message {index}");
                out.diagnostics
                    .push(Diagnostic::TimestampParse { index, raw });
                0.0
            }),
        };
        out.messages.push(NormalizedMessage {
            index,
            sender: msg.sender_name().to_string(),
            timestamp,
            text,
        });
    }
    debug!(
        "Normalized {} of {} messages",
        out.messages.len(),
        raw.len() - skip
    );
    out
}
