//! Line formatting strategies
//!
//! The set of formats is closed: [`Formatter`] is chosen once in the config and
//! dispatches to one of the concrete [`LogFormatter`] implementations.

use crate::error::{Error, Result};
use crate::record::Entry;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Default timestamp pattern for [`TextFormatter`]: month, day, then time
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%-m%d-%H%M%S";

/// Clock used to render timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockZone {
    /// Coordinated universal time
    Utc,
    /// The host's local time zone
    #[default]
    Local,
}

impl ClockZone {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ClockZone::Utc => 0,
            ClockZone::Local => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => ClockZone::Utc,
            _ => ClockZone::Local,
        }
    }

    /// Render `time` with a chrono `strftime` pattern in this zone
    pub fn format(self, time: DateTime<Utc>, pattern: &str) -> String {
        match self {
            ClockZone::Utc => time.format(pattern).to_string(),
            ClockZone::Local => time.with_timezone(&Local).format(pattern).to_string(),
        }
    }

    fn rfc3339(self, time: DateTime<Utc>) -> String {
        match self {
            ClockZone::Utc => time.to_rfc3339(),
            ClockZone::Local => time.with_timezone(&Local).to_rfc3339(),
        }
    }
}

impl FromStr for ClockZone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utc" => Ok(ClockZone::Utc),
            "local" => Ok(ClockZone::Local),
            other => Err(Error::Configuration(format!("unknown clock zone: {other}"))),
        }
    }
}

impl fmt::Display for ClockZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockZone::Utc => f.write_str("utc"),
            ClockZone::Local => f.write_str("local"),
        }
    }
}

/// Turns a log entry into the bytes appended to a level buffer
pub trait LogFormatter: Send + Sync {
    /// Append the formatted entry, including its trailing newline, to `out`
    fn format(&self, entry: &Entry<'_>, zone: ClockZone, out: &mut Vec<u8>) -> Result<()>;
}

/// Compact single-line text: `<timestamp><L> <fields...> <message>`
///
/// Field values are written in key order and the call site appears as the
/// `file` field, empty when it could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFormatter {
    /// chrono `strftime` pattern for the timestamp
    pub timestamp_format: String,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl TextFormatter {
    fn push_value(out: &mut Vec<u8>, value: &str) {
        if !out.is_empty() {
            out.push(b' ');
        }
        out.extend_from_slice(value.as_bytes());
    }
}

impl LogFormatter for TextFormatter {
    fn format(&self, entry: &Entry<'_>, zone: ClockZone, out: &mut Vec<u8>) -> Result<()> {
        let mut line = Vec::with_capacity(64 + entry.message.len());

        let mut stamp = zone.format(entry.created, &self.timestamp_format);
        stamp.push(entry.level.letter());
        Self::push_value(&mut line, &stamp);

        let file = entry
            .call_site
            .map(|site| site.file_line())
            .unwrap_or_default();
        let mut values: Vec<(&str, Cow<'_, str>)> = entry
            .fields
            .iter()
            .filter(|(key, _)| key.as_str() != "file")
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => Cow::Borrowed(s.as_str()),
                    other => Cow::Owned(other.to_string()),
                };
                (key.as_str(), text)
            })
            .collect();
        values.push(("file", Cow::Owned(file)));
        values.sort_by(|a, b| a.0.cmp(b.0));

        for (_, value) in &values {
            Self::push_value(&mut line, value);
        }

        if !entry.message.is_empty() {
            Self::push_value(&mut line, entry.message);
        }

        line.push(b'\n');
        out.extend_from_slice(&line);
        Ok(())
    }
}

/// The bare message followed by a newline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFormatter;

impl LogFormatter for MessageFormatter {
    fn format(&self, entry: &Entry<'_>, _zone: ClockZone, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(entry.message.as_bytes());
        out.push(b'\n');
        Ok(())
    }
}

/// One JSON object per line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFormatter;

impl LogFormatter for JsonFormatter {
    // Example: {"file":"main.rs:12","level":"INFO","msg":"...","ts":"..."}
    fn format(&self, entry: &Entry<'_>, zone: ClockZone, out: &mut Vec<u8>) -> Result<()> {
        let mut object = serde_json::Map::with_capacity(entry.fields.len() + 4);
        for (key, value) in entry.fields {
            object.insert(key.clone(), value.clone());
        }
        object.insert("ts".into(), zone.rfc3339(entry.created).into());
        object.insert("level".into(), entry.level.as_str().into());
        object.insert("msg".into(), entry.message.into());
        if let Some(site) = entry.call_site {
            object.insert("file".into(), site.file_line().into());
        }

        serde_json::to_writer(&mut *out, &object)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

/// Formatting strategy selected at construction time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Formatter {
    /// Compact text lines
    Text(TextFormatter),
    /// Message only
    Message,
    /// JSON lines
    Json,
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::Text(TextFormatter::default())
    }
}

impl LogFormatter for Formatter {
    fn format(&self, entry: &Entry<'_>, zone: ClockZone, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Formatter::Text(text) => text.format(entry, zone, out),
            Formatter::Message => MessageFormatter.format(entry, zone, out),
            Formatter::Json => JsonFormatter.format(entry, zone, out),
        }
    }
}
