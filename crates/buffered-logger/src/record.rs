//! Log records as they travel from call sites to the flush engine

use crate::{CallSite, Level};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Structured fields attached to a record, kept in key order
pub type Fields = BTreeMap<String, serde_json::Value>;

/// The parts of a log call a formatter turns into bytes
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    /// Severity
    pub level: Level,
    /// The log message
    pub message: &'a str,
    /// When the log call happened
    pub created: DateTime<Utc>,
    /// Where the log call happened, if known
    pub call_site: Option<&'a CallSite>,
    /// Structured fields
    pub fields: &'a Fields,
}

/// A formatted record, owned by the producer until sent and by the engine after
#[derive(Debug, Clone)]
pub struct LogRecord {
    level: Level,
    payload: Vec<u8>,
    created: DateTime<Utc>,
    call_site: Option<Arc<CallSite>>,
    fields: Fields,
}

impl LogRecord {
    /// Create a record from an already formatted payload
    pub fn new(level: Level, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            level,
            payload: payload.into(),
            created: Utc::now(),
            call_site: None,
            fields: Fields::new(),
        }
    }

    /// Builder-style method for setting the creation time
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Builder-style method for setting the call site
    pub fn with_call_site(mut self, call_site: Arc<CallSite>) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Builder-style method for setting fields
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Severity
    pub fn level(&self) -> Level {
        self.level
    }

    /// Formatted bytes appended to the level buffer
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Creation time
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Call site, if it was resolved
    pub fn call_site(&self) -> Option<&CallSite> {
        self.call_site.as_deref()
    }

    /// Structured fields
    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}
