use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Classification bucket assigned to a recorded response.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Found,
    Redirect,
    Forbidden,
    Unauthorized,
    Other,
    Template,
}

impl Label {
    /// Label derived from the status code alone.
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Label::Found,
            301 | 302 | 307 | 308 => Label::Redirect,
            403 => Label::Forbidden,
            401 => Label::Unauthorized,
            _ => Label::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Found => "FOUND",
            Label::Redirect => "REDIRECT",
            Label::Forbidden => "FORBIDDEN",
            Label::Unauthorized => "UNAUTHORIZED",
            Label::Other => "OTHER",
            Label::Template => "TEMPLATE",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub path: String,
    pub url: String,
    pub status: u16,
    pub content_length: u64,
    pub label: Label,
    /// Id of the detection template that matched, if any.
    pub matched_template: Option<String>,
}

/// Immutable snapshot of a finished scan, handed to the report renderers.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub target: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub tested_count: u64,
    pub interrupted: bool,
    pub results: Vec<ScanResult>,
}

impl ScanReport {
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).as_seconds_f64().max(0.0)
    }

    pub fn found_count(&self) -> usize {
        self.results.len()
    }
}
