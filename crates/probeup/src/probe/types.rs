use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body recorded when the response arrived but its body could not be read
pub const UNREADABLE_BODY: &str = "Failed to read response body";

/// Outcome class of a probe, derived from the HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusClass {
    Success,
    Forbidden,
    Unauthorized,
    NotFound,
    Error,
}

impl StatusClass {
    /// Classify a status code. Code 0 stands for "no response at all".
    pub fn classify(status_code: u16) -> Self {
        match status_code {
            200..=299 => StatusClass::Success,
            403 => StatusClass::Forbidden,
            401 => StatusClass::Unauthorized,
            404 => StatusClass::NotFound,
            _ => StatusClass::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Success => "SUCCESS",
            StatusClass::Forbidden => "FORBIDDEN",
            StatusClass::Unauthorized => "UNAUTHORIZED",
            StatusClass::NotFound => "NOT_FOUND",
            StatusClass::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// When the probe started
    pub timestamp: DateTime<Utc>,

    /// Fully resolved URL that was requested
    pub url: String,

    /// Path label the URL was built from
    pub path: String,

    /// HTTP method used
    pub method: String,

    /// HTTP status code, 0 when no response was received
    pub status_code: u16,

    /// Classification of `status_code`
    #[serde(rename = "status")]
    pub status_class: StatusClass,

    /// Number of body bytes actually read
    pub body_length: usize,

    /// Response body, or a diagnostic when the probe failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ProbeResult {
    /// Create a result that has not received a response yet
    pub fn new(url: impl Into<String>, path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            url: url.into(),
            path: path.into(),
            method: method.into(),
            status_code: 0,
            status_class: StatusClass::Error,
            body_length: 0,
            body: None,
        }
    }

    /// Record a received response and its body
    pub fn completed(mut self, status_code: u16, body: &[u8]) -> Self {
        self.status_code = status_code;
        self.status_class = StatusClass::classify(status_code);
        self.body_length = body.len();
        self.body = (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned());
        self
    }

    /// Record a response whose body could not be read
    pub fn unreadable_body(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self.status_class = StatusClass::classify(status_code);
        self.body_length = 0;
        self.body = Some(UNREADABLE_BODY.to_string());
        self
    }

    /// Record a failure that produced no response
    pub fn failure(mut self, diagnostic: impl Into<String>) -> Self {
        self.status_code = 0;
        self.status_class = StatusClass::Error;
        self.body_length = 0;
        self.body = Some(diagnostic.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status_class == StatusClass::Success
    }
}
