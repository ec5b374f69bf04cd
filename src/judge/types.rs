use serde::{Deserialize, Deserializer, Serialize};

/// Highest status id the execution service uses for queued or processing work.
pub const LAST_PENDING_STATUS: u32 = 2;
pub const STATUS_ACCEPTED: u32 = 3;
pub const STATUS_RUNTIME_ERROR: u32 = 4;

/// One unit of work sent to the execution service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub language_id: u32,
    pub source_code: String,
    pub stdin: String,
    pub expected_output: String,
}

/// Opaque handle for one in-flight [`ExecutionRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ExecutionToken(pub String);

impl ExecutionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How the workflow treats a status id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    /// Queued or processing
    Pending,
    Accepted,
    RuntimeError,
    /// Any other terminal status: wrong output, compile error, limits
    Rejected,
}

impl StatusCategory {
    pub fn from_code(code: u32) -> Self {
        match code {
            0..=LAST_PENDING_STATUS => Self::Pending,
            STATUS_ACCEPTED => Self::Accepted,
            STATUS_RUNTIME_ERROR => Self::RuntimeError,
            _ => Self::Rejected,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusDetail {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

/// Result of one execution as reported by the execution service.
///
/// `time` is in seconds and `memory` in kilobytes.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExecutionVerdict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<ExecutionToken>,
    #[serde(default)]
    pub status_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusDetail>,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub time: Option<f64>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ExecutionVerdict {
    /// A verdict carrying only a status id, mostly useful for fakes.
    pub fn with_status(status_id: u32) -> Self {
        Self {
            status_id: Some(status_id),
            ..Default::default()
        }
    }

    /// Status id, falling back to the nested `status` object.
    pub fn status_code(&self) -> Option<u32> {
        self.status_id.or(self.status.as_ref().map(|s| s.id))
    }

    pub fn category(&self) -> StatusCategory {
        StatusCategory::from_code(self.status_code().unwrap_or(0))
    }

    pub fn is_terminal(&self) -> bool {
        self.category().is_terminal()
    }
}

/// Judge0 reports `time` as a decimal string ("0.004"), older deployments as a number.
fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
