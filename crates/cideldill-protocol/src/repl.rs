use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry in a REPL session's append-only transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplTranscriptEntry {
    pub at: f64,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<String>,
}

/// Metadata for an in-frame evaluation session opened while a pause is
/// live. Evaluation itself is left to an external collaborator (spec §9);
/// this crate only tracks session lifecycle and transcript entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplSession {
    pub session_id: Uuid,
    pub pause_id: Uuid,
    pub pid: u32,
    pub started_at: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub closed_at: Option<f64>,
    #[serde(default)]
    pub transcript: Vec<ReplTranscriptEntry>,
}

impl ReplSession {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}
