use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Doctor,
    Patient,
}

impl Speaker {
    /// The other participant in a two-party consultation.
    pub fn other(self) -> Self {
        match self {
            Speaker::Doctor => Speaker::Patient,
            Speaker::Patient => Speaker::Doctor,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Doctor => f.write_str("doctor"),
            Speaker::Patient => f.write_str("patient"),
        }
    }
}

/// One speaker-attributed line of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub speaker: Speaker,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}
