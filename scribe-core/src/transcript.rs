//! Speaker-attributed transcript for one consultation.
//!
//! Append-only: each incoming line is labelled by the speaker classifier
//! using the previous line's label as context, then frozen.

use chrono::{DateTime, Utc};

use crate::models::{Speaker, Utterance};
use crate::speaker::classify_speaker;

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label and append a line of transcribed speech.
    pub fn push_text(&mut self, text: &str, timestamp: DateTime<Utc>) -> &Utterance {
        let speaker = classify_speaker(text, self.last_speaker());
        self.push(Utterance {
            text: text.to_string(),
            speaker,
            timestamp,
        })
    }

    /// Append an utterance whose speaker is already known (e.g. from diarization).
    pub fn push(&mut self, utterance: Utterance) -> &Utterance {
        self.utterances.push(utterance);
        &self.utterances[self.utterances.len() - 1]
    }

    pub fn last_speaker(&self) -> Option<Speaker> {
        self.utterances.last().map(|u| u.speaker)
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }
}
