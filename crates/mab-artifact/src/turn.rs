//! Conversation turns attached to an artifact

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The person refining the app
    User,
    /// The generation backend (stored as `model` by older clients)
    #[serde(alias = "model")]
    Assistant,
}

impl Speaker {
    /// Label used when rendering a transcript
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "AI",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One message in the refinement conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Author
    #[serde(alias = "role")]
    pub speaker: Speaker,
    /// Free-form message content
    pub text: String,
}

impl Turn {
    /// Create a turn
    #[inline]
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    /// Turn authored by the user
    #[inline]
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    /// Turn authored by the assistant
    #[inline]
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, text)
    }
}

/// Render turns as `User: ...` / `AI: ...` lines
#[must_use]
pub fn transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.speaker.label(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_model_role_reads_as_assistant() {
        let turn: Turn = serde_json::from_str(r#"{"role":"model","text":"done"}"#).unwrap();
        assert_eq!(turn, Turn::assistant("done"));
    }

    #[test]
    fn speaker_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"speaker":"user","text":"hi"}"#);
    }

    #[test]
    fn transcript_labels_each_line() {
        let turns = vec![Turn::user("make it blue"), Turn::assistant("ok")];
        assert_eq!(transcript(&turns), "User: make it blue\nAI: ok");
    }

    #[test]
    fn empty_transcript() {
        assert_eq!(transcript(&[]), "");
    }
}
