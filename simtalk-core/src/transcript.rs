//! Conversation transcripts.

use serde::{Deserialize, Serialize};

use crate::types::AgentId;

/// One spoken line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Who said it.
    pub speaker: AgentId,
    /// The speaker's display name at the time.
    pub speaker_name: String,
    /// What was said.
    pub line: String,
}

/// Ordered list of lines shared by both parties to a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line.
    pub fn push(&mut self, speaker: AgentId, speaker_name: impl Into<String>, line: impl Into<String>) {
        self.lines.push(TranscriptLine {
            speaker,
            speaker_name: speaker_name.into(),
            line: line.into(),
        });
    }

    /// All lines in speaking order.
    #[must_use]
    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render as `Name: line` rows, one per line, for prompt construction.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{}: {}", l.speaker_name, l.line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_order() {
        let (a, b) = (AgentId::new(), AgentId::new());
        let mut t = Transcript::new();
        t.push(a, "Ada", "Hello there.");
        t.push(b, "Bo", "Oh, hi!");
        assert_eq!(t.render(), "Ada: Hello there.\nBo: Oh, hi!");
        assert_eq!(t.lines()[1].speaker, b);
    }

    #[test]
    fn empty_renders_empty() {
        assert_eq!(Transcript::new().render(), "");
    }
}
