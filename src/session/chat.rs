use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    You,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match self.speaker {
            Speaker::You => "You",
            Speaker::Remote => "Remote",
        };
        write!(f, "{who}: {}", self.text)
    }
}

/// In-memory transcript plus the unsent input line.
#[derive(Debug, Default)]
pub struct ChatChannel {
    transcript: Vec<ChatLine>,
    draft: String,
}

impl ChatChannel {
    pub fn transcript(&self) -> &[ChatLine] {
        &self.transcript
    }

    pub fn last(&self) -> Option<&ChatLine> {
        self.transcript.last()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub(crate) fn clear_draft(&mut self) {
        self.draft.clear();
    }

    pub(crate) fn record(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(ChatLine {
            speaker,
            text: text.into(),
        });
    }
}
