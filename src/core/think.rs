//! Separation of model reasoning from the final answer.
//!
//! Reasoning models are instructed to wrap their chain of thought in
//! `<think>…</think>` before answering. [`ThinkScanner`] tracks where that
//! marker pair sits inside an append-only reply buffer so the UI can redraw
//! both regions on every streamed chunk without rescanning the whole text.

use memchr::memmem;

pub const OPEN_MARKER: &str = "<think>";
pub const CLOSE_MARKER: &str = "</think>";

/// Display split of an assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub thinking: String,
    pub response: String,
}

/// Coarse progress of a reply, used by renderers to pick what to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPhase {
    /// The buffer is still a (possibly empty) prefix of the opening marker.
    Undecided,
    /// The reply opened with a marker that has not been closed yet.
    Thinking,
    /// Everything else: the pair closed, or the reply never opened with one.
    Answering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    Inside { open: usize },
    Closed { open: usize, close: usize },
}

#[derive(Debug, Clone)]
pub struct ThinkScanner {
    buffer: String,
    state: ScanState,
    // Byte offset up to which marker searches have already run.
    scanned: usize,
}

impl Default for ThinkScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkScanner {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            state: ScanState::Outside,
            scanned: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn push(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.buffer.push_str(chunk);

        loop {
            match self.state {
                ScanState::Outside => {
                    let start = self.scanned.saturating_sub(OPEN_MARKER.len() - 1);
                    match self.find_from(OPEN_MARKER, start) {
                        Some(open) => {
                            self.state = ScanState::Inside { open };
                            self.scanned = open + OPEN_MARKER.len();
                        }
                        None => {
                            self.scanned = self.buffer.len();
                            break;
                        }
                    }
                }
                ScanState::Inside { open } => {
                    let interior = open + OPEN_MARKER.len();
                    let start = self
                        .scanned
                        .saturating_sub(CLOSE_MARKER.len() - 1)
                        .max(interior);
                    match self.find_from(CLOSE_MARKER, start) {
                        Some(close) => {
                            self.state = ScanState::Closed { open, close };
                            self.scanned = self.buffer.len();
                        }
                        None => self.scanned = self.buffer.len(),
                    }
                    break;
                }
                ScanState::Closed { .. } => break,
            }
        }
    }

    pub fn phase(&self) -> ReplyPhase {
        if self.buffer.len() < OPEN_MARKER.len() && OPEN_MARKER.starts_with(self.buffer.as_str()) {
            return ReplyPhase::Undecided;
        }
        match self.state {
            ScanState::Inside { open: 0 } => ReplyPhase::Thinking,
            _ => ReplyPhase::Answering,
        }
    }

    pub fn reply(&self) -> ParsedReply {
        match self.state {
            // Opened at the very start and still open: live reasoning, no answer yet.
            ScanState::Inside { open: 0 } => ParsedReply {
                thinking: self.buffer[OPEN_MARKER.len()..].to_string(),
                response: String::new(),
            },
            ScanState::Closed { open, close } => {
                let thinking = self.buffer[open + OPEN_MARKER.len()..close].trim();
                let mut response = String::with_capacity(self.buffer.len());
                response.push_str(&self.buffer[..open]);
                response.push_str(&self.buffer[close + CLOSE_MARKER.len()..]);
                ParsedReply {
                    thinking: thinking.to_string(),
                    response: response.trim().to_string(),
                }
            }
            ScanState::Outside | ScanState::Inside { .. } => ParsedReply {
                thinking: String::new(),
                response: self.buffer.clone(),
            },
        }
    }

    fn find_from(&self, needle: &str, start: usize) -> Option<usize> {
        let haystack = self.buffer.as_bytes().get(start..)?;
        memmem::find(haystack, needle.as_bytes()).map(|offset| start + offset)
    }
}

/// Split a complete (or partial) reply into its reasoning and answer parts.
pub fn parse_reply(text: &str) -> ParsedReply {
    let mut scanner = ThinkScanner::new();
    scanner.push(text);
    scanner.reply()
}
