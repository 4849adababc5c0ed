use crate::core::chat_stream::StreamMessage;
use crate::core::message::Message;
use crate::core::think::{ParsedReply, ReplyPhase, ThinkScanner};

/// Lifecycle of one assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// Request sent, nothing received yet.
    Pending,
    Streaming,
    Complete,
    Failed(String),
}

impl TurnStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TurnStatus::Pending | TurnStatus::Streaming)
    }
}

#[derive(Debug, Clone)]
pub struct AssistantTurn {
    stream_id: u64,
    scanner: ThinkScanner,
    status: TurnStatus,
}

impl AssistantTurn {
    fn new(stream_id: u64) -> Self {
        Self {
            stream_id,
            scanner: ThinkScanner::new(),
            status: TurnStatus::Pending,
        }
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn status(&self) -> &TurnStatus {
        &self.status
    }

    pub fn text(&self) -> &str {
        self.scanner.text()
    }

    pub fn phase(&self) -> ReplyPhase {
        self.scanner.phase()
    }

    pub fn reply(&self) -> ParsedReply {
        self.scanner.reply()
    }
}

#[derive(Debug, Clone)]
pub enum Entry {
    User(String),
    Assistant(AssistantTurn),
}

/// Messages to send for a newly submitted turn, tagged with the stream id
/// that chunks for the reply will carry.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub stream_id: u64,
    pub messages: Vec<Message>,
}

/// Transcript plus input buffer for a single chat session.
#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<Entry>,
    input: String,
    next_stream_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn insert_char(&mut self, ch: char) {
        self.input.push(ch);
    }

    pub fn insert_str(&mut self, text: &str) {
        self.input.push_str(text);
    }

    pub fn insert_newline(&mut self) {
        self.input.push('\n');
    }

    pub fn backspace(&mut self) {
        self.input.pop();
    }

    /// The assistant turn still waiting on the gateway, if any.
    pub fn in_flight(&self) -> Option<&AssistantTurn> {
        match self.entries.last() {
            Some(Entry::Assistant(turn)) if turn.status.is_in_flight() => Some(turn),
            _ => None,
        }
    }

    pub fn latest_turn(&self) -> Option<&AssistantTurn> {
        self.entries.iter().rev().find_map(|entry| match entry {
            Entry::Assistant(turn) => Some(turn),
            Entry::User(_) => None,
        })
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight().is_some()
    }

    /// Turn the input buffer into a user message and open a pending reply.
    ///
    /// Returns `None` without touching any state when the buffer is blank or
    /// a reply is still in flight.
    pub fn submit(&mut self) -> Option<TurnRequest> {
        if self.input.trim().is_empty() || self.is_streaming() {
            return None;
        }

        let content = std::mem::take(&mut self.input);
        self.entries.push(Entry::User(content));
        let messages = self.history();

        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        self.entries
            .push(Entry::Assistant(AssistantTurn::new(stream_id)));

        Some(TurnRequest {
            stream_id,
            messages,
        })
    }

    /// Apply a stream event. Events for anything but the in-flight reply
    /// are dropped.
    pub fn apply(&mut self, stream_id: u64, message: StreamMessage) {
        let Some(Entry::Assistant(turn)) = self.entries.last_mut() else {
            return;
        };
        if turn.stream_id != stream_id || !turn.status.is_in_flight() {
            return;
        }

        match message {
            StreamMessage::Chunk(content) => {
                turn.status = TurnStatus::Streaming;
                turn.scanner.push(&content);
            }
            StreamMessage::Error(reason) => {
                turn.status = TurnStatus::Failed(reason);
            }
            StreamMessage::End => {
                turn.status = TurnStatus::Complete;
            }
        }
    }

    /// Conversation as replayed to the gateway: user messages and completed
    /// replies, raw text included.
    pub fn history(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                Entry::User(content) => Some(Message::user(content.clone())),
                Entry::Assistant(turn) if turn.status == TurnStatus::Complete => {
                    Some(Message::assistant(turn.text()))
                }
                Entry::Assistant(_) => None,
            })
            .collect()
    }
}
