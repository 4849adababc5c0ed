use serde::{Deserialize, Serialize};

use crate::core::message::Message;

/// Body the gateway sends to an OpenAI-compatible `chat/completions` endpoint.
#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

/// Body the conversation client posts to the gateway.
#[derive(Serialize, Deserialize, Debug)]
pub struct GatewayRequest {
    pub messages: Vec<Message>,
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
}

/// One `data:` frame of a streamed completion.
#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}
