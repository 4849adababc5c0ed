//! Client side of a chat turn: post the conversation to the gateway and
//! decode its server-sent-event body into text deltas.

use futures_util::StreamExt;
use memchr::memchr;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatResponse, GatewayRequest};
use crate::core::conversation::TurnRequest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not reach the gateway: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Gateway returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Stream interrupted: {0}")]
    Body(#[source] reqwest::Error),
}

type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Returns `true` once the frame ends the stream.
fn handle_data_payload(payload: &str, tx: &StreamSender, stream_id: u64) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send((StreamMessage::End, stream_id));
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(content) = response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
            {
                if !content.is_empty() {
                    let _ = tx.send((StreamMessage::Chunk(content), stream_id));
                }
            }
            false
        }
        Err(_) if payload.trim().is_empty() => false,
        Err(_) => {
            let _ = tx.send((StreamMessage::Error(describe_error_payload(payload)), stream_id));
            let _ = tx.send((StreamMessage::End, stream_id));
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &StreamSender, stream_id: u64) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx, stream_id))
        .unwrap_or(false)
}

/// Pull a one-line summary out of an error frame the provider streamed.
fn describe_error_payload(payload: &str) -> String {
    let trimmed = payload.trim();
    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("error"))
                .or_else(|| value.get("message"))
                .and_then(|v| v.as_str())
                .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        });

    match summary {
        Some(text) if !text.is_empty() => format!("Provider error: {text}"),
        _ => format!("Provider error: {trimmed}"),
    }
}

/// Stream one turn, forwarding deltas to `tx`. Emits `End` on success; the
/// caller reports errors.
async fn stream_turn(
    http: &reqwest::Client,
    url: &str,
    request: TurnRequest,
    tx: &StreamSender,
) -> Result<(), ClientError> {
    let TurnRequest {
        stream_id,
        messages,
    } = request;

    let response = http
        .post(url)
        .json(&GatewayRequest { messages })
        .send()
        .await
        .map_err(ClientError::Request)?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        return Err(ClientError::Status {
            status,
            body: body.trim().to_string(),
        });
    }

    let mut body = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(ClientError::Body)?;
        buffer.extend_from_slice(&chunk);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let should_end = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(line) => process_sse_line(line.trim(), tx, stream_id),
                Err(e) => {
                    warn!(stream_id, "invalid UTF-8 in stream: {e}");
                    false
                }
            };
            buffer.drain(..=newline_pos);
            if should_end {
                debug!(stream_id, "stream finished");
                return Ok(());
            }
        }
    }

    // Body closed without a [DONE] frame.
    if let Ok(line) = std::str::from_utf8(&buffer) {
        if process_sse_line(line.trim(), tx, stream_id) {
            return Ok(());
        }
    }
    let _ = tx.send((StreamMessage::End, stream_id));
    Ok(())
}

/// Posts conversation turns to the gateway and relays decoded deltas over a
/// channel, tagged with the turn's stream id.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    url: String,
    tx: StreamSender,
}

impl GatewayClient {
    pub fn new(url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            http: reqwest::Client::new(),
            url: url.into(),
            tx,
        };
        (client, rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn spawn_turn(&self, request: TurnRequest) {
        let http = self.http.clone();
        let url = self.url.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let stream_id = request.stream_id;
            debug!(stream_id, messages = request.messages.len(), "sending turn");
            if let Err(err) = stream_turn(&http, &url, request, &tx).await {
                warn!(stream_id, "turn failed: {err}");
                let _ = tx.send((StreamMessage::Error(err.to_string()), stream_id));
                let _ = tx.send((StreamMessage::End, stream_id));
            }
        });
    }
}
