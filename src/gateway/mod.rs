//! HTTP gateway that relays a conversation to the inference provider and
//! streams the provider's reply back unchanged.

pub mod error;
pub mod history;
pub mod provider;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures_util::TryStreamExt;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::GatewayRequest;
use crate::core::config::GatewaySettings;
use crate::core::message::Message;
use error::GatewayError;
use history::{apply_history_limit, with_system_directive};
use provider::CompletionProvider;

pub const CHAT_ROUTE: &str = "/api/chat";

/// Everything the chat route needs, fixed at startup.
pub struct GatewayState {
    provider: Option<Arc<dyn CompletionProvider>>,
    model: String,
    system_prompt: String,
    history_limit: Option<usize>,
}

impl GatewayState {
    /// `provider` is `None` when credentials were missing at startup; the
    /// route then answers with a configuration error instead of calling out.
    pub fn new(settings: &GatewaySettings, provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self {
            provider,
            model: settings.model().to_string(),
            system_prompt: settings.system_prompt().to_string(),
            history_limit: settings.history_limit(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(CHAT_ROUTE, post(chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<GatewayState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, model = state.model(), configured = state.is_configured(), "gateway listening");
    }
    axum::serve(listener, router(state)).await
}

pub fn parse_messages(body: &[u8]) -> Result<Vec<Message>, GatewayError> {
    serde_json::from_slice::<GatewayRequest>(body)
        .map(|request| request.messages)
        .map_err(GatewayError::InvalidMessages)
}

async fn chat(State(state): State<Arc<GatewayState>>, body: Bytes) -> Result<Response, GatewayError> {
    let messages = parse_messages(&body)?;
    let provider = state
        .provider
        .as_ref()
        .ok_or(GatewayError::MissingConfiguration)?;

    let received = messages.len();
    let messages = apply_history_limit(messages, state.history_limit);
    let forwarded = with_system_directive(&state.system_prompt, messages);
    info!(received, forwarded = forwarded.len(), "forwarding conversation");

    let stream = provider
        .stream_chat(&state.model, &forwarded)
        .await?
        .inspect_err(|err| error!("provider stream failed mid-response: {err}"));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
