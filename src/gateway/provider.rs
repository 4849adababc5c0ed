//! The upstream inference provider, seen as "stream a chat completion".

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::api::ChatRequest;
use crate::core::message::Message;

pub const BASE_URL_VAR: &str = "DEEPSEEK_BASE_URL";
pub const API_KEY_VAR: &str = "DEEPSEEK_API_KEY";

/// Raw body chunks of a streamed completion, in the order the provider sent them.
pub type ProviderStream = BoxStream<'static, Result<Bytes, ProviderError>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("provider stream interrupted: {0}")]
    Stream(#[source] reqwest::Error),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a streamed completion. Resolves once the provider has accepted
    /// the request; body errors surface through the returned stream.
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ProviderStream, ProviderError>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub base_url: String,
    pub api_key: String,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ProviderCredentials {
    /// Read the provider base URL and key from the process environment.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Both values must be present and non-blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Some(Self {
            base_url: non_blank(BASE_URL_VAR)?,
            api_key: non_blank(API_KEY_VAR)?,
        })
    }
}

/// Join a base URL and an endpoint path with exactly one slash between them.
pub fn join_endpoint(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Provider speaking the OpenAI `chat/completions` streaming protocol.
pub struct OpenAiCompatProvider {
    http: reqwest::Client,
    credentials: ProviderCredentials,
}

impl OpenAiCompatProvider {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    pub fn chat_url(&self) -> String {
        join_endpoint(&self.credentials.base_url, "chat/completions")
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ProviderStream, ProviderError> {
        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };

        let url = self.chat_url();
        debug!(%url, model, messages = messages.len(), "starting provider stream");

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.api_key),
            )
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ProviderError::Status { status, body });
        }

        Ok(response
            .bytes_stream()
            .map_err(ProviderError::Stream)
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[test]
    fn endpoint_joining_normalizes_slashes() {
        for base in [
            "https://api.example.com/v1",
            "https://api.example.com/v1/",
            "https://api.example.com/v1///",
        ] {
            assert_eq!(
                join_endpoint(base, "chat/completions"),
                "https://api.example.com/v1/chat/completions"
            );
        }
        assert_eq!(
            join_endpoint("https://api.example.com/v1/", "/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn credentials_require_both_values() {
        let env = HashMap::from([
            (BASE_URL_VAR, "https://api.groq.com/openai/v1"),
            (API_KEY_VAR, "sk-test"),
        ]);
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());
        let creds = ProviderCredentials::from_lookup(lookup).expect("both present");
        assert_eq!(creds.base_url, "https://api.groq.com/openai/v1");

        let missing_key = |name: &str| (name == BASE_URL_VAR).then(|| "https://x".to_string());
        assert!(ProviderCredentials::from_lookup(missing_key).is_none());

        let blank_url = |name: &str| {
            Some(if name == BASE_URL_VAR { "  " } else { "sk" }.to_string())
        };
        assert!(ProviderCredentials::from_lookup(blank_url).is_none());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let creds = ProviderCredentials {
            base_url: "https://x".into(),
            api_key: "sk-secret".into(),
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("https://x"));
    }

    type Seen = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn spawn_upstream(seen: Seen) -> String {
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                    let seen = seen.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push((auth, body));
                        "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\ndata: [DONE]\n\n"
                    }
                }),
            )
            .route(
                "/bad/chat/completions",
                post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "invalid api key") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn streams_upstream_body_and_sends_bearer_auth() {
        let seen: Seen = Arc::default();
        let base = spawn_upstream(seen.clone()).await;
        let provider = OpenAiCompatProvider::new(ProviderCredentials {
            base_url: format!("{base}/v1/"),
            api_key: "sk-test".into(),
        });

        let messages = vec![Message::system("be brief"), Message::user("hello")];
        let stream = provider
            .stream_chat("deepseek-r1-distill-llama-70b", &messages)
            .await
            .expect("stream should start");
        let chunks: Vec<Bytes> = stream.try_collect().await.expect("body should stream");
        let body: Vec<u8> = chunks.concat();
        assert!(String::from_utf8(body).unwrap().ends_with("data: [DONE]\n\n"));

        let seen = seen.lock().unwrap();
        let (auth, request) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(request["model"], "deepseek-r1-distill-llama-70b");
        assert_eq!(request["stream"], true);
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let base = spawn_upstream(Arc::default()).await;
        let provider = OpenAiCompatProvider::new(ProviderCredentials {
            base_url: format!("{base}/bad"),
            api_key: "nope".into(),
        });

        match provider.stream_chat("m", &[Message::user("x")]).await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body, "invalid api key");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a status error"),
        }
    }
}
