use super::*;
use crate::core::config::data::DEFAULT_SYSTEM_PROMPT;
use crate::core::message::Role;
use crate::gateway::error::{CONFIGURATION_ERROR, INTERNAL_ERROR, INVALID_MESSAGES};
use crate::gateway::provider::{ProviderError, ProviderStream};
use async_trait::async_trait;
use axum::http::{Request, StatusCode};
use futures_util::stream;
use futures_util::StreamExt;
use std::sync::Mutex;
use tower::ServiceExt;

/// Provider double that records every call and replays canned chunks.
struct RecordingProvider {
    calls: Mutex<Vec<(String, Vec<Message>)>>,
    chunks: Vec<&'static str>,
    reject: bool,
}

impl RecordingProvider {
    fn streaming(chunks: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            chunks,
            reject: false,
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            chunks: Vec::new(),
            reject: true,
        })
    }

    fn calls(&self) -> Vec<(String, Vec<Message>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for RecordingProvider {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<ProviderStream, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));
        if self.reject {
            return Err(ProviderError::Status {
                status: StatusCode::UNAUTHORIZED,
                body: "invalid api key".into(),
            });
        }
        let chunks: Vec<Result<Bytes, ProviderError>> = self
            .chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

fn state_with(provider: Option<Arc<RecordingProvider>>, settings: GatewaySettings) -> Arc<GatewayState> {
    let provider = provider.map(|p| p as Arc<dyn CompletionProvider>);
    Arc::new(GatewayState::new(&settings, provider))
}

async fn post_chat(state: Arc<GatewayState>, body: &str) -> (StatusCode, Option<String>, String) {
    let request = Request::builder()
        .method("POST")
        .uri(CHAT_ROUTE)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

const VALID_BODY: &str = r#"{"messages":[{"role":"user","content":"What is 2+2?"}]}"#;

#[tokio::test]
async fn malformed_bodies_are_rejected_before_the_provider() {
    let provider = RecordingProvider::streaming(vec!["data: [DONE]\n\n"]);
    let state = state_with(Some(provider.clone()), GatewaySettings::default());

    for body in [
        "{}",
        "not json",
        "",
        r#"{"messages":"hello"}"#,
        r#"{"messages":{"role":"user"}}"#,
        r#"{"messages":[{"role":"tool","content":"x"}]}"#,
        r#"{"messages":[{"role":"user"}]}"#,
        r#"[{"role":"user","content":"x"}]"#,
    ] {
        let (status, _, text) = post_chat(state.clone(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(text, INVALID_MESSAGES);
    }
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn missing_credentials_fail_without_calling_out() {
    let state = state_with(None, GatewaySettings::default());

    let (status, _, text) = post_chat(state.clone(), VALID_BODY).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, CONFIGURATION_ERROR);

    // Shape is still checked first.
    let (status, _, text) = post_chat(state, "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, INVALID_MESSAGES);
}

#[tokio::test]
async fn provider_body_is_relayed_verbatim() {
    let chunks = vec![
        "data: {\"choices\":[{\"delta\":{\"content\":\"<think>hm\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"</think>4\"}}]}\n",
        "\ndata: [DONE]\n\n",
    ];
    let provider = RecordingProvider::streaming(chunks.clone());
    let state = state_with(Some(provider.clone()), GatewaySettings::default());

    let (status, content_type, text) = post_chat(state, VALID_BODY).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));
    assert_eq!(text, chunks.concat());

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    let (model, forwarded) = &calls[0];
    assert_eq!(model, "deepseek-r1-distill-llama-70b");
    assert_eq!(
        forwarded,
        &vec![
            Message::system(DEFAULT_SYSTEM_PROMPT),
            Message::user("What is 2+2?"),
        ]
    );
}

#[tokio::test]
async fn provider_failures_become_a_generic_500() {
    let provider = RecordingProvider::rejecting();
    let state = state_with(Some(provider.clone()), GatewaySettings::default());

    let (status, _, text) = post_chat(state, VALID_BODY).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, INTERNAL_ERROR);
    assert!(!text.contains("invalid api key"));
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn settings_shape_the_forwarded_request() {
    let provider = RecordingProvider::streaming(vec!["data: [DONE]\n\n"]);
    let settings = GatewaySettings {
        model: Some("deepseek-chat".into()),
        system_prompt: Some("Answer tersely.".into()),
        max_history_messages: Some(2),
        ..Default::default()
    };
    let state = state_with(Some(provider.clone()), settings);
    let body = r#"{"messages":[
        {"role":"user","content":"q1"},
        {"role":"assistant","content":"a1"},
        {"role":"user","content":"q2"},
        {"role":"assistant","content":"a2"},
        {"role":"user","content":"q3"}
    ]}"#;

    let (status, _, _) = post_chat(state, body).await;
    assert_eq!(status, StatusCode::OK);

    let (model, forwarded) = &provider.calls()[0];
    assert_eq!(model, "deepseek-chat");
    let roles: Vec<Role> = forwarded.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User]);
    assert_eq!(forwarded[0].content, "Answer tersely.");
    assert_eq!(forwarded[1].content, "q3");
}

#[tokio::test]
async fn empty_conversations_are_forwarded() {
    let provider = RecordingProvider::streaming(vec!["data: [DONE]\n\n"]);
    let state = state_with(Some(provider.clone()), GatewaySettings::default());

    let (status, _, _) = post_chat(state, r#"{"messages":[],"extra":true}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.calls()[0].1.len(), 1);
}

#[tokio::test]
async fn other_methods_are_not_routed() {
    let state = state_with(None, GatewaySettings::default());
    let request = Request::builder()
        .method("GET")
        .uri(CHAT_ROUTE)
        .body(Body::empty())
        .unwrap();
    let response = router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn parse_messages_accepts_every_role() {
    let messages = parse_messages(
        br#"{"messages":[{"role":"system","content":"s"},{"role":"user","content":"u"},{"role":"assistant","content":"a"}]}"#,
    )
    .unwrap();
    assert_eq!(messages.len(), 3);
}

#[tokio::test]
async fn reply_round_trips_from_provider_to_conversation() {
    use crate::core::chat_stream::GatewayClient;
    use crate::core::conversation::{Conversation, Entry, TurnStatus};
    use crate::gateway::provider::{OpenAiCompatProvider, ProviderCredentials};

    const UPSTREAM_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"<think>Let me \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"consider this.</th\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ink>The answer is 4.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    let upstream = Router::new().route(
        "/v1/chat/completions",
        post(|| async { ([(header::CONTENT_TYPE, "text/event-stream")], UPSTREAM_BODY) }),
    );
    let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream_listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(upstream_listener, upstream).await.unwrap() });

    let provider = OpenAiCompatProvider::new(ProviderCredentials {
        base_url: format!("http://{upstream_addr}/v1/"),
        api_key: "sk-test".into(),
    });
    let state = Arc::new(GatewayState::new(
        &GatewaySettings::default(),
        Some(Arc::new(provider)),
    ));
    let gateway_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway_addr = gateway_listener.local_addr().unwrap();
    tokio::spawn(async move { serve(gateway_listener, state).await.unwrap() });

    let mut conversation = Conversation::new();
    conversation.set_input("What is 2+2?");
    let request = conversation.submit().unwrap();
    let (client, mut rx) = GatewayClient::new(format!("http://{gateway_addr}{CHAT_ROUTE}"));
    client.spawn_turn(request);

    while let Some((message, stream_id)) = rx.recv().await {
        conversation.apply(stream_id, message);
        if !conversation.is_streaming() {
            break;
        }
    }

    match conversation.entries().last() {
        Some(Entry::Assistant(turn)) => {
            assert_eq!(turn.status(), &TurnStatus::Complete);
            let reply = turn.reply();
            assert_eq!(reply.thinking, "Let me consider this.");
            assert_eq!(reply.response, "The answer is 4.");
        }
        other => panic!("expected assistant turn, got {other:?}"),
    }
}
