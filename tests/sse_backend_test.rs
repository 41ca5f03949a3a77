// Wire-level tests for the OpenAI-compatible streaming adapter, against a
// mocked HTTP server.

use futures_util::StreamExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use longwave::adapters::OpenAiBackend;
use longwave::config::BackendConfig;
use longwave::error::BackendError;
use longwave::models::{ChainMessage, ContentPart};
use longwave::stream::{PartDelta, StreamEvent};
use longwave::traits::InferenceBackend;

fn backend_for(server: &MockServer) -> OpenAiBackend {
    let config = BackendConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
    };
    OpenAiBackend::new(config, None)
}

async fn collect(backend: &OpenAiBackend) -> Vec<Result<StreamEvent, BackendError>> {
    let stream = backend
        .stream_response(&[ChainMessage::user("hello")])
        .await
        .unwrap();
    stream.collect().await
}

#[tokio::test]
async fn test_streamed_completion_maps_to_event_sequence() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = collect(&backend_for(&server))
        .await
        .into_iter()
        .map(|e| e.unwrap())
        .collect();

    assert_eq!(
        events,
        vec![
            StreamEvent::PartStart(ContentPart::empty_text()),
            StreamEvent::PartDelta(PartDelta::Text("Hel".to_string())),
            StreamEvent::PartDelta(PartDelta::Text("lo".to_string())),
            StreamEvent::Complete,
        ]
    );
}

#[tokio::test]
async fn test_error_status_is_reported_with_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = match backend_for(&server)
        .stream_response(&[ChainMessage::user("hello")])
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };

    match err {
        BackendError::Reported { message, code } => {
            assert_eq!(message, "boom");
            assert_eq!(code, Some("500".to_string()));
        }
        other => panic!("expected Reported, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_without_done_never_completes() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"cut\"}}]}\n\n",
        // Connection ends here with no [DONE]
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = collect(&backend_for(&server)).await;
    assert!(events
        .iter()
        .all(|e| !matches!(e, Ok(StreamEvent::Complete))));
}

#[tokio::test]
async fn test_mid_stream_error_payload_maps_to_error_event() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"overloaded\",\"code\":\"529\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = collect(&backend_for(&server))
        .await
        .into_iter()
        .map(|e| e.unwrap())
        .collect();

    assert_eq!(
        events.last(),
        Some(&StreamEvent::Error {
            message: "overloaded".to_string(),
            code: Some("529".to_string()),
        })
    );
}
