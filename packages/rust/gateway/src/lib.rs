//! OpenAI-compatible chat-completions gateway.
//!
//! Sends the instruction and the user's text as a JSON-mode chat request and
//! decodes `choices[0].message.content` into an [`ExtractionPayload`]. One
//! request per call; retries are left to the caller.

mod envelope;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use texcal_shared::{
    ApiKey, ExtractionGateway, ExtractionPayload, GatewayConfig, GatewayError, Result,
    TexcalError,
};

use envelope::{ChatRequest, decode_envelope, preview};

/// User-Agent string for extraction requests.
const USER_AGENT: &str = concat!("TexCal/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// OpenAiGateway
// ---------------------------------------------------------------------------

/// [`ExtractionGateway`] backed by an OpenAI-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct OpenAiGateway {
    client: Client,
    endpoint: Url,
    model: String,
}

impl OpenAiGateway {
    /// Build a gateway with its own HTTP client.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TexcalError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: completions_url(&config.base_url)?,
            model: config.model.clone(),
        })
    }

    /// Full URL requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ExtractionGateway for OpenAiGateway {
    #[instrument(skip_all, fields(model = %self.model, endpoint = %self.endpoint))]
    async fn fetch_extraction(
        &self,
        credential: &ApiKey,
        instruction: &str,
        user_text: &str,
    ) -> std::result::Result<ExtractionPayload, GatewayError> {
        let request = ChatRequest::new(&self.model, instruction, user_text);

        info!("requesting extraction");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            debug!(%status, body = %preview(&body), "extraction request rejected");
            return Err(GatewayError::RequestRejected {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        let payload = decode_envelope(&body)?;
        debug!(bytes = body.len(), "extraction decoded");
        Ok(payload)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Append `chat/completions` to the base URL, keeping any path prefix.
fn completions_url(base: &Url) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("chat/completions")
        .map_err(|e| TexcalError::config(format!("invalid base URL {base}: {e}")))
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Transport(format!("request timed out: {e}"))
    } else if e.is_connect() {
        GatewayError::Transport(format!("connection failed: {e}"))
    } else {
        GatewayError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer, timeout: Duration) -> GatewayConfig {
        GatewayConfig {
            base_url: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
            model: "gpt-4o-mini".into(),
            timeout,
        }
    }

    fn gateway_for(server: &MockServer) -> OpenAiGateway {
        OpenAiGateway::new(&config_for(server, Duration::from_secs(5))).unwrap()
    }

    fn key() -> ApiKey {
        ApiKey::new("sk-test")
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn test_completions_url() {
        let base = Url::parse("https://api.openai.com/v1").unwrap();
        assert_eq!(
            completions_url(&base).unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );

        let base = Url::parse("http://localhost:8080/proxy/v1/").unwrap();
        assert_eq!(
            completions_url(&base).unwrap().as_str(),
            "http://localhost:8080/proxy/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "system", "content": "instruction" },
                    { "role": "user", "content": "dinner friday 7pm" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"title":"Dinner","start_date":"2024-06-14","start_time":"19:00","all_day":false,"confidence":0.9}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let payload = gateway_for(&server)
            .fetch_extraction(&key(), "instruction", "dinner friday 7pm")
            .await
            .unwrap();

        assert_eq!(payload.title.as_deref(), Some("Dinner"));
        assert_eq!(payload.start_time.as_deref(), Some("19:00"));
        assert_eq!(payload.confidence, Some(0.9));
    }

    #[tokio::test]
    async fn test_fetch_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"error":{"message":"Incorrect API key provided"}}"#),
            )
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .fetch_extraction(&key(), "instruction", "text")
            .await
            .unwrap_err();

        match err {
            GatewayError::RequestRejected { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Incorrect API key"));
            }
            other => panic!("expected RequestRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .fetch_extraction(&key(), "instruction", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_fetch_malformed_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"object":"error"}"#))
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .fetch_extraction(&key(), "instruction", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EnvelopeParse(_)));
    }

    #[tokio::test]
    async fn test_fetch_content_not_json() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("I could not find an event.")),
            )
            .mount(&server)
            .await;

        let err = gateway_for(&server)
            .fetch_extraction(&key(), "instruction", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EnvelopeParse(_)));
    }

    #[tokio::test]
    async fn test_fetch_loose_field_types() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"title":null,"all_day":"false","confidence":"0.6","start_time":1030}"#,
            )))
            .mount(&server)
            .await;

        let payload = gateway_for(&server)
            .fetch_extraction(&key(), "instruction", "text")
            .await
            .unwrap();
        assert!(payload.title.is_none());
        assert!(!payload.all_day);
        assert_eq!(payload.confidence, Some(0.6));
        assert_eq!(payload.start_time.as_deref(), Some("1030"));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{}"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(&config_for(&server, Duration::from_millis(200))).unwrap();
        let err = gateway
            .fetch_extraction(&key(), "instruction", "text")
            .await
            .unwrap_err();

        match err {
            GatewayError::Transport(msg) => assert!(msg.contains("timed out")),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Grab a free port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = GatewayConfig {
            base_url: Url::parse(&format!("http://127.0.0.1:{port}/v1")).unwrap(),
            model: "gpt-4o-mini".into(),
            timeout: Duration::from_secs(2),
        };

        let err = OpenAiGateway::new(&config)
            .unwrap()
            .fetch_extraction(&key(), "instruction", "text")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn test_cancelled_call_yields_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion(r#"{"confidence":0.9}"#))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let gateway = gateway_for(&server);
        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            gateway.fetch_extraction(&key(), "instruction", "text"),
        )
        .await;

        assert!(outcome.is_err(), "cancelled call must not produce a payload");
    }
}
