use async_trait::async_trait;
use futures_util::StreamExt;
use goose_desktop_models::{
    ExtensionConfig, ExtensionResponse, RemoveExtensionRequest, ReplyRequest, SessionDetails,
    SessionInfo, SessionListResponse, SharedSessionDetails, StatusResponse,
    ToolConfirmationResponse, ToolResultRequest,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::error::TransportError;
use crate::transport::{ExtensionBackend, ReplyBody, ReplyTransport, SharedSessionSource};

const SECRET_KEY_HEADER: &str = "X-Secret-Key";

/// HTTP client for the local goosed process.
#[derive(Debug, Clone)]
pub struct GoosedClient {
    base_url: String,
    secret_key: Option<String>,
    http: reqwest::Client,
}

impl GoosedClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        // no overall timeout: reply streams stay open for the whole turn
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: None,
            http,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, TransportError> {
        let client = Self::new(config.base_url.clone())?;
        Ok(match &config.secret_key {
            Some(key) => client.with_secret_key(key.clone()),
            None => client,
        })
    }

    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.secret_key {
            request.header(SECRET_KEY_HEADER, key)
        } else {
            request
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let response = self.add_auth_header(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(TransportError::http_status(status.as_u16(), body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        let response = self.send(self.http.get(url)).await?;
        Ok(response.json().await?)
    }

    /// Start a turn. The body is returned unparsed.
    pub async fn reply(&self, request: &ReplyRequest) -> Result<ReplyBody, TransportError> {
        debug!("POST /reply with {} messages", request.messages.len());
        let response = self
            .send(
                self.http
                    .post(self.url("/reply"))
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(request),
            )
            .await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from));
        Ok(body.boxed())
    }

    pub async fn submit_tool_result(&self, request: &ToolResultRequest) -> Result<(), TransportError> {
        debug!("POST /tool_result for {}", request.id);
        self.send(self.http.post(self.url("/tool_result")).json(request))
            .await?;
        Ok(())
    }

    pub async fn confirm_tool(&self, response: &ToolConfirmationResponse) -> Result<(), TransportError> {
        debug!("POST /confirm for {}", response.id);
        self.send(self.http.post(self.url("/confirm")).json(response))
            .await?;
        Ok(())
    }

    pub async fn add_extension(&self, config: &ExtensionConfig) -> Result<(), TransportError> {
        info!("Registering extension '{}'", config.name());
        let response = self
            .send(self.http.post(self.url("/extensions/add")).json(config))
            .await?;
        check_extension_response(response.json().await?)
    }

    pub async fn remove_extension(&self, name: &str) -> Result<(), TransportError> {
        info!("Removing extension '{}'", name);
        let request = RemoveExtensionRequest {
            name: name.to_string(),
        };
        let response = self
            .send(self.http.post(self.url("/extensions/remove")).json(&request))
            .await?;
        check_extension_response(response.json().await?)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, TransportError> {
        let response: SessionListResponse = self.get_json(&self.url("/sessions")).await?;
        Ok(response.sessions)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionDetails, TransportError> {
        self.get_json(&self.url(&format!("/sessions/{}", session_id)))
            .await
    }

    /// Fetch a shared session from the sharing service at `share_base_url`.
    pub async fn fetch_shared_session(
        &self,
        share_base_url: &str,
        token: &str,
    ) -> Result<SessionDetails, TransportError> {
        let url = format!(
            "{}/sessions/share/{}",
            share_base_url.trim_end_matches('/'),
            token
        );
        info!("Fetching shared session {}", token);
        let shared: SharedSessionDetails = self.get_json(&url).await?;
        Ok(shared.into())
    }

    pub async fn status(&self) -> Result<String, TransportError> {
        let response = self.send(self.http.get(self.url("/status"))).await?;
        let text = response.text().await?;
        // older goosed versions answer with plain text
        Ok(serde_json::from_str::<StatusResponse>(&text)
            .map(|s| s.status)
            .unwrap_or(text))
    }
}

fn check_extension_response(response: ExtensionResponse) -> Result<(), TransportError> {
    if response.error {
        return Err(TransportError::Rejected {
            message: response
                .message
                .unwrap_or_else(|| "Unknown error".to_string()),
        });
    }
    Ok(())
}

#[async_trait]
impl ReplyTransport for GoosedClient {
    async fn reply(&self, request: ReplyRequest) -> Result<ReplyBody, TransportError> {
        GoosedClient::reply(self, &request).await
    }

    async fn submit_tool_result(&self, request: ToolResultRequest) -> Result<(), TransportError> {
        GoosedClient::submit_tool_result(self, &request).await
    }

    async fn confirm_tool(
        &self,
        response: ToolConfirmationResponse,
    ) -> Result<(), TransportError> {
        GoosedClient::confirm_tool(self, &response).await
    }
}

#[async_trait]
impl ExtensionBackend for GoosedClient {
    async fn add_extension(&self, config: &ExtensionConfig) -> Result<(), TransportError> {
        GoosedClient::add_extension(self, config).await
    }

    async fn remove_extension(&self, name: &str) -> Result<(), TransportError> {
        GoosedClient::remove_extension(self, name).await
    }
}

#[async_trait]
impl SharedSessionSource for GoosedClient {
    async fn fetch_shared_session(
        &self,
        share_base_url: &str,
        token: &str,
    ) -> Result<SessionDetails, TransportError> {
        GoosedClient::fetch_shared_session(self, share_base_url, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::frame_stream;
    use goose_desktop_models::{Content, Message, StreamEvent, ToolResultPayload};
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_reply_streams_frames_with_secret_header() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"type\":\"Message\",\"message\":{\"role\":\"assistant\",\"created\":1,\"content\":[{\"type\":\"text\",\"text\":\"Hi\"}]}}\n\n",
            "data: {\"type\":\"Finish\",\"reason\":\"stop\"}\n\n",
        );
        let mock = server
            .mock("POST", "/reply")
            .match_header("x-secret-key", "test-secret")
            .match_body(Matcher::PartialJson(json!({"session_id": "s1"})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = GoosedClient::new(server.url())
            .unwrap()
            .with_secret_key("test-secret");
        let request = ReplyRequest {
            messages: vec![Message::user().with_text("hello")],
            session_id: Some("s1".to_string()),
            session_working_dir: None,
        };
        let reply = client.reply(&request).await.unwrap();
        let frames: Vec<_> = frame_stream(reply).collect().await;

        mock.assert_async().await;
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            frames[1].as_ref().unwrap(),
            StreamEvent::Finish { .. }
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reply")
            .with_status(428)
            .with_body("agent not configured")
            .create_async()
            .await;

        let client = GoosedClient::new(server.url()).unwrap();
        let request = ReplyRequest {
            messages: vec![],
            session_id: None,
            session_working_dir: None,
        };
        let err = match client.reply(&request).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(err.status(), Some(428));
        assert!(err.to_string().contains("agent not configured"));
    }

    #[tokio::test]
    async fn test_submit_tool_result_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tool_result")
            .match_body(Matcher::Json(json!({
                "id": "f1",
                "result": {"Ok": [{"type": "text", "text": "copied"}]}
            })))
            .with_status(200)
            .create_async()
            .await;

        let client = GoosedClient::new(server.url()).unwrap();
        client
            .submit_tool_result(&ToolResultRequest {
                id: "f1".to_string(),
                result: ToolResultPayload::Ok(vec![Content::text("copied")]),
            })
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_add_extension_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/extensions/add")
            .with_status(200)
            .with_body(r#"{"error": true, "message": "Failed to start server"}"#)
            .create_async()
            .await;

        let client = GoosedClient::new(server.url()).unwrap();
        let config = ExtensionConfig::Builtin {
            name: "developer".to_string(),
            timeout: None,
        };
        let err = client.add_extension(&config).await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected { ref message } if message == "Failed to start server"));
    }

    #[tokio::test]
    async fn test_fetch_shared_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/sessions/share/tok-1")
            .with_status(200)
            .with_body(
                json!({
                    "share_token": "tok-1",
                    "description": "demo",
                    "messages": []
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GoosedClient::new("http://127.0.0.1:1").unwrap();
        let session = client
            .fetch_shared_session(&format!("{}/", server.url()), "tok-1")
            .await
            .unwrap();
        assert_eq!(session.session_id, "tok-1");
        assert_eq!(session.metadata.description, "demo");
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/sessions")
            .with_status(200)
            .with_body(
                json!({"sessions": [{
                    "id": "20250101_1",
                    "path": "/tmp/20250101_1.jsonl",
                    "modified": "2025-01-01 10:00:00 UTC",
                    "metadata": {"description": "first", "working_dir": "/tmp", "message_count": 4}
                }]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = GoosedClient::new(server.url()).unwrap();
        let sessions = client.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].metadata.message_count, 4);
    }

    #[tokio::test]
    async fn test_remove_extension_sends_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/extensions/remove")
            .match_body(Matcher::Json(json!({"name": "Fetch"})))
            .with_status(200)
            .with_body(r#"{"error": false}"#)
            .create_async()
            .await;

        let client = GoosedClient::new(server.url()).unwrap();
        client.remove_extension("Fetch").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_accepts_json_and_plain_text() {
        let mut server = mockito::Server::new_async().await;
        let json_mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .expect(1)
            .create_async()
            .await;
        let client = GoosedClient::new(server.url()).unwrap();
        assert_eq!(client.status().await.unwrap(), "ok");
        json_mock.assert_async().await;
        json_mock.remove_async().await;

        server
            .mock("GET", "/status")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;
        assert_eq!(client.status().await.unwrap(), "ok");
    }
}
