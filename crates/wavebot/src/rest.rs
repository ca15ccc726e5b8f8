//! Authenticated REST calls.
//!
//! Plain call/response: no retry, no rate-limit handling.

use std::fmt;

use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;
use wave_proto::{CreateMessage, Message};

use crate::config::ClientConfig;
use crate::error::GatewayError;

/// REST client authenticated with the bot token.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
    api_version: u8,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client for `api_base` (e.g. `https://discord.com/api`).
    #[must_use]
    pub fn new(token: impl Into<String>, api_base: impl Into<String>, api_version: u8) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_version,
        }
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured.
    pub fn from_config(config: &ClientConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(
            config.require_token()?,
            config.api_base.clone(),
            config.api_version,
        ))
    }

    fn resolve(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/v{}{}", self.api_base, self.api_version, path_or_url)
        }
    }

    /// Perform a request and decode the JSON response.
    ///
    /// `path_or_url` is either a path such as `/channels/1/messages`,
    /// resolved against the versioned API base, or an absolute URL.
    /// An empty response body decodes as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] on transport failure and
    /// [`GatewayError::Api`] on a non-success status.
    pub async fn request(
        &self,
        method: Method,
        path_or_url: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.resolve(path_or_url);
        debug!(%method, %url, "api request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::Api {
            status: status.as_u16(),
            body: format!("invalid JSON response: {e}"),
        })
    }

    /// Resolve the websocket URL to connect to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no usable `url`.
    pub async fn gateway_url(&self) -> Result<String, GatewayError> {
        let data = self.request(Method::GET, "/gateway/bot", None).await?;
        let base = data
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Connection("gateway response has no url".into()))?;

        let mut url = Url::parse(base)
            .map_err(|e| GatewayError::Connection(format!("invalid gateway url '{base}': {e}")))?;
        url.query_pairs_mut()
            .append_pair("v", &self.api_version.to_string())
            .append_pair("encoding", "json");
        Ok(url.into())
    }

    /// Post a message to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not a message.
    pub async fn send_message(
        &self,
        channel_id: &str,
        message: &CreateMessage,
    ) -> Result<Message, GatewayError> {
        let body = serde_json::to_value(message)
            .map_err(|e| wave_proto::ProtoError::Encoding(e.to_string()))?;
        let data = self
            .request(
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                Some(&body),
            )
            .await?;
        Ok(Message::from_payload(&data)?)
    }

    /// Reply to `message` in its channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn reply(
        &self,
        message: &Message,
        content: impl Into<String>,
    ) -> Result<Message, GatewayError> {
        let body = CreateMessage::new(content).reply_to(message.id.clone());
        self.send_message(&message.channel_id, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RestClient {
        RestClient::new("test-token", format!("{}/api", server.uri()), 10)
    }

    #[test]
    fn test_resolve_paths_and_absolute_urls() {
        let client = RestClient::new("t", "https://discord.com/api/", 10);
        assert_eq!(
            client.resolve("/gateway/bot"),
            "https://discord.com/api/v10/gateway/bot"
        );
        assert_eq!(
            client.resolve("https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client = RestClient::new("very-secret", "https://discord.com/api", 10);
        assert!(!format!("{client:?}").contains("very-secret"));
    }

    #[tokio::test]
    async fn test_gateway_url_appends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v10/gateway/bot"))
            .and(header("Authorization", "Bot test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": "wss://gateway.example.com",
                "shards": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = client_for(&server).gateway_url().await.expect("gateway url");
        assert_eq!(url, "wss://gateway.example.com/?v=10&encoding=json");
    }

    #[tokio::test]
    async fn test_reply_posts_message_reference() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/channels/2002/messages"))
            .and(header("Authorization", "Bot test-token"))
            .and(body_json(json!({
                "content": "Pong!",
                "message_reference": {"message_id": "1001"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "1002",
                "channel_id": "2002",
                "content": "Pong!"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let incoming = Message {
            id: "1001".to_string(),
            channel_id: "2002".to_string(),
            content: "!ping".to_string(),
            ..Message::default()
        };

        let sent = client_for(&server)
            .reply(&incoming, "Pong!")
            .await
            .expect("reply");
        assert_eq!(sent.id, "1002");
        assert_eq!(sent.content, "Pong!");
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v10/gateway/bot"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
            .mount(&server)
            .await;

        let err = client_for(&server).gateway_url().await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Api { status: 401, ref body } if body == "401: Unauthorized"
        ));
    }

    #[tokio::test]
    async fn test_empty_body_decodes_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/channels/5/typing"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let value = client_for(&server)
            .request(Method::POST, "/channels/5/typing", None)
            .await
            .expect("request");
        assert_eq!(value, Value::Null);
    }
}
