use crate::core::inbox::{GmailError, GmailMessage, MailApi, MessageFormat, MessageRef};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// `messages.list` omits the `messages` key entirely for an empty mailbox.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Thin REST client for the two Gmail calls the bot makes.
pub struct GmailApiClient {
    client: Client,
    base_url: String,
}

impl GmailApiClient {
    pub fn new() -> Result<Self, GmailError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| GmailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: GMAIL_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, GmailError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // Google wraps errors as {"error": {"code", "message", ...}}.
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(GmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| GmailError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| GmailError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MailApi for GmailApiClient {
    async fn list_messages(
        &self,
        access_token: &str,
        max_results: u32,
        query: &str,
    ) -> Result<Vec<MessageRef>, GmailError> {
        let url = format!("{}/users/me/messages", self.base_url);

        let mut params = vec![("maxResults", max_results.to_string())];
        if !query.is_empty() {
            params.push(("q", query.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| GmailError::Transport(e.to_string()))?;

        let list: MessagesListResponse = Self::read_json(resp).await?;
        Ok(list.messages)
    }

    async fn get_message(
        &self,
        access_token: &str,
        message_id: &str,
        format: MessageFormat,
    ) -> Result<GmailMessage, GmailError> {
        let url = format!("{}/users/me/messages/{}", self.base_url, message_id);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("format", format.as_str())])
            .send()
            .await
            .map_err(|e| GmailError::Transport(e.to_string()))?;

        Self::read_json(resp).await
    }
}
