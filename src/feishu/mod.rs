//! Feishu (Lark) bot messaging via a tenant access token.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{Error, Result};
use crate::http::{self, DEFAULT_REQUEST_TIMEOUT};

pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";
pub const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
pub const MESSAGES_PATH: &str = "/open-apis/im/v1/messages";

pub const DEFAULT_RECEIVE_ID_TYPE: &str = "user_id";

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    receive_id: &'a str,
    msg_type: &'a str,
    /// JSON-encoded message content.
    content: String,
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    text: &'a str,
}

pub struct FeishuBot {
    base_url: String,
    app_id: String,
    app_secret: String,
    http: Client,
    token: OnceCell<String>,
}

impl FeishuBot {
    pub fn new(base_url: String, app_id: String, app_secret: String) -> Self {
        Self::with_timeout(base_url, app_id, app_secret, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: String,
        app_id: String,
        app_secret: String,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            app_secret,
            http: http::client_with_timeout(request_timeout),
            token: OnceCell::new(),
        }
    }

    /// Tenant access token, fetched on first use and reused by this bot.
    pub async fn tenant_access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| self.fetch_token())
            .await?;
        Ok(token.as_str())
    }

    async fn fetch_token(&self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, TOKEN_PATH))
            .json(&TokenRequest {
                app_id: &self.app_id,
                app_secret: &self.app_secret,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus { status, body });
        }

        let body: TokenResponse = serde_json::from_slice(&resp.bytes().await?)?;
        if body.code != 0 {
            return Err(remote(body.code, body.msg));
        }
        body.tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| remote(-1, "no tenant_access_token in response".into()))
    }

    /// POST /open-apis/im/v1/messages — send a plain-text message.
    pub async fn send_text(&self, receive_id: &str, text: &str, receive_id_type: &str) -> Result<Value> {
        let token = self.tenant_access_token().await?;
        let body = MessageRequest {
            receive_id,
            msg_type: "text",
            content: serde_json::to_string(&TextContent { text })?,
        };

        let resp = self
            .http
            .post(format!("{}{}", self.base_url, MESSAGES_PATH))
            .query(&[("receive_id_type", receive_id_type)])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(_) if !status.is_success() => {
                return Err(Error::HttpStatus {
                    status,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let code = value.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            let msg = value
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(remote(code, msg));
        }

        info!(receive_id_type, "feishu message sent");
        Ok(value)
    }
}

fn remote(code: i64, message: String) -> Error {
    Error::Remote {
        service: "feishu",
        code,
        message,
    }
}
