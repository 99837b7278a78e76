//! WeChat official account publishing: upload the cover, add a draft, and
//! optionally free-publish it and wait for the result.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{Error, PublishStep, Result};
use crate::http::{self, DEFAULT_REQUEST_TIMEOUT};
use crate::jimeng::PollPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.weixin.qq.com";
pub const TOKEN_PATH: &str = "/cgi-bin/token";
pub const UPLOAD_IMAGE_PATH: &str = "/cgi-bin/media/uploadimg";
pub const ADD_MATERIAL_PATH: &str = "/cgi-bin/material/add_material";
pub const ADD_DRAFT_PATH: &str = "/cgi-bin/draft/add";
pub const SUBMIT_PUBLISH_PATH: &str = "/cgi-bin/freepublish/submit";
pub const GET_PUBLISH_PATH: &str = "/cgi-bin/freepublish/get";

pub const DEFAULT_AUTHOR: &str = "AI助手";
const DIGEST_CHARS: usize = 120;

static IMG_SRC: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"<img[^>]+src="([^"]+)"[^>]*>"#).ok());

/// Publish-status polling: every 3 s, at most 10 times.
pub fn default_publish_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(3),
        max_wait: None,
        max_attempts: Some(10),
    }
}

/// HTML article plus draft options.
#[derive(Debug, Clone, Default)]
pub struct WechatArticle {
    pub title: String,
    /// HTML body. Inline `<img src>` images are re-hosted on WeChat before the draft is added.
    pub content: String,
    pub author: String,
    pub cover_image_url: Option<String>,
    /// Existing permanent material id; takes precedence over `cover_image_url`.
    pub thumb_media_id: Option<String>,
    pub need_open_comment: bool,
    pub only_fans_can_comment: bool,
    pub content_source_url: String,
    /// Submit the draft for publishing and wait for the outcome.
    pub auto_publish: bool,
}

impl WechatArticle {
    /// First 120 characters of the body.
    pub fn digest(&self) -> String {
        self.content.chars().take(DIGEST_CHARS).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    Publishing,
    Succeeded {
        article_id: Option<String>,
        article_url: Option<String>,
    },
    Failed(i64),
}

impl PublishState {
    pub const SUCCEEDED: i64 = 0;
    pub const PUBLISHING: i64 = 1;
}

/// Outcome of a WeChat publish run.
#[derive(Debug, Clone, PartialEq)]
pub struct WechatPublished {
    pub media_id: String,
    pub publish_id: Option<String>,
    pub article_id: Option<String>,
    pub article_url: Option<String>,
    pub is_draft: bool,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct DraftRequest<'a> {
    articles: [DraftArticle<'a>; 1],
}

#[derive(Debug, Serialize)]
struct DraftArticle<'a> {
    title: &'a str,
    author: &'a str,
    digest: String,
    content: &'a str,
    thumb_media_id: &'a str,
    need_open_comment: u8,
    only_fans_can_comment: u8,
    content_source_url: &'a str,
}

enum Cover<'a> {
    MediaId(&'a str),
    Url(&'a str),
}

impl<'a> Cover<'a> {
    fn of(article: &'a WechatArticle) -> Result<Self> {
        let non_empty = |v: &'a Option<String>| v.as_deref().filter(|s| !s.trim().is_empty());
        match (non_empty(&article.thumb_media_id), non_empty(&article.cover_image_url)) {
            (Some(id), _) => Ok(Cover::MediaId(id)),
            (None, Some(url)) => Ok(Cover::Url(url)),
            (None, None) => Err(Error::InvalidRequest(
                "cover_image_url or thumb_media_id is required".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct WechatClient {
    base_url: String,
    app_id: String,
    app_secret: String,
    /// Token relay that answers `GET ?app_id=&app_secret=` with `{access_token}`.
    token_url: Option<String>,
    http: Client,
    token: OnceCell<String>,
    publish_poll: PollPolicy,
}

impl WechatClient {
    pub fn new(base_url: String, app_id: String, app_secret: String) -> Self {
        Self::with_options(
            base_url,
            app_id,
            app_secret,
            DEFAULT_REQUEST_TIMEOUT,
            default_publish_poll(),
        )
    }

    pub fn with_options(
        base_url: String,
        app_id: String,
        app_secret: String,
        request_timeout: Duration,
        publish_poll: PollPolicy,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            app_secret,
            token_url: None,
            http: http::client_with_timeout(request_timeout),
            token: OnceCell::new(),
            publish_poll,
        }
    }

    /// Fetch tokens from a relay service instead of `/cgi-bin/token`.
    pub fn with_token_url(mut self, token_url: Option<String>) -> Self {
        self.token_url = token_url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Access token, fetched on first use and reused by this client.
    pub async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| self.fetch_token())
            .await?;
        Ok(token.as_str())
    }

    async fn fetch_token(&self) -> Result<String> {
        let request = match &self.token_url {
            Some(url) => self.http.get(url).query(&[
                ("app_id", self.app_id.as_str()),
                ("app_secret", self.app_secret.as_str()),
            ]),
            None => self
                .http
                .get(format!("{}{}", self.base_url, TOKEN_PATH))
                .query(&[
                    ("grant_type", "client_credential"),
                    ("appid", self.app_id.as_str()),
                    ("secret", self.app_secret.as_str()),
                ]),
        };
        let value = read_json(request.send().await?).await?;
        let body: TokenResponse = serde_json::from_value(value)?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| remote(-1, "no access_token in response".into()))
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .query(&[("access_token", token)])
            .json(body)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus { status, body });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn upload_image(&self, path: &str, query: &[(&str, &str)], image_url: &str) -> Result<Value> {
        let bytes = self.download(image_url).await?;
        let token = self.access_token().await?;
        let part = Part::bytes(bytes)
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .query(&[("access_token", token)])
            .query(query)
            .multipart(Form::new().part("media", part))
            .send()
            .await?;
        read_json(resp).await
    }

    /// POST /cgi-bin/material/add_material — permanent cover image, returns its media id.
    pub async fn upload_cover(&self, image_url: &str) -> Result<String> {
        let value = self
            .upload_image(ADD_MATERIAL_PATH, &[("type", "image")], image_url)
            .await?;
        id_field(&value, "media_id").ok_or_else(|| remote(-1, "no media_id in response".into()))
    }

    /// POST /cgi-bin/media/uploadimg — image for the article body, returns its URL.
    pub async fn upload_content_image(&self, image_url: &str) -> Result<String> {
        let value = self.upload_image(UPLOAD_IMAGE_PATH, &[], image_url).await?;
        id_field(&value, "url").ok_or_else(|| remote(-1, "no url in response".into()))
    }

    /// Re-host every `<img src>` in `html`. Images that fail to upload keep their original URL.
    pub async fn rehost_content_images(&self, html: &str) -> String {
        let Some(re) = IMG_SRC.as_ref() else {
            return html.to_string();
        };
        let mut sources: Vec<&str> = re
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect();
        sources.sort_unstable();
        sources.dedup();

        let mut out = html.to_string();
        for src in sources {
            match self.upload_content_image(src).await {
                Ok(url) => out = out.replace(src, &url),
                Err(e) => warn!(src, "content image left in place: {e}"),
            }
        }
        out
    }

    /// POST /cgi-bin/draft/add — returns the draft's media id.
    pub async fn add_draft(&self, article: &WechatArticle, thumb_media_id: &str, content: &str) -> Result<String> {
        let body = DraftRequest {
            articles: [DraftArticle {
                title: &article.title,
                author: &article.author,
                digest: article.digest(),
                content,
                thumb_media_id,
                need_open_comment: article.need_open_comment.into(),
                only_fans_can_comment: article.only_fans_can_comment.into(),
                content_source_url: &article.content_source_url,
            }],
        };
        let value = self.post_json(ADD_DRAFT_PATH, &body).await?;
        id_field(&value, "media_id").ok_or_else(|| remote(-1, "no media_id in response".into()))
    }

    /// POST /cgi-bin/freepublish/submit — returns the publish job id.
    pub async fn submit_publish(&self, media_id: &str) -> Result<String> {
        let value = self
            .post_json(SUBMIT_PUBLISH_PATH, &serde_json::json!({ "media_id": media_id }))
            .await?;
        id_field(&value, "publish_id").ok_or_else(|| remote(-1, "no publish_id in response".into()))
    }

    /// POST /cgi-bin/freepublish/get
    pub async fn publish_status(&self, publish_id: &str) -> Result<PublishState> {
        let value = self
            .post_json(GET_PUBLISH_PATH, &serde_json::json!({ "publish_id": publish_id }))
            .await?;
        let code = value
            .get("publish_status")
            .and_then(Value::as_i64)
            .ok_or_else(|| remote(-1, "no publish_status in response".into()))?;
        Ok(match code {
            PublishState::SUCCEEDED => PublishState::Succeeded {
                article_id: id_field(&value, "article_id"),
                article_url: value
                    .pointer("/article_detail/item/0/article_url")
                    .and_then(Value::as_str)
                    .map(String::from),
            },
            PublishState::PUBLISHING => PublishState::Publishing,
            other => PublishState::Failed(other),
        })
    }

    async fn wait_published(&self, publish_id: &str) -> Result<(Option<String>, Option<String>)> {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            let attempts_exhausted = self
                .publish_poll
                .max_attempts
                .is_some_and(|max| attempts >= max);
            let deadline_passed = self
                .publish_poll
                .max_wait
                .is_some_and(|max| start.elapsed() >= max);
            if attempts_exhausted || deadline_passed {
                return Err(Error::Timeout {
                    history_id: publish_id.to_string(),
                    attempts,
                });
            }

            sleep(self.publish_poll.interval).await;
            attempts += 1;

            match self.publish_status(publish_id).await? {
                PublishState::Publishing => debug!(publish_id, attempts, "wechat publish pending"),
                PublishState::Succeeded {
                    article_id,
                    article_url,
                } => return Ok((article_id, article_url)),
                PublishState::Failed(code) => {
                    return Err(remote(code, format!("publish status {code}")))
                }
            }
        }
    }

    /// Run token → cover → draft, then submit → poll when `auto_publish` is set.
    /// The first failing step aborts the rest.
    pub async fn publish(&self, article: &WechatArticle) -> Result<WechatPublished> {
        let cover = Cover::of(article)?;

        self.access_token()
            .await
            .map_err(|e| step_failed(PublishStep::FetchToken, e))?;

        let thumb_media_id = match cover {
            Cover::MediaId(id) => id.to_string(),
            Cover::Url(url) => self
                .upload_cover(url)
                .await
                .map_err(|e| step_failed(PublishStep::UploadCover, e))?,
        };

        let content = self.rehost_content_images(&article.content).await;
        let media_id = self
            .add_draft(article, &thumb_media_id, &content)
            .await
            .map_err(|e| step_failed(PublishStep::AddDraft, e))?;
        info!(media_id = %media_id, "wechat draft added");

        if !article.auto_publish {
            return Ok(WechatPublished {
                media_id,
                publish_id: None,
                article_id: None,
                article_url: None,
                is_draft: true,
            });
        }

        let publish_id = self
            .submit_publish(&media_id)
            .await
            .map_err(|e| step_failed(PublishStep::SubmitPublish, e))?;
        let (article_id, article_url) = self
            .wait_published(&publish_id)
            .await
            .map_err(|e| step_failed(PublishStep::QueryPublish, e))?;
        info!(publish_id = %publish_id, article_id = ?article_id, "wechat article published");

        Ok(WechatPublished {
            media_id,
            publish_id: Some(publish_id),
            article_id,
            article_url,
            is_draft: false,
        })
    }
}

/// Status check plus the `{errcode, errmsg}` envelope; errcode 0 or absent is success.
async fn read_json(resp: Response) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::HttpStatus { status, body });
    }
    let value: Value = serde_json::from_slice(&resp.bytes().await?)?;
    match value.get("errcode").and_then(Value::as_i64) {
        None | Some(0) => Ok(value),
        Some(code) => {
            let msg = value
                .get("errmsg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Err(remote(code, msg))
        }
    }
}

/// Non-empty string or integer field as a string.
fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn remote(code: i64, message: String) -> Error {
    Error::Remote {
        service: "wechat",
        code,
        message,
    }
}

fn step_failed(step: PublishStep, source: Error) -> Error {
    warn!(%step, "wechat publish step failed: {source}");
    Error::PublishStep {
        step,
        source: Box::new(source),
    }
}
