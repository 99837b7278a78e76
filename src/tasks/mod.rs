pub mod image;
pub mod publish;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::feishu;
use crate::jimeng::types::{GenerationRequest, ImageModel};
use crate::jimeng::JimengClient;
use crate::juejin::{Article, JuejinClient, Page, Published};
use crate::settings::Settings;
use crate::wechat::{self, WechatArticle, WechatPublished};

// ---------------------------------------------------------------------------
// Defaults — single source of truth for tool schemas and validation
// ---------------------------------------------------------------------------

pub const DEFAULT_IMAGE_MODEL: ImageModel = ImageModel::Jimeng21;
pub const DEFAULT_IMAGE_WIDTH: u32 = 1024;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 1024;
pub const DEFAULT_SAMPLE_STRENGTH: f64 = 0.75;

/// Caller-facing names of every supported image model.
pub fn image_model_names() -> Vec<&'static str> {
    ImageModel::ALL.iter().map(|m| m.name()).collect()
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Split a comma-separated id list, dropping blanks.
fn split_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tool parameters — with validation + defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageParams {
    pub cookie: String,
    pub prompt: String,
    pub model: Option<String>,
    pub negative_prompt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sample_strength: Option<f64>,
}

impl ImageParams {
    /// Apply defaults and validate. Called before any network I/O.
    pub fn normalize(self) -> Result<GenerationRequest> {
        require("cookie", &self.cookie)?;
        require("prompt", &self.prompt)?;
        let req = GenerationRequest {
            prompt: self.prompt,
            negative_prompt: self.negative_prompt.unwrap_or_default(),
            model: self
                .model
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.name().to_string()),
            width: self.width.unwrap_or(DEFAULT_IMAGE_WIDTH),
            height: self.height.unwrap_or(DEFAULT_IMAGE_HEIGHT),
            sample_strength: self.sample_strength.unwrap_or(DEFAULT_SAMPLE_STRENGTH),
        };
        req.validate()?;
        Ok(req)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JuejinParams {
    pub cookies: String,
    pub title: String,
    pub content: String,
    pub category_id: Option<String>,
    /// Comma-separated.
    pub column_ids: Option<String>,
    /// Comma-separated.
    pub theme_ids: Option<String>,
    /// Comma-separated.
    pub tag_ids: Option<String>,
}

impl JuejinParams {
    pub fn normalize(self) -> Result<Article> {
        require("cookies", &self.cookies)?;
        require("title", &self.title)?;
        require("content", &self.content)?;
        Ok(Article {
            column_ids: split_ids(self.column_ids.as_deref()),
            theme_ids: split_ids(self.theme_ids.as_deref()),
            tag_ids: split_ids(self.tag_ids.as_deref()),
            category_id: self.category_id.unwrap_or_default(),
            title: self.title,
            markdown: self.content,
            ..Article::default()
        })
    }
}

/// Which Juejin lookup to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JuejinLookup {
    Categories,
    Columns,
    Tags,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JuejinLookupParams {
    pub cookies: String,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
    /// Tag search keyword.
    pub keyword: Option<String>,
    /// Column owner; the cookie's user when absent.
    pub user_id: Option<String>,
}

impl JuejinLookupParams {
    pub fn page(&self) -> Result<Page> {
        require("cookies", &self.cookies)?;
        let mut page = Page::default();
        if let Some(cursor) = self.cursor.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            page.cursor = cursor.to_string();
        }
        match self.limit {
            Some(0) => return Err(Error::InvalidRequest("limit must be positive".into())),
            Some(limit) => page.limit = limit,
            None => {}
        }
        Ok(page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WechatParams {
    pub app_id: String,
    pub app_secret: String,
    pub title: String,
    /// HTML.
    pub content: String,
    pub author: Option<String>,
    pub cover_image_url: Option<String>,
    pub thumb_media_id: Option<String>,
    pub need_open_comment: Option<bool>,
    pub only_fans_can_comment: Option<bool>,
    pub content_source_url: Option<String>,
    pub auto_publish: Option<bool>,
}

impl WechatParams {
    /// Validate credentials and content; returns the app id/secret and the article.
    pub fn normalize(self) -> Result<(String, String, WechatArticle)> {
        require("app_id", &self.app_id)?;
        require("app_secret", &self.app_secret)?;
        require("title", &self.title)?;
        require("content", &self.content)?;
        let has_cover = [&self.cover_image_url, &self.thumb_media_id]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()));
        if !has_cover {
            return Err(Error::InvalidRequest(
                "cover_image_url or thumb_media_id is required".into(),
            ));
        }
        let article = WechatArticle {
            title: self.title,
            content: self.content,
            author: self
                .author
                .unwrap_or_else(|| wechat::DEFAULT_AUTHOR.to_string()),
            cover_image_url: self.cover_image_url,
            thumb_media_id: self.thumb_media_id,
            need_open_comment: self.need_open_comment.unwrap_or(false),
            only_fans_can_comment: self.only_fans_can_comment.unwrap_or(false),
            content_source_url: self.content_source_url.unwrap_or_default(),
            auto_publish: self.auto_publish.unwrap_or(false),
        };
        Ok((self.app_id, self.app_secret, article))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeishuParams {
    pub app_id: String,
    pub app_secret: String,
    pub user_id: String,
    pub message: String,
    pub receive_id_type: Option<String>,
}

impl FeishuParams {
    pub fn normalize(&mut self) -> Result<()> {
        require("app_id", &self.app_id)?;
        require("app_secret", &self.app_secret)?;
        require("user_id", &self.user_id)?;
        require("message", &self.message)?;
        self.receive_id_type
            .get_or_insert_with(|| feishu::DEFAULT_RECEIVE_ID_TYPE.into());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Toolkit — owns the clients, runs one tool invocation at a time per call
// ---------------------------------------------------------------------------

/// Where the per-call Feishu and WeChat clients connect.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub feishu_base_url: String,
    pub wechat_base_url: String,
    pub wechat_token_url: Option<String>,
    pub request_timeout: Duration,
}

pub struct Toolkit {
    jimeng: Arc<JimengClient>,
    juejin: Arc<JuejinClient>,
    endpoints: Endpoints,
    shutdown: CancellationToken,
}

impl Toolkit {
    pub fn new(settings: &Settings) -> Self {
        let request_timeout = settings.request_timeout();
        let jimeng = JimengClient::with_options(
            settings.jimeng_base_url.clone(),
            request_timeout,
            settings.poll_policy(),
        );
        let juejin = JuejinClient::with_timeout(settings.juejin_base_url.clone(), request_timeout);
        Self {
            jimeng: Arc::new(jimeng),
            juejin: Arc::new(juejin),
            endpoints: Endpoints {
                feishu_base_url: settings.feishu_base_url.clone(),
                wechat_base_url: settings.wechat_base_url.clone(),
                wechat_token_url: settings.wechat_token_url.clone(),
                request_timeout,
            },
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops every in-flight image wait.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Generate images and return their URLs.
    pub async fn generate_image(&self, params: ImageParams) -> Result<Vec<String>> {
        let cookie = params.cookie.clone();
        let req = params.normalize()?;
        image::run_image_task(&self.jimeng, &req, &cookie, &self.shutdown.child_token()).await
    }

    /// Publish a markdown article to Juejin.
    pub async fn publish_juejin(&self, params: JuejinParams) -> Result<Published> {
        let cookies = params.cookies.clone();
        let article = params.normalize()?;
        publish::run_juejin_task(&self.juejin, &article, &cookies).await
    }

    /// Run one Juejin lookup and return the unwrapped entries.
    pub async fn lookup_juejin(&self, lookup: JuejinLookup, params: JuejinLookupParams) -> Result<Vec<Value>> {
        let page = params.page()?;
        publish::run_juejin_lookup(&self.juejin, lookup, &params, &page).await
    }

    /// Add a WeChat draft, publishing it when requested.
    pub async fn publish_wechat(&self, params: WechatParams) -> Result<WechatPublished> {
        let (app_id, app_secret, article) = params.normalize()?;
        publish::run_wechat_task(&self.endpoints, app_id, app_secret, &article).await
    }

    /// Send a text message through a Feishu bot.
    pub async fn send_feishu(&self, mut params: FeishuParams) -> Result<Value> {
        params.normalize()?;
        publish::run_feishu_task(&self.endpoints, &params).await
    }
}
