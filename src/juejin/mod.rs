//! Juejin article publishing (create draft, update its metadata, publish) and
//! the category/column/tag lookups that feed the metadata.

use std::time::Duration;

use reqwest::header::{ACCEPT, COOKIE, REFERER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, PublishStep, Result};
use crate::http::{self, DEFAULT_REQUEST_TIMEOUT};

pub const DEFAULT_BASE_URL: &str = "https://api.juejin.cn";
pub const CREATE_DRAFT_PATH: &str = "/content_api/v1/article_draft/create";
pub const UPDATE_DRAFT_PATH: &str = "/content_api/v1/article_draft/update";
pub const PUBLISH_PATH: &str = "/content_api/v1/article/publish";
pub const CATEGORY_LIST_PATH: &str = "/tag_api/v1/query_category_list";
pub const COLUMN_LIST_PATH: &str = "/content_api/v1/column/self_center_list";
pub const TAG_LIST_PATH: &str = "/tag_api/v1/query_tag_list";

pub const DEFAULT_CATEGORY_ID: &str = "6809637767543259144";

const AID: &str = "2608";
const CLIENT_UUID: &str = "7293505961473721866";
const REFERER_URL: &str = "https://juejin.cn/";
/// Markdown editor.
const EDIT_TYPE: u32 = 10;
const ENCRYPTED_WORD_COUNT: u64 = 1_077_848;

/// Article content plus the metadata applied on update.
#[derive(Debug, Clone, Default)]
pub struct Article {
    pub title: String,
    pub markdown: String,
    pub category_id: String,
    pub column_ids: Vec<String>,
    pub theme_ids: Vec<String>,
    pub tag_ids: Vec<String>,
    pub brief_content: String,
    pub cover_image: String,
}

impl Article {
    pub fn word_count(&self) -> usize {
        self.markdown.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftId(pub String);

/// Outcome of a full publish run.
#[derive(Debug, Clone)]
pub struct Published {
    pub draft_id: DraftId,
    pub article_id: Option<String>,
    pub response: Value,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct DraftBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    category_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    column_ids: Option<&'a [String]>,
    theme_ids: &'a [String],
    tag_ids: &'a [String],
    link_url: &'a str,
    cover_image: &'a str,
    title: &'a str,
    brief_content: &'a str,
    edit_type: u32,
    html_content: &'a str,
    mark_content: &'a str,
    pics: &'a [String],
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    draft_id: &'a str,
    sync_to_org: bool,
    column_ids: &'a [String],
    theme_ids: &'a [String],
    encrypted_word_count: u64,
    origin_word_count: usize,
}

#[derive(Debug, Serialize)]
struct ColumnQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    cursor: &'a str,
    keyword: &'a str,
    limit: u32,
}

#[derive(Debug, Serialize)]
struct TagQuery<'a> {
    cursor: &'a str,
    key_word: &'a str,
    limit: u32,
    /// Hottest first.
    sort_type: u32,
}

/// Cursor pagination shared by the column and tag lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub cursor: String,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            cursor: "0".into(),
            limit: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    err_no: Option<i64>,
    #[serde(default)]
    err_msg: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct DraftData {
    id: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct JuejinClient {
    base_url: String,
    http: Client,
}

impl JuejinClient {
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: String, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http::client_with_timeout(request_timeout),
        }
    }

    async fn post<B: Serialize>(&self, path: &str, cookie: &str, body: &B) -> Result<Value> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .query(&[("aid", AID), ("uuid", CLIENT_UUID)])
            .header(ACCEPT, "*/*")
            .header(COOKIE, cookie)
            .header(REFERER, REFERER_URL)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus { status, body });
        }

        let envelope: Envelope = serde_json::from_slice(&resp.bytes().await?)?;
        match envelope.err_no {
            Some(0) => Ok(envelope.data),
            code => Err(Error::Remote {
                service: "juejin",
                code: code.unwrap_or(-1),
                message: envelope.err_msg.unwrap_or_default(),
            }),
        }
    }

    async fn post_data<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        cookie: &str,
        body: &B,
    ) -> Result<T> {
        let data = self.post(path, cookie, body).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// POST /content_api/v1/article_draft/create
    pub async fn create_draft(&self, cookie: &str, title: &str, markdown: &str) -> Result<DraftId> {
        let body = DraftBody {
            id: None,
            category_id: "0",
            column_ids: None,
            theme_ids: &[],
            tag_ids: &[],
            link_url: "",
            cover_image: "",
            title,
            brief_content: "",
            edit_type: EDIT_TYPE,
            html_content: "deprecated",
            mark_content: markdown,
            pics: &[],
        };
        let data: DraftData = self.post_data(CREATE_DRAFT_PATH, cookie, &body).await?;
        Ok(DraftId(data.id))
    }

    /// POST /content_api/v1/article_draft/update
    pub async fn update_draft(&self, cookie: &str, draft: &DraftId, article: &Article) -> Result<Value> {
        let category_id = if article.category_id.is_empty() {
            DEFAULT_CATEGORY_ID
        } else {
            article.category_id.as_str()
        };
        let body = DraftBody {
            id: Some(draft.0.as_str()),
            category_id,
            column_ids: Some(article.column_ids.as_slice()),
            theme_ids: &article.theme_ids,
            tag_ids: &article.tag_ids,
            link_url: "",
            cover_image: &article.cover_image,
            title: &article.title,
            brief_content: &article.brief_content,
            edit_type: EDIT_TYPE,
            html_content: "deprecated",
            mark_content: &article.markdown,
            pics: &[],
        };
        self.post(UPDATE_DRAFT_PATH, cookie, &body).await
    }

    /// POST /content_api/v1/article/publish
    pub async fn publish_article(&self, cookie: &str, draft: &DraftId, word_count: usize) -> Result<Value> {
        let body = PublishBody {
            draft_id: &draft.0,
            sync_to_org: false,
            column_ids: &[],
            theme_ids: &[],
            encrypted_word_count: ENCRYPTED_WORD_COUNT,
            origin_word_count: word_count,
        };
        self.post(PUBLISH_PATH, cookie, &body).await
    }

    /// POST /tag_api/v1/query_category_list — the `category` object of each entry.
    pub async fn list_categories(&self, cookie: &str) -> Result<Vec<Value>> {
        let data = self.post(CATEGORY_LIST_PATH, cookie, &serde_json::json!({})).await?;
        Ok(pluck(data, "category"))
    }

    /// POST /content_api/v1/column/self_center_list — the logged-in user's columns.
    pub async fn list_columns(&self, cookie: &str, user_id: Option<&str>, page: &Page) -> Result<Vec<Value>> {
        let body = ColumnQuery {
            user_id,
            cursor: &page.cursor,
            keyword: "",
            limit: page.limit,
        };
        let data = self.post(COLUMN_LIST_PATH, cookie, &body).await?;
        Ok(pluck(data, "column_version"))
    }

    /// POST /tag_api/v1/query_tag_list
    pub async fn list_tags(&self, cookie: &str, keyword: &str, page: &Page) -> Result<Vec<Value>> {
        let body = TagQuery {
            cursor: &page.cursor,
            key_word: keyword,
            limit: page.limit,
            sort_type: 1,
        };
        let data = self.post(TAG_LIST_PATH, cookie, &body).await?;
        Ok(pluck(data, "tag"))
    }

    /// Run create → update → publish. The first failing step aborts the rest.
    pub async fn publish(&self, cookie: &str, article: &Article) -> Result<Published> {
        let draft = self
            .create_draft(cookie, &article.title, &article.markdown)
            .await
            .map_err(|e| step_failed(PublishStep::CreateDraft, e))?;
        info!(draft_id = %draft.0, "juejin draft created");

        self.update_draft(cookie, &draft, article)
            .await
            .map_err(|e| step_failed(PublishStep::UpdateDraft, e))?;

        let response = self
            .publish_article(cookie, &draft, article.word_count())
            .await
            .map_err(|e| step_failed(PublishStep::Publish, e))?;

        let article_id = response
            .get("article_id")
            .and_then(|v| v.as_str().map(String::from).or_else(|| v.as_i64().map(|n| n.to_string())));
        info!(draft_id = %draft.0, article_id = ?article_id, "juejin article published");

        Ok(Published {
            draft_id: draft,
            article_id,
            response,
        })
    }
}

/// Collect `field` from every entry of a list payload; entries without it are skipped.
fn pluck(data: Value, field: &str) -> Vec<Value> {
    match data {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|mut item| item.get_mut(field).map(Value::take))
            .collect(),
        _ => Vec::new(),
    }
}

fn step_failed(step: PublishStep, source: Error) -> Error {
    warn!(%step, "juejin publish step failed: {source}");
    Error::PublishStep {
        step,
        source: Box::new(source),
    }
}
