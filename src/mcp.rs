use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router, ErrorData, ServerHandler,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Error;
use crate::tasks::{
    self, FeishuParams, ImageParams, JuejinLookup, JuejinLookupParams, JuejinParams, Toolkit,
    WechatParams,
};

// ---------------------------------------------------------------------------
// Tool parameter schemas (derive JsonSchema for rmcp auto-schema)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageParams {
    /// Cookie string from a logged-in jimeng.jianying.com browser session.
    pub cookie: String,
    /// Text prompt describing the image to generate.
    pub prompt: String,
    /// Model name. Defaults to "jimeng-2.1".
    #[serde(default)]
    pub model: Option<String>,
    /// What the image should avoid.
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// Width in pixels. Defaults to 1024.
    #[serde(default)]
    pub width: Option<u32>,
    /// Height in pixels. Defaults to 1024.
    #[serde(default)]
    pub height: Option<u32>,
    /// Prompt adherence in [0, 1]. Defaults to 0.75.
    #[serde(default)]
    pub sample_strength: Option<f64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PublishJuejinParams {
    /// Cookie string from a logged-in juejin.cn browser session.
    pub cookies: String,
    /// Article title.
    pub title: String,
    /// Article body in Markdown.
    pub content: String,
    /// Category ID. Defaults to the backend category.
    #[serde(default)]
    pub category_id: Option<String>,
    /// Comma-separated column IDs.
    #[serde(default)]
    pub column_ids: Option<String>,
    /// Comma-separated topic IDs.
    #[serde(default)]
    pub theme_ids: Option<String>,
    /// Comma-separated tag IDs.
    #[serde(default)]
    pub tag_ids: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct JuejinCategoriesParams {
    /// Cookie string from a logged-in juejin.cn browser session.
    pub cookies: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct JuejinColumnsParams {
    /// Cookie string from a logged-in juejin.cn browser session.
    pub cookies: String,
    /// Column owner's user ID. Defaults to the logged-in user.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Pagination cursor. Defaults to "0".
    #[serde(default)]
    pub cursor: Option<String>,
    /// Page size. Defaults to 10.
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct JuejinTagsParams {
    /// Cookie string from a logged-in juejin.cn browser session.
    pub cookies: String,
    /// Search keyword; empty lists the most popular tags.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Pagination cursor. Defaults to "0".
    #[serde(default)]
    pub cursor: Option<String>,
    /// Page size. Defaults to 10.
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PublishWechatParams {
    /// Official account AppID.
    pub app_id: String,
    /// Official account AppSecret.
    pub app_secret: String,
    /// Article title.
    pub title: String,
    /// Article body in HTML. Inline images are re-uploaded to WeChat.
    pub content: String,
    /// Author shown on the article. Defaults to "AI助手".
    #[serde(default)]
    pub author: Option<String>,
    /// Cover image URL; uploaded as permanent material.
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Existing cover material ID. Used instead of cover_image_url when given.
    #[serde(default)]
    pub thumb_media_id: Option<String>,
    /// Open comments. Defaults to false.
    #[serde(default)]
    pub need_open_comment: Option<bool>,
    /// Only followers may comment. Defaults to false.
    #[serde(default)]
    pub only_fans_can_comment: Option<bool>,
    /// "Read more" link.
    #[serde(default)]
    pub content_source_url: Option<String>,
    /// Publish right away instead of leaving a draft. Defaults to false.
    #[serde(default)]
    pub auto_publish: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FeishuSendParams {
    /// Feishu app ID (cli_...).
    pub app_id: String,
    /// Feishu app secret.
    pub app_secret: String,
    /// Recipient ID, interpreted according to receive_id_type.
    pub user_id: String,
    /// Plain-text message body.
    pub message: String,
    /// "user_id" (default), "open_id", "union_id", "email" or "chat_id".
    #[serde(default)]
    pub receive_id_type: Option<String>,
}

// ---------------------------------------------------------------------------
// MCP Server
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PublishKitMcp {
    toolkit: Arc<Toolkit>,
    tool_router: ToolRouter<Self>,
}

impl PublishKitMcp {
    pub fn new(toolkit: Arc<Toolkit>) -> Self {
        Self {
            toolkit,
            tool_router: Self::tool_router(),
        }
    }
}

fn success(value: serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(value.to_string())])
}

fn failure_body(action: &str, e: &Error) -> serde_json::Value {
    serde_json::json!({
        "error": e.kind(),
        "message": format!("{action} failed: {e}"),
    })
}

/// Tool-level failure: reported to the client as an error result, not a protocol error.
fn failure(action: &str, e: &Error) -> CallToolResult {
    CallToolResult::error(vec![Content::text(failure_body(action, e).to_string())])
}

#[tool_router]
impl PublishKitMcp {
    #[tool(description = "Generate images with Jimeng (即梦). \
        Submits the prompt, waits for the job to finish and returns the image URLs. \
        Needs the cookie of a logged-in jimeng.jianying.com session. \
        Models: jimeng-2.1 (default), jimeng-2.0-pro, jimeng-2.0, jimeng-1.4, jimeng-xl-pro. \
        Typically takes 10-30s.")]
    async fn generate_image(
        &self,
        Parameters(params): Parameters<GenerateImageParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let image_params = ImageParams {
            cookie: params.cookie,
            prompt: params.prompt,
            model: params.model,
            negative_prompt: params.negative_prompt,
            width: params.width,
            height: params.height,
            sample_strength: params.sample_strength,
        };

        match self.toolkit.generate_image(image_params).await {
            Ok(urls) => Ok(success(serde_json::json!({ "urls": urls }))),
            Err(e) => Ok(failure("Image generation", &e)),
        }
    }

    #[tool(description = "List the image model names accepted by generate_image.")]
    async fn list_image_models(&self) -> Result<CallToolResult, ErrorData> {
        Ok(success(serde_json::json!({
            "models": tasks::image_model_names(),
            "default": tasks::DEFAULT_IMAGE_MODEL.name(),
        })))
    }

    #[tool(description = "Publish a Markdown article to Juejin (掘金). \
        Creates a draft, applies category/columns/topics/tags, then publishes it. \
        Needs the cookie of a logged-in juejin.cn session. \
        On failure the error names the step that failed.")]
    async fn publish_juejin(
        &self,
        Parameters(params): Parameters<PublishJuejinParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let juejin_params = JuejinParams {
            cookies: params.cookies,
            title: params.title,
            content: params.content,
            category_id: params.category_id,
            column_ids: params.column_ids,
            theme_ids: params.theme_ids,
            tag_ids: params.tag_ids,
        };

        match self.toolkit.publish_juejin(juejin_params).await {
            Ok(published) => Ok(success(serde_json::json!({
                "draftId": published.draft_id.0,
                "articleId": published.article_id,
                "response": published.response,
            }))),
            Err(e) => Ok(failure("Juejin publish", &e)),
        }
    }

    #[tool(description = "List Juejin article categories. Use a category_id from here in publish_juejin.")]
    async fn juejin_list_categories(
        &self,
        Parameters(params): Parameters<JuejinCategoriesParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let lookup = JuejinLookupParams {
            cookies: params.cookies,
            ..Default::default()
        };
        match self.toolkit.lookup_juejin(JuejinLookup::Categories, lookup).await {
            Ok(categories) => Ok(success(serde_json::json!({ "categories": categories }))),
            Err(e) => Ok(failure("Juejin category lookup", &e)),
        }
    }

    #[tool(description = "List the logged-in user's Juejin columns (专栏). \
        Use column IDs from here in publish_juejin.")]
    async fn juejin_list_columns(
        &self,
        Parameters(params): Parameters<JuejinColumnsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let lookup = JuejinLookupParams {
            cookies: params.cookies,
            cursor: params.cursor,
            limit: params.limit,
            keyword: None,
            user_id: params.user_id,
        };
        match self.toolkit.lookup_juejin(JuejinLookup::Columns, lookup).await {
            Ok(columns) => Ok(success(serde_json::json!({ "columns": columns }))),
            Err(e) => Ok(failure("Juejin column lookup", &e)),
        }
    }

    #[tool(description = "Search Juejin tags by keyword. Use tag IDs from here in publish_juejin.")]
    async fn juejin_list_tags(
        &self,
        Parameters(params): Parameters<JuejinTagsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let lookup = JuejinLookupParams {
            cookies: params.cookies,
            cursor: params.cursor,
            limit: params.limit,
            keyword: params.keyword,
            user_id: None,
        };
        match self.toolkit.lookup_juejin(JuejinLookup::Tags, lookup).await {
            Ok(tags) => Ok(success(serde_json::json!({ "tags": tags }))),
            Err(e) => Ok(failure("Juejin tag lookup", &e)),
        }
    }

    #[tool(description = "Publish an HTML article to a WeChat official account (微信公众号). \
        Uploads the cover, re-hosts inline images and adds a draft. \
        With auto_publish it also submits the draft and waits up to ~30s for the result. \
        On failure the error names the step that failed.")]
    async fn publish_wechat(
        &self,
        Parameters(params): Parameters<PublishWechatParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let wechat_params = WechatParams {
            app_id: params.app_id,
            app_secret: params.app_secret,
            title: params.title,
            content: params.content,
            author: params.author,
            cover_image_url: params.cover_image_url,
            thumb_media_id: params.thumb_media_id,
            need_open_comment: params.need_open_comment,
            only_fans_can_comment: params.only_fans_can_comment,
            content_source_url: params.content_source_url,
            auto_publish: params.auto_publish,
        };

        match self.toolkit.publish_wechat(wechat_params).await {
            Ok(published) => Ok(success(serde_json::json!({
                "mediaId": published.media_id,
                "publishId": published.publish_id,
                "articleId": published.article_id,
                "articleUrl": published.article_url,
                "isDraft": published.is_draft,
            }))),
            Err(e) => Ok(failure("WeChat publish", &e)),
        }
    }

    #[tool(description = "Send a plain-text message to a Feishu (飞书) user through a bot app.")]
    async fn feishu_send_message(
        &self,
        Parameters(params): Parameters<FeishuSendParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let feishu_params = FeishuParams {
            app_id: params.app_id,
            app_secret: params.app_secret,
            user_id: params.user_id,
            message: params.message,
            receive_id_type: params.receive_id_type,
        };

        match self.toolkit.send_feishu(feishu_params).await {
            Ok(resp) => Ok(success(resp)),
            Err(e) => Ok(failure("Feishu send", &e)),
        }
    }
}

#[tool_handler]
impl ServerHandler for PublishKitMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Server instructions — injected as domain knowledge for AI clients
// ---------------------------------------------------------------------------

const SERVER_INSTRUCTIONS: &str = "\
PublishKit MCP server — image generation and content publishing for Chinese platforms.

# Credentials

Every tool takes its credentials as parameters (browser cookie strings or app id/secret).
Nothing is stored between calls. Ask the user for a fresh cookie when a call fails with
REQUEST_FAILED and a login-related message.

# Image generation

- generate_image blocks until the job finishes and returns {\"urls\": [...]}.
- Failures carry an error code: CONTENT_FILTERED (rephrase the prompt), INSUFFICIENT_POINTS
  (the account is out of credits), GENERATION_FAILED, TIMEOUT, UNSUPPORTED_MODEL.
- Keep width/height at 1024 unless the user asks otherwise; sample_strength 0.75 is a good default.

# Publishing

- publish_juejin runs create draft → update draft → publish. If a step fails the message
  names it (e.g. \"update draft failed\"); a draft may already exist in that case.
- Look up IDs for publish_juejin with juejin_list_categories, juejin_list_columns and
  juejin_list_tags (pass the same cookie).
- publish_wechat adds a draft to the official account; set auto_publish to publish it.
  It needs a cover: cover_image_url or an existing thumb_media_id. Step names in errors:
  fetch access token, upload cover image, add draft, submit publish, query publish status.
- feishu_send_message sends plain text; receive_id_type defaults to user_id.
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_image_params_optional_fields_default_to_none() {
        let json = r#"{"cookie":"sid=1","prompt":"a quiet harbour"}"#;
        let p: GenerateImageParams = serde_json::from_str(json).expect("deserialize");
        assert_eq!(p.prompt, "a quiet harbour");
        assert!(p.model.is_none());
        assert!(p.negative_prompt.is_none());
        assert!(p.width.is_none());
        assert!(p.height.is_none());
        assert!(p.sample_strength.is_none());
    }

    #[test]
    fn generate_image_params_require_prompt() {
        let json = r#"{"cookie":"sid=1"}"#;
        assert!(serde_json::from_str::<GenerateImageParams>(json).is_err());
    }

    #[test]
    fn publish_params_accept_comma_lists() {
        let json = r#"{
            "cookies": "sid=1",
            "title": "T",
            "content": "body",
            "tag_ids": "1,2,3"
        }"#;
        let p: PublishJuejinParams = serde_json::from_str(json).expect("deserialize");
        assert_eq!(p.tag_ids.as_deref(), Some("1,2,3"));
        assert!(p.column_ids.is_none());
    }

    #[test]
    fn wechat_params_default_to_draft() {
        let json = r#"{
            "app_id": "wx1",
            "app_secret": "s",
            "title": "T",
            "content": "<p>x</p>",
            "thumb_media_id": "m-1"
        }"#;
        let p: PublishWechatParams = serde_json::from_str(json).expect("deserialize");
        assert!(p.auto_publish.is_none());
        assert!(p.cover_image_url.is_none());
        assert_eq!(p.thumb_media_id.as_deref(), Some("m-1"));
    }

    #[test]
    fn tag_lookup_params_are_optional_except_cookie() {
        let p: JuejinTagsParams = serde_json::from_str(r#"{"cookies":"sid=1"}"#).expect("deserialize");
        assert!(p.keyword.is_none() && p.cursor.is_none() && p.limit.is_none());
        assert!(serde_json::from_str::<JuejinTagsParams>("{}").is_err());
    }

    #[test]
    fn failure_payload_carries_kind() {
        let v = failure_body("Image generation", &Error::ContentFiltered("2038".into()));
        assert_eq!(v["error"], "CONTENT_FILTERED");
        assert!(v["message"].as_str().unwrap().starts_with("Image generation failed"));
    }

    #[tokio::test]
    async fn invalid_image_params_fail_before_network() {
        let toolkit = Arc::new(Toolkit::new(&crate::settings::Settings {
            jimeng_base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        }));
        let server = PublishKitMcp::new(toolkit);
        let result = server
            .generate_image(Parameters(GenerateImageParams {
                cookie: "sid=1".into(),
                prompt: "x".into(),
                model: Some("not-a-model".into()),
                negative_prompt: None,
                width: None,
                height: None,
                sample_strength: None,
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn wechat_without_cover_fails_before_network() {
        let toolkit = Arc::new(Toolkit::new(&crate::settings::Settings {
            wechat_base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        }));
        let server = PublishKitMcp::new(toolkit);
        let result = server
            .publish_wechat(Parameters(PublishWechatParams {
                app_id: "wx1".into(),
                app_secret: "s".into(),
                title: "T".into(),
                content: "<p>x</p>".into(),
                author: None,
                cover_image_url: None,
                thumb_media_id: None,
                need_open_comment: None,
                only_fans_can_comment: None,
                content_source_url: None,
                auto_publish: Some(true),
            }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
