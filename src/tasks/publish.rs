use serde_json::Value;
use tracing::{error, info};

use super::{Endpoints, FeishuParams, JuejinLookup, JuejinLookupParams};
use crate::error::Result;
use crate::feishu::{self, FeishuBot};
use crate::juejin::{Article, JuejinClient, Page, Published};
use crate::wechat::{self, WechatArticle, WechatClient, WechatPublished};

/// Publish an article through the Juejin draft pipeline.
pub async fn run_juejin_task(
    client: &JuejinClient,
    article: &Article,
    cookies: &str,
) -> Result<Published> {
    info!(title = %article.title, words = article.word_count(), "juejin task started");
    client.publish(cookies, article).await.inspect_err(|e| {
        error!(kind = e.kind(), "juejin task failed: {e}");
    })
}

pub async fn run_juejin_lookup(
    client: &JuejinClient,
    lookup: JuejinLookup,
    params: &JuejinLookupParams,
    page: &Page,
) -> Result<Vec<Value>> {
    let cookies = params.cookies.as_str();
    let result = match lookup {
        JuejinLookup::Categories => client.list_categories(cookies).await,
        JuejinLookup::Columns => {
            client
                .list_columns(cookies, params.user_id.as_deref(), page)
                .await
        }
        JuejinLookup::Tags => {
            let keyword = params.keyword.as_deref().unwrap_or_default();
            client.list_tags(cookies, keyword, page).await
        }
    };
    result
        .inspect(|entries| info!(?lookup, count = entries.len(), "juejin lookup finished"))
        .inspect_err(|e| error!(?lookup, kind = e.kind(), "juejin lookup failed: {e}"))
}

/// Add a WeChat draft (and publish it if asked). Each call gets its own client and token.
pub async fn run_wechat_task(
    endpoints: &Endpoints,
    app_id: String,
    app_secret: String,
    article: &WechatArticle,
) -> Result<WechatPublished> {
    let client = WechatClient::with_options(
        endpoints.wechat_base_url.clone(),
        app_id,
        app_secret,
        endpoints.request_timeout,
        wechat::default_publish_poll(),
    )
    .with_token_url(endpoints.wechat_token_url.clone());

    info!(title = %article.title, auto_publish = article.auto_publish, "wechat task started");
    client
        .publish(article)
        .await
        .inspect_err(|e| error!(kind = e.kind(), "wechat task failed: {e}"))
}

/// Send one text message. Each call gets its own bot and token.
pub async fn run_feishu_task(endpoints: &Endpoints, params: &FeishuParams) -> Result<Value> {
    let bot = FeishuBot::with_timeout(
        endpoints.feishu_base_url.clone(),
        params.app_id.clone(),
        params.app_secret.clone(),
        endpoints.request_timeout,
    );
    let receive_id_type = params
        .receive_id_type
        .as_deref()
        .unwrap_or(feishu::DEFAULT_RECEIVE_ID_TYPE);
    bot.send_text(&params.user_id, &params.message, receive_id_type)
        .await
        .inspect_err(|e| error!(kind = e.kind(), "feishu task failed: {e}"))
}
