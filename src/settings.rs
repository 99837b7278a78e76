use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::jimeng::{self, PollPolicy};
use crate::{feishu, http, juejin, wechat};

// ---------------------------------------------------------------------------
// Settings — read from {dataDir}/com.publishkit.tools/settings.json
// Credentials are passed per tool call and never stored here.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_jimeng_base_url")]
    pub jimeng_base_url: String,
    #[serde(default = "default_juejin_base_url")]
    pub juejin_base_url: String,
    #[serde(default = "default_feishu_base_url")]
    pub feishu_base_url: String,
    #[serde(default = "default_wechat_base_url")]
    pub wechat_base_url: String,
    /// Token relay used instead of `/cgi-bin/token` when set.
    #[serde(default)]
    pub wechat_token_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Unset means wait until the job leaves the pending state.
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
}

fn default_jimeng_base_url() -> String {
    jimeng::DEFAULT_BASE_URL.to_string()
}

fn default_juejin_base_url() -> String {
    juejin::DEFAULT_BASE_URL.to_string()
}

fn default_feishu_base_url() -> String {
    feishu::DEFAULT_BASE_URL.to_string()
}

fn default_wechat_base_url() -> String {
    wechat::DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    http::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_poll_interval_ms() -> u64 {
    jimeng::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jimeng_base_url: default_jimeng_base_url(),
            juejin_base_url: default_juejin_base_url(),
            feishu_base_url: default_feishu_base_url(),
            wechat_base_url: default_wechat_base_url(),
            wechat_token_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: None,
            max_poll_attempts: None,
        }
    }
}

impl Settings {
    /// Load `settings.json` from `data_dir`. Missing or invalid files fall back to defaults.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), "ignoring invalid settings file: {e}");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
            max_attempts: self.max_poll_attempts,
        }
    }
}

/// Resolve the app data directory cross-platform.
pub fn resolve_data_dir() -> Result<PathBuf> {
    let data = dirs::data_dir().context("could not determine data directory")?;
    Ok(data.join("com.publishkit.tools"))
}
