use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const ASSISTANT_AID: u32 = 513695;
/// String form of `ASSISTANT_AID` for query parameters and headers.
pub const ASSISTANT_ID: &str = "513695";
pub const PLATFORM_CODE: &str = "7";
pub const VERSION_CODE: &str = "5.8.0";
pub const DRAFT_VERSION: &str = "3.0.2";

/// Remote fail code for prompts rejected by the content filter.
pub const CONTENT_FILTER_CODE: &str = "2038";

/// `ret` value the remote uses for an exhausted points balance.
pub const RET_INSUFFICIENT_POINTS: i64 = 5000;

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageModel {
    #[default]
    Jimeng21,
    Jimeng20Pro,
    Jimeng20,
    Jimeng14,
    JimengXlPro,
}

impl ImageModel {
    pub const ALL: [ImageModel; 5] = [
        ImageModel::Jimeng21,
        ImageModel::Jimeng20Pro,
        ImageModel::Jimeng20,
        ImageModel::Jimeng14,
        ImageModel::JimengXlPro,
    ];

    /// Caller-facing model name.
    pub fn name(self) -> &'static str {
        match self {
            ImageModel::Jimeng21 => "jimeng-2.1",
            ImageModel::Jimeng20Pro => "jimeng-2.0-pro",
            ImageModel::Jimeng20 => "jimeng-2.0",
            ImageModel::Jimeng14 => "jimeng-1.4",
            ImageModel::JimengXlPro => "jimeng-xl-pro",
        }
    }

    /// Model string sent to the remote service.
    pub fn internal_name(self) -> &'static str {
        match self {
            ImageModel::Jimeng21 => "high_aes_general_v21_L:general_v2.1_L",
            ImageModel::Jimeng20Pro => "high_aes_general_v20_L:general_v2.0_L",
            ImageModel::Jimeng20 => "high_aes_general_v20:general_v2.0",
            ImageModel::Jimeng14 => "high_aes_general_v14:general_v1.4",
            ImageModel::JimengXlPro => "text2img_xl_sft",
        }
    }
}

impl FromStr for ImageModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ImageModel::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::UnsupportedModel(s.to_string()))
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Caller-facing request / job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    /// Caller-facing model name, resolved on submit.
    pub model: String,
    pub width: u32,
    pub height: u32,
    /// In [0, 1].
    pub sample_strength: f64,
}

impl GenerationRequest {
    /// Resolve the model and check dimensions and strength.
    pub fn validate(&self) -> Result<ImageModel> {
        let model = self.model.parse::<ImageModel>()?;
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidRequest(format!(
                "width and height must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.sample_strength) {
            return Err(Error::InvalidRequest(format!(
                "sample strength must be within [0, 1], got {}",
                self.sample_strength
            )));
        }
        Ok(model)
    }
}

/// History record id returned by a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Submit body
// POST /mweb/v1/aigc_draft/generate
//
// `metrics_extra` and `draft_content` travel as JSON-encoded strings.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SubmitBody {
    pub extend: Extend,
    pub submit_id: String,
    pub metrics_extra: String,
    pub draft_content: String,
    pub http_common_info: HttpCommonInfo,
}

#[derive(Debug, Serialize)]
pub struct Extend {
    pub root_model: String,
    pub template_id: String,
}

#[derive(Debug, Serialize)]
pub struct HttpCommonInfo {
    pub aid: u32,
}

impl Default for HttpCommonInfo {
    fn default() -> Self {
        Self { aid: ASSISTANT_AID }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExtra {
    pub template_id: String,
    pub generate_count: u32,
    pub prompt_source: String,
    pub template_source: String,
    pub last_request_id: String,
    pub origin_request_id: String,
}

#[derive(Debug, Serialize)]
pub struct Draft {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub min_version: String,
    pub is_from_tsn: bool,
    pub version: String,
    pub main_component_id: String,
    pub component_list: Vec<DraftComponent>,
}

#[derive(Debug, Serialize)]
pub struct DraftComponent {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub min_version: String,
    pub generate_type: String,
    pub aigc_mode: String,
    pub abilities: Abilities,
}

#[derive(Debug, Serialize)]
pub struct Abilities {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub generate: Generate,
}

#[derive(Debug, Serialize)]
pub struct Generate {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub core_param: CoreParam,
    pub history_option: Tagged,
}

#[derive(Debug, Serialize)]
pub struct CoreParam {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub model: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: u64,
    pub sample_strength: f64,
    pub image_ratio: u32,
    pub large_image_info: LargeImageInfo,
}

#[derive(Debug, Serialize)]
pub struct LargeImageInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub height: u32,
    pub width: u32,
}

/// Bare node carrying only an empty type and a fresh id.
#[derive(Debug, Serialize)]
pub struct Tagged {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Tagged {
    fn fresh() -> Self {
        Self {
            kind: String::new(),
            id: fresh_id(),
        }
    }
}

impl SubmitBody {
    /// Build the draft envelope. Every nested node gets its own id.
    pub fn new(model: ImageModel, req: &GenerationRequest, seed: u64) -> Result<Self> {
        let model_id = model.internal_name().to_string();
        let component_id = fresh_id();

        let draft = Draft {
            kind: "draft".into(),
            id: fresh_id(),
            min_version: DRAFT_VERSION.into(),
            is_from_tsn: true,
            version: DRAFT_VERSION.into(),
            main_component_id: component_id.clone(),
            component_list: vec![DraftComponent {
                kind: "image_base_component".into(),
                id: component_id,
                min_version: DRAFT_VERSION.into(),
                generate_type: "generate".into(),
                aigc_mode: "workbench".into(),
                abilities: Abilities {
                    kind: String::new(),
                    id: fresh_id(),
                    generate: Generate {
                        kind: String::new(),
                        id: fresh_id(),
                        core_param: CoreParam {
                            kind: String::new(),
                            id: fresh_id(),
                            model: model_id.clone(),
                            prompt: req.prompt.clone(),
                            negative_prompt: req.negative_prompt.clone(),
                            seed,
                            sample_strength: req.sample_strength,
                            image_ratio: 1,
                            large_image_info: LargeImageInfo {
                                kind: String::new(),
                                id: fresh_id(),
                                height: req.height,
                                width: req.width,
                            },
                        },
                        history_option: Tagged::fresh(),
                    },
                },
            }],
        };

        let metrics = MetricsExtra {
            template_id: String::new(),
            generate_count: 1,
            prompt_source: "custom".into(),
            template_source: String::new(),
            last_request_id: String::new(),
            origin_request_id: String::new(),
        };

        Ok(Self {
            extend: Extend {
                root_model: model_id,
                template_id: String::new(),
            },
            submit_id: fresh_id(),
            metrics_extra: serde_json::to_string(&metrics)?,
            draft_content: serde_json::to_string(&draft)?,
            http_common_info: HttpCommonInfo::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitData {
    #[serde(default)]
    pub aigc_data: Option<AigcData>,
}

#[derive(Debug, Deserialize)]
pub struct AigcData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub history_record_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Poll body
// POST /mweb/v1/get_history_by_ids
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PollBody {
    pub history_ids: Vec<String>,
    pub image_info: ImageInfo,
    pub http_common_info: HttpCommonInfo,
}

#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub image_scene_list: Vec<ImageScene>,
}

#[derive(Debug, Serialize)]
pub struct ImageScene {
    pub scene: String,
    pub width: u32,
    pub height: u32,
    pub uniq_key: String,
    pub format: String,
}

impl ImageScene {
    fn smart_crop(width: u32, height: u32) -> Self {
        Self {
            scene: "smart_crop".into(),
            width,
            height,
            uniq_key: format!("smart_crop-w:{width}-h:{height}"),
            format: "webp".into(),
        }
    }

    fn normal(size: u32) -> Self {
        Self {
            scene: "normal".into(),
            width: size,
            height: size,
            uniq_key: size.to_string(),
            format: "webp".into(),
        }
    }
}

impl ImageInfo {
    /// Crop/scale variants requested alongside every poll.
    pub fn variants() -> Self {
        let mut scenes: Vec<ImageScene> = [360, 480, 720]
            .into_iter()
            .map(|s| ImageScene::smart_crop(s, s))
            .collect();
        scenes.extend(
            [(720, 480), (360, 240), (240, 320), (480, 640)]
                .into_iter()
                .map(|(w, h)| ImageScene::smart_crop(w, h)),
        );
        scenes.extend([2400, 1080, 720, 480, 360].into_iter().map(ImageScene::normal));

        Self {
            width: 2048,
            height: 2048,
            format: "webp".into(),
            image_scene_list: scenes,
        }
    }
}

impl PollBody {
    pub fn new(job: &JobId) -> Self {
        Self {
            history_ids: vec![job.as_str().to_string()],
            image_info: ImageInfo::variants(),
            http_common_info: HttpCommonInfo::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Poll response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed { fail_code: Option<String> },
    /// Codes outside the table. Treated as terminal.
    Unknown(i64),
}

impl JobStatus {
    pub const PENDING: i64 = 20;
    pub const FAILED: i64 = 30;
    pub const SUCCEEDED: i64 = 50;

    pub fn from_code(code: i64, fail_code: Option<String>) -> Self {
        match code {
            Self::PENDING => JobStatus::Pending,
            Self::FAILED => JobStatus::Failed { fail_code },
            Self::SUCCEEDED => JobStatus::Succeeded,
            other => JobStatus::Unknown(other),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, deserialize_with = "lenient_code")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fail_code: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub item_list: Vec<Value>,
}

impl HistoryRecord {
    pub fn job_status(&self) -> Option<JobStatus> {
        self.status
            .map(|code| JobStatus::from_code(code, self.fail_code.clone()))
    }

    /// URLs of all well-formed items; malformed items are skipped.
    pub fn result_urls(&self) -> Vec<String> {
        self.item_list
            .iter()
            .filter_map(|item| ResultItem::deserialize(item).ok())
            .filter_map(|item| item.url().map(String::from))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultItem {
    #[serde(default)]
    pub image: Option<ItemImage>,
    #[serde(default)]
    pub common_attr: Option<CommonAttr>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemImage {
    #[serde(default)]
    pub large_images: Vec<LargeImage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LargeImage {
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommonAttr {
    #[serde(default)]
    pub cover_url: Option<String>,
}

impl ResultItem {
    /// Large image URL, falling back to the cover URL.
    pub fn url(&self) -> Option<&str> {
        let large = self
            .image
            .as_ref()
            .and_then(|img| img.large_images.first())
            .and_then(|l| l.image_url.as_deref())
            .filter(|u| !u.is_empty());
        large.or_else(|| {
            self.common_attr
                .as_ref()
                .and_then(|c| c.cover_url.as_deref())
                .filter(|u| !u.is_empty())
        })
    }
}

// ---------------------------------------------------------------------------
// Response envelope: { ret, errmsg, data }
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub enum Reply {
    Data(Value),
    Failure { code: i64, message: String },
}

impl Reply {
    /// Split a response body into payload or remote failure.
    ///
    /// A body without a numeric `ret` is itself the payload.
    pub fn classify(body: Value) -> Self {
        let ret = match body.get("ret").and_then(numeric) {
            Some(ret) => ret,
            None => return Reply::Data(body),
        };
        if ret == 0 {
            return Reply::Data(body.get("data").cloned().unwrap_or(Value::Null));
        }
        let message = body
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Reply::Failure { code: ret, message }
    }

    pub fn into_result(self) -> Result<Value> {
        match self {
            Reply::Data(v) => Ok(v),
            Reply::Failure { code, message } if code == RET_INSUFFICIENT_POINTS => {
                Err(Error::InsufficientPoints(message))
            }
            Reply::Failure { code, message } => Err(Error::RequestFailed { code, message }),
        }
    }
}

/// Integer from a number or a numeric string.
fn numeric(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts a string or a number; anything else becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a number or a numeric string; anything else becomes `None`.
fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(numeric))
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}
