pub mod sign;
pub mod types;

use std::time::Duration;

use rand::Rng;
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::http;
use types::{
    GenerationRequest, HistoryRecord, JobId, JobStatus, PollBody, Reply, SubmitBody, SubmitData,
    ASSISTANT_ID, CONTENT_FILTER_CODE, PLATFORM_CODE, VERSION_CODE,
};

pub const DEFAULT_BASE_URL: &str = "https://jimeng.jianying.com";
pub const SUBMIT_PATH: &str = "/mweb/v1/aigc_draft/generate";
pub const POLL_PATH: &str = "/mweb/v1/get_history_by_ids";

pub use crate::http::DEFAULT_REQUEST_TIMEOUT;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";
const REFERER_URL: &str = "https://jimeng.jianying.com";

const SEED_BASE: u64 = 2_500_000_000;
const SEED_SPAN: u64 = 100_000_000;

/// How long `wait` keeps polling a pending job.
///
/// Both bounds default to `None`: the loop then runs until the job leaves
/// the pending state.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
            max_attempts: None,
        }
    }
}

/// Per-client identity; `web_id` rides on every request's query string.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub web_id: String,
}

impl ClientIdentity {
    pub fn generate() -> Self {
        let web_id: u64 = rand::rng().random_range(7_000_000_000_000_000_000..8_000_000_000_000_000_000);
        Self {
            web_id: web_id.to_string(),
        }
    }
}

pub struct JimengClient {
    base_url: String,
    http: Client,
    identity: ClientIdentity,
    poll: PollPolicy,
}

impl JimengClient {
    pub fn new(base_url: String) -> Self {
        Self::with_options(base_url, DEFAULT_REQUEST_TIMEOUT, PollPolicy::default())
    }

    pub fn with_options(base_url: String, request_timeout: Duration, poll: PollPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http::client_with_timeout(request_timeout),
            identity: ClientIdentity::generate(),
            poll,
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// POST a signed request and unwrap the `{ret, errmsg, data}` envelope.
    async fn request<B: Serialize>(&self, path: &str, cookie: &str, body: &B) -> Result<Value> {
        let device_time = chrono::Utc::now().timestamp();
        let signature = sign::sign(path, PLATFORM_CODE, VERSION_CODE, device_time);

        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .query(&[
                ("aid", ASSISTANT_ID),
                ("device_platform", "web"),
                ("region", "CN"),
                ("web_id", self.identity.web_id.as_str()),
            ])
            .header(USER_AGENT, BROWSER_UA)
            .header(COOKIE, cookie)
            .header("Device-Time", device_time.to_string())
            .header("Sign", signature)
            .header("Sign-Ver", "1")
            .header("Pf", PLATFORM_CODE)
            .header(REFERER, REFERER_URL)
            .header("Appid", ASSISTANT_ID)
            .header("Appvr", VERSION_CODE)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus { status, body });
        }

        let bytes = resp.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        Reply::classify(body).into_result()
    }

    /// POST /mweb/v1/aigc_draft/generate — returns the history record id.
    pub async fn submit(&self, req: &GenerationRequest, cookie: &str) -> Result<JobId> {
        let model = req.validate()?;
        let body = SubmitBody::new(model, req, next_seed())?;

        let data = self.request(SUBMIT_PATH, cookie, &body).await?;
        let data: SubmitData = serde_json::from_value(data)
            .map_err(|e| Error::SubmissionFailed(format!("unexpected submit response: {e}")))?;

        let history_id = data
            .aigc_data
            .and_then(|d| d.history_record_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::SubmissionFailed("no history record id in response".into()))?;

        info!(history_id = %history_id, model = %model, "image generation submitted");
        Ok(JobId::new(history_id))
    }

    /// Poll until the job leaves the pending state and return its image URLs.
    pub async fn wait(&self, job: &JobId, cookie: &str) -> Result<Vec<String>> {
        self.wait_with_cancel(job, cookie, &CancellationToken::new())
            .await
    }

    /// Like [`wait`](Self::wait), but stops with `Cancelled` once `cancel` fires.
    pub async fn wait_with_cancel(
        &self,
        job: &JobId,
        cookie: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        if job.as_str().is_empty() {
            return Err(Error::GenerationFailed("job id missing".into()));
        }

        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            let attempts_exhausted = self.poll.max_attempts.is_some_and(|max| attempts >= max);
            let deadline_passed = self
                .poll
                .max_wait
                .is_some_and(|max| start.elapsed() >= max);
            if attempts_exhausted || deadline_passed {
                return Err(Error::Timeout {
                    history_id: job.to_string(),
                    attempts,
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled(job.to_string())),
                _ = sleep(self.poll.interval) => {}
            }

            attempts += 1;
            let record = self.poll_once(job, cookie).await?;
            let status = record
                .job_status()
                .ok_or_else(|| Error::GenerationFailed("record has no status".into()))?;

            match status {
                JobStatus::Pending => {
                    debug!(history_id = %job, attempts, "generation still pending");
                }
                JobStatus::Succeeded => {
                    let urls = record.result_urls();
                    info!(history_id = %job, attempts, count = urls.len(), "image generation finished");
                    return Ok(urls);
                }
                JobStatus::Failed { fail_code } => {
                    warn!(history_id = %job, fail_code = ?fail_code, "image generation failed");
                    return Err(match fail_code {
                        Some(code) if code == CONTENT_FILTER_CODE => Error::ContentFiltered(code),
                        Some(code) => Error::GenerationFailed(format!("fail code {code}")),
                        None => Error::GenerationFailed("no fail code reported".into()),
                    });
                }
                JobStatus::Unknown(code) => {
                    warn!(history_id = %job, status = code, "unrecognised terminal status, extracting items");
                    return Ok(record.result_urls());
                }
            }
        }
    }

    /// POST /mweb/v1/get_history_by_ids — fetch the record for one job.
    async fn poll_once(&self, job: &JobId, cookie: &str) -> Result<HistoryRecord> {
        let data = self.request(POLL_PATH, cookie, &PollBody::new(job)).await?;
        match data.get(job.as_str()) {
            Some(record) if !record.is_null() => Ok(serde_json::from_value(record.clone())?),
            _ => Err(Error::GenerationFailed("record not found".into())),
        }
    }

    /// Submit then wait.
    pub async fn generate(&self, req: &GenerationRequest, cookie: &str) -> Result<Vec<String>> {
        self.generate_with_cancel(req, cookie, &CancellationToken::new())
            .await
    }

    pub async fn generate_with_cancel(
        &self,
        req: &GenerationRequest,
        cookie: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let job = self.submit(req, cookie).await?;
        self.wait_with_cancel(&job, cookie, cancel).await
    }
}

/// Time-derived seed in [2.5e9, 2.6e9) with random jitter.
fn next_seed() -> u64 {
    let millis = chrono::Utc::now().timestamp_millis().unsigned_abs();
    let jitter = rand::rng().random_range(0..SEED_SPAN);
    (millis + jitter) % SEED_SPAN + SEED_BASE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COOKIE_VALUE: &str = "sessionid=abc123";

    fn fast_client(server: &MockServer) -> JimengClient {
        JimengClient::with_options(
            server.uri(),
            Duration::from_secs(5),
            PollPolicy {
                interval: Duration::from_millis(5),
                ..PollPolicy::default()
            },
        )
    }

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: "lighthouse at dusk".into(),
            negative_prompt: String::new(),
            model: model.into(),
            width: 1024,
            height: 1024,
            sample_strength: 0.75,
        }
    }

    fn submit_ok(history_id: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "ret": "0",
            "errmsg": "success",
            "data": {"aigc_data": {"history_record_id": history_id}}
        }))
    }

    fn poll_reply(history_id: &str, record: Value) -> ResponseTemplate {
        let mut data = serde_json::Map::new();
        data.insert(history_id.to_string(), record);
        ResponseTemplate::new(200).set_body_json(json!({"ret": "0", "data": data}))
    }

    async fn poll_count(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == POLL_PATH)
            .count()
    }

    #[tokio::test]
    async fn submit_sends_signed_request_and_returns_job() {
        let server = MockServer::start().await;
        let client = fast_client(&server);

        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .and(query_param("aid", "513695"))
            .and(query_param("device_platform", "web"))
            .and(query_param("region", "CN"))
            .and(query_param("web_id", client.identity().web_id.as_str()))
            .and(header("cookie", COOKIE_VALUE))
            .and(header("pf", "7"))
            .and(header("appvr", "5.8.0"))
            .and(header("appid", "513695"))
            .and(header("sign-ver", "1"))
            .and(header_exists("sign"))
            .and(header_exists("device-time"))
            .respond_with(submit_ok("hist-1"))
            .expect(1)
            .mount(&server)
            .await;

        let job = client.submit(&request("jimeng-2.0"), COOKIE_VALUE).await.unwrap();
        assert_eq!(job.as_str(), "hist-1");

        let received = server.received_requests().await.unwrap();
        let req = &received[0];
        let device_time: i64 = req.headers["device-time"].to_str().unwrap().parse().unwrap();
        let expected = sign::sign(SUBMIT_PATH, "7", "5.8.0", device_time);
        assert_eq!(req.headers["sign"].to_str().unwrap(), expected);

        let body: Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["extend"]["root_model"], "high_aes_general_v20:general_v2.0");
    }

    #[tokio::test]
    async fn each_model_resolves_to_internal_name_on_submit() {
        let table = [
            ("jimeng-2.1", "high_aes_general_v21_L:general_v2.1_L"),
            ("jimeng-2.0-pro", "high_aes_general_v20_L:general_v2.0_L"),
            ("jimeng-2.0", "high_aes_general_v20:general_v2.0"),
            ("jimeng-1.4", "high_aes_general_v14:general_v1.4"),
            ("jimeng-xl-pro", "text2img_xl_sft"),
        ];
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .respond_with(submit_ok("hist"))
            .mount(&server)
            .await;
        let client = fast_client(&server);

        for (name, _) in table {
            client.submit(&request(name), COOKIE_VALUE).await.unwrap();
        }

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), table.len());
        for (req, (_, internal)) in received.iter().zip(table) {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            assert_eq!(body["extend"]["root_model"], internal);
        }
    }

    #[tokio::test]
    async fn unsupported_model_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(submit_ok("hist"))
            .expect(0)
            .mount(&server)
            .await;
        let client = fast_client(&server);

        let err = client
            .submit(&request("stable-diffusion"), COOKIE_VALUE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedModel(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_history_id_is_submission_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ret": "0", "data": {"aigc_data": {}}})),
            )
            .mount(&server)
            .await;

        let err = fast_client(&server)
            .submit(&request("jimeng-2.1"), COOKIE_VALUE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SubmissionFailed(_)));
    }

    #[tokio::test]
    async fn submit_maps_remote_error_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ret": "5000", "errmsg": "points exhausted"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ret": "34010105", "errmsg": "login error"})),
            )
            .mount(&server)
            .await;
        let client = fast_client(&server);

        let err = client.submit(&request("jimeng-2.1"), COOKIE_VALUE).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientPoints(ref m) if m == "points exhausted"));

        let err = client.submit(&request("jimeng-2.1"), COOKIE_VALUE).await.unwrap_err();
        assert!(matches!(err, Error::RequestFailed { code: 34010105, .. }));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = fast_client(&server)
            .submit(&request("jimeng-2.1"), COOKIE_VALUE)
            .await
            .unwrap_err();
        match err {
            Error::HttpStatus { status, body } => {
                assert_eq!(status.as_u16(), 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resubmission_uses_fresh_ids_and_seed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .respond_with(submit_ok("hist"))
            .mount(&server)
            .await;
        let client = fast_client(&server);
        let req = request("jimeng-2.1");

        client.submit(&req, COOKIE_VALUE).await.unwrap();
        client.submit(&req, COOKIE_VALUE).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let bodies: Vec<Value> = received
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        assert_ne!(bodies[0]["submit_id"], bodies[1]["submit_id"]);

        let core = |b: &Value| -> Value {
            let draft: Value = serde_json::from_str(b["draft_content"].as_str().unwrap()).unwrap();
            draft["component_list"][0]["abilities"]["generate"]["core_param"].clone()
        };
        assert_ne!(core(&bodies[0])["id"], core(&bodies[1])["id"]);
        assert_ne!(core(&bodies[0])["seed"], core(&bodies[1])["seed"]);
    }

    #[tokio::test]
    async fn wait_polls_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply("hist-9", json!({"status": 20, "item_list": []})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply(
                "hist-9",
                json!({
                    "status": 50,
                    "item_list": [
                        {"image": {"large_images": [{"image_url": "https://cdn/a.webp"}]}},
                        {"common_attr": {"cover_url": "https://cdn/b.webp"}}
                    ]
                }),
            ))
            .mount(&server)
            .await;

        let urls = fast_client(&server)
            .wait(&JobId::new("hist-9"), COOKIE_VALUE)
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://cdn/a.webp", "https://cdn/b.webp"]);
        assert_eq!(poll_count(&server).await, 3);

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["history_ids"], json!(["hist-9"]));
        assert_eq!(body["image_info"]["image_scene_list"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn content_filter_code_is_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply("h", json!({"status": 30, "fail_code": "2038"})))
            .mount(&server)
            .await;

        let err = fast_client(&server)
            .wait(&JobId::new("h"), COOKIE_VALUE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentFiltered(_)));
        assert_eq!(poll_count(&server).await, 1);
    }

    #[tokio::test]
    async fn other_fail_code_is_generation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply("h", json!({"status": 30, "fail_code": "1180"})))
            .mount(&server)
            .await;

        let err = fast_client(&server)
            .wait(&JobId::new("h"), COOKIE_VALUE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(ref m) if m.contains("1180")));
    }

    #[tokio::test]
    async fn missing_record_is_generation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply("someone-else", json!({"status": 20})))
            .mount(&server)
            .await;

        let err = fast_client(&server)
            .wait(&JobId::new("h"), COOKIE_VALUE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(ref m) if m == "record not found"));
    }

    #[tokio::test]
    async fn empty_job_id_fails_without_polling() {
        let server = MockServer::start().await;
        let err = fast_client(&server)
            .wait(&JobId::new(""), COOKIE_VALUE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GenerationFailed(_)));
        assert_eq!(poll_count(&server).await, 0);
    }

    #[tokio::test]
    async fn attempt_cap_ends_in_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply("h", json!({"status": 20})))
            .mount(&server)
            .await;
        let client = JimengClient::with_options(
            server.uri(),
            Duration::from_secs(5),
            PollPolicy {
                interval: Duration::from_millis(1),
                max_wait: None,
                max_attempts: Some(4),
            },
        );

        let err = client.wait(&JobId::new("h"), COOKIE_VALUE).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { attempts: 4, .. }));
        assert_eq!(poll_count(&server).await, 4);
    }

    #[tokio::test]
    async fn wait_deadline_ends_in_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply("h", json!({"status": 20})))
            .mount(&server)
            .await;
        let client = JimengClient::with_options(
            server.uri(),
            Duration::from_secs(5),
            PollPolicy {
                interval: Duration::from_millis(10),
                max_wait: Some(Duration::from_millis(50)),
                max_attempts: None,
            },
        );

        let err = client.wait(&JobId::new("h"), COOKIE_VALUE).await.unwrap_err();
        match err {
            Error::Timeout { history_id, attempts } => {
                assert_eq!(history_id, "h");
                assert!(attempts >= 1);
                assert_eq!(poll_count(&server).await, attempts as usize);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn null_item_list_keeps_polling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply("h", json!({"status": 20, "item_list": null})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply(
                "h",
                json!({"status": "50", "item_list": [{"common_attr": {"cover_url": "https://cdn/n.webp"}}]}),
            ))
            .mount(&server)
            .await;

        let urls = fast_client(&server)
            .wait(&JobId::new("h"), COOKIE_VALUE)
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://cdn/n.webp"]);
        assert_eq!(poll_count(&server).await, 2);
    }

    #[tokio::test]
    async fn unknown_status_is_terminal_and_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply(
                "h",
                json!({
                    "status": 42,
                    "item_list": [{"image": {"large_images": [{"image_url": "https://cdn/u.webp"}]}}]
                }),
            ))
            .mount(&server)
            .await;

        let urls = fast_client(&server)
            .wait(&JobId::new("h"), COOKIE_VALUE)
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://cdn/u.webp"]);
        assert_eq!(poll_count(&server).await, 1);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let client = JimengClient::with_options(
            "http://127.0.0.1:9".into(),
            Duration::from_secs(2),
            PollPolicy::default(),
        );
        let err = client
            .submit(&request("jimeng-2.1"), COOKIE_VALUE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.kind(), "TRANSPORT");
    }

    #[tokio::test]
    async fn cancelled_wait_stops_before_polling() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fast_client(&server)
            .wait_with_cancel(&JobId::new("h"), COOKIE_VALUE, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(ref id) if id == "h"));
        assert_eq!(poll_count(&server).await, 0);
    }

    #[tokio::test]
    async fn generate_runs_submit_then_wait() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .respond_with(submit_ok("hist-42"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(poll_reply(
                "hist-42",
                json!({"status": 50, "item_list": [{"common_attr": {"cover_url": "https://cdn/c.webp"}}]}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let urls = fast_client(&server)
            .generate(&request("jimeng-2.1"), COOKIE_VALUE)
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://cdn/c.webp"]);
    }

    #[test]
    fn seed_stays_in_range() {
        for _ in 0..100 {
            let seed = next_seed();
            assert!((SEED_BASE..SEED_BASE + SEED_SPAN).contains(&seed));
        }
    }

    #[test]
    fn identity_web_id_is_nineteen_digits() {
        let id = ClientIdentity::generate();
        assert_eq!(id.web_id.len(), 19);
        assert!(id.web_id.starts_with('7'));
    }
}
