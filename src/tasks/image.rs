use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;
use crate::jimeng::types::GenerationRequest;
use crate::jimeng::JimengClient;

/// Execute image generation: submit, wait for the job, return result URLs.
pub async fn run_image_task(
    client: &JimengClient,
    req: &GenerationRequest,
    cookie: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let started = Instant::now();
    info!(model = %req.model, width = req.width, height = req.height, "image task started");

    match client.generate_with_cancel(req, cookie, cancel).await {
        Ok(urls) => {
            info!(
                count = urls.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "image task completed"
            );
            Ok(urls)
        }
        Err(e) => {
            error!(kind = e.kind(), "image task failed: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::jimeng::{PollPolicy, POLL_PATH, SUBMIT_PATH};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn req() -> GenerationRequest {
        GenerationRequest {
            prompt: "paper cranes".into(),
            negative_prompt: String::new(),
            model: "jimeng-2.0-pro".into(),
            width: 512,
            height: 512,
            sample_strength: 0.5,
        }
    }

    #[tokio::test]
    async fn shutdown_token_interrupts_pending_wait() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SUBMIT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ret": "0",
                "data": {"aigc_data": {"history_record_id": "slow"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(POLL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ret": "0",
                "data": {"slow": {"status": 20}}
            })))
            .mount(&server)
            .await;

        let client = JimengClient::with_options(
            server.uri(),
            Duration::from_secs(5),
            PollPolicy {
                interval: Duration::from_millis(20),
                ..PollPolicy::default()
            },
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = run_image_task(&client, &req(), "sid=1", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(ref id) if id == "slow"));
    }
}
