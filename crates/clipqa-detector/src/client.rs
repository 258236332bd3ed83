//! Detector GraphQL HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{DetectorError, DetectorResult};
use crate::monitor::DetectorJobService;
use crate::types::{
    shot_detection_job_input, CreateJobData, EngineResultsData, GraphQlRequest, GraphQlResponse,
    JobId, PollStatus, CREATE_JOB_MUTATION, ENGINE_RESULTS_QUERY,
};

pub const DEFAULT_GRAPHQL_URL: &str = "https://api.stage.us-1.veritone.com/v3/graphql";

/// Configuration for the detector client.
#[derive(Debug, Clone)]
pub struct DetectorClientConfig {
    /// GraphQL endpoint
    pub graphql_url: String,
    /// Bearer token
    pub api_token: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for DetectorClientConfig {
    fn default() -> Self {
        Self {
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            api_token: String::new(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl DetectorClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> DetectorResult<Self> {
        let api_token = std::env::var("DETECTOR_API_TOKEN")
            .map_err(|_| DetectorError::Config("DETECTOR_API_TOKEN must be set".to_string()))?;

        Ok(Self {
            graphql_url: std::env::var("DETECTOR_GRAPHQL_URL")
                .unwrap_or_else(|_| DEFAULT_GRAPHQL_URL.to_string()),
            api_token,
            timeout: Duration::from_secs(
                std::env::var("DETECTOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("DETECTOR_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        })
    }
}

/// Client for the detection job GraphQL API.
pub struct DetectorClient {
    http: Client,
    config: DetectorClientConfig,
}

impl DetectorClient {
    pub fn new(config: DetectorClientConfig) -> DetectorResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectorError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DetectorResult<Self> {
        Self::new(DetectorClientConfig::from_env()?)
    }

    /// Submit a shot-detection job for a source URL.
    pub async fn create_job(&self, source_url: &str) -> DetectorResult<JobId> {
        let variables = json!({ "input": shot_detection_job_input(source_url) });
        let data: CreateJobData = self.execute(CREATE_JOB_MUTATION, variables).await?;

        let id = data
            .create_job
            .and_then(|job| job.id)
            .filter(|id| !id.trim().is_empty())
            .ok_or(DetectorError::MissingJobId)?;

        debug!(job_id = %id, "Submitted shot detection job");
        Ok(JobId(id))
    }

    /// Fetch engine results. No records means the job is still running.
    pub async fn job_results(&self, job_id: &JobId) -> DetectorResult<PollStatus> {
        let variables = json!({ "jobId": job_id.as_str() });
        let data: EngineResultsData = self.execute(ENGINE_RESULTS_QUERY, variables).await?;

        let results = data.engine_results.unwrap_or_default();
        if results.records.is_empty() {
            return Ok(PollStatus::Pending);
        }
        Ok(PollStatus::Complete(results.segments()))
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> DetectorResult<T> {
        let body = GraphQlRequest { query, variables };

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&self.config.graphql_url)
                    .bearer_auth(&self.config.api_token)
                    .json(&body)
                    .send()
                    .await
                    .map_err(DetectorError::Network)?;
                check_status(response).await
            })
            .await?;

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            let text = response.text().await.unwrap_or_default();
            return Err(DetectorError::NotJson(text));
        }

        let envelope: GraphQlResponse<T> = response.json().await?;
        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(DetectorError::GraphQl(messages.join("; ")));
        }
        envelope
            .data
            .ok_or_else(|| DetectorError::InvalidResponse("response has no data".to_string()))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> DetectorResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = DetectorResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        "Detector request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| DetectorError::InvalidResponse("no attempts made".to_string())))
    }
}

/// Longest wait between detector retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// 500ms doubling per attempt, capped at [`MAX_RETRY_DELAY`].
fn retry_delay(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(millis).min(MAX_RETRY_DELAY)
}

async fn check_status(response: Response) -> DetectorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DetectorError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DetectorJobService for DetectorClient {
    async fn submit(&self, source_url: &str) -> DetectorResult<JobId> {
        self.create_job(source_url).await
    }

    async fn poll_status(&self, job_id: &JobId) -> DetectorResult<PollStatus> {
        self.job_results(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipqa_models::DetectedSegment;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> DetectorClient {
        DetectorClient::new(DetectorClientConfig {
            graphql_url: format!("{}/v3/graphql", server.uri()),
            api_token: "test-token".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = DetectorClientConfig::default();
        assert_eq!(config.graphql_url, DEFAULT_GRAPHQL_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(0), Duration::from_millis(500));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(64), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(u32::MAX), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_create_job_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/graphql"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "variables": { "input": { "tasks": [ { "payload": { "url": "https://cdn.example/v.mp4" } } ] } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "createJob": { "id": "job-123" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let job = client_for(&server).create_job("https://cdn.example/v.mp4").await.unwrap();
        assert_eq!(job, JobId("job-123".to_string()));
    }

    #[tokio::test]
    async fn test_graphql_errors_fail_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "createJob": null },
                "errors": [ { "message": "invalid engine" } ]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).create_job("https://cdn.example/v.mp4").await.unwrap_err();
        assert!(matches!(err, DetectorError::GraphQl(ref msg) if msg.contains("invalid engine")));
    }

    #[tokio::test]
    async fn test_empty_job_id_fails_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "createJob": { "id": "" } }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).create_job("https://cdn.example/v.mp4").await.unwrap_err();
        assert!(matches!(err, DetectorError::MissingJobId));
    }

    #[tokio::test]
    async fn test_non_json_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).create_job("https://cdn.example/v.mp4").await.unwrap_err();
        assert!(matches!(err, DetectorError::NotJson(ref text) if text.contains("maintenance")));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server).create_job("https://cdn.example/v.mp4").await.unwrap_err();
        assert!(matches!(err, DetectorError::Http { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_job_results_pending_when_no_records() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "variables": { "jobId": "job-1" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "engineResults": { "records": [] } }
            })))
            .mount(&server)
            .await;

        let status = client_for(&server).job_results(&JobId("job-1".into())).await.unwrap();
        assert_eq!(status, PollStatus::Pending);
    }

    #[tokio::test]
    async fn test_job_results_complete_with_series() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "engineResults": { "records": [
                    { "jsondata": { "series": [
                        { "startTimeMs": 1000, "stopTimeMs": 12000, "object": { "label": "Shot" } }
                    ] } }
                ] } }
            })))
            .mount(&server)
            .await;

        let status = client_for(&server).job_results(&JobId("job-1".into())).await.unwrap();
        assert_eq!(
            status,
            PollStatus::Complete(vec![DetectedSegment::new("Shot", 1_000, 12_000)])
        );
    }
}
