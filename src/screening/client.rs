use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::error::ApiError;
use super::types::{
    ApplicationDetails, AssetResponse, BulkDocumentsRequest, CreateAssetRequest,
    CreatedResource, Credentials, DocumentsResponse, EnrollRequest, EnrollResponse, FileMetadata,
    InviteRequest, MagicLinksResponse, PresignResponse, RefreshRequest, RefreshResponse,
    VerificationDetails,
};
use crate::retry::{RetryPolicy, retry_observed};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LONG_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-call options for [`ScreeningClient::execute`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Status and raw body of a completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// Decode the body into an endpoint's response schema.
    pub fn json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        decode(endpoint, &self.body)
    }

    /// The body as untyped JSON; an empty body reads as `null`.
    pub fn value(&self, endpoint: &str) -> Result<Value, ApiError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        decode(endpoint, &self.body)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("{e} in body: {body}"),
    })
}

/// Authenticated executor for the screening REST API.
///
/// Every call carries the current bearer token. A 401 triggers exactly one
/// refresh through `POST /auth/refresh` followed by one reissue of the
/// original call; a second 401 is terminal.
pub struct ScreeningClient {
    http: Client,
    base_url: String,
    credentials: RwLock<Credentials>,
    retry: RetryPolicy,
    request_timeout: Duration,
    long_request_timeout: Duration,
}

impl ScreeningClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials: RwLock::new(credentials),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            long_request_timeout: DEFAULT_LONG_REQUEST_TIMEOUT,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, request: Duration, long_request: Duration) -> Self {
        self.request_timeout = request;
        self.long_request_timeout = long_request;
        self
    }

    /// A copy of the credential pair currently in use.
    pub async fn credentials(&self) -> Credentials {
        self.credentials.read().await.clone()
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub async fn get(&self, endpoint: &str, options: &RequestOptions) -> Result<ApiResponse, ApiError> {
        self.execute(Method::GET, endpoint, options).await
    }

    pub async fn post(&self, endpoint: &str, options: &RequestOptions) -> Result<ApiResponse, ApiError> {
        self.execute(Method::POST, endpoint, options).await
    }

    pub async fn put(&self, endpoint: &str, options: &RequestOptions) -> Result<ApiResponse, ApiError> {
        self.execute(Method::PUT, endpoint, options).await
    }

    pub async fn patch(&self, endpoint: &str, options: &RequestOptions) -> Result<ApiResponse, ApiError> {
        self.execute(Method::PATCH, endpoint, options).await
    }

    /// No workflow step deletes a resource yet.
    #[allow(dead_code)]
    pub async fn delete(&self, endpoint: &str, options: &RequestOptions) -> Result<ApiResponse, ApiError> {
        self.execute(Method::DELETE, endpoint, options).await
    }

    /// Issue a call, recovering once from an expired access token.
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let response = self.send(&method, endpoint, options).await?;
        if response.status != StatusCode::UNAUTHORIZED.as_u16() {
            return check_status(&method, endpoint, response);
        }

        warn!("Received 401 Unauthorized for {method} {endpoint}. Refreshing tokens...");
        self.refresh_tokens().await?;

        let response = self.send(&method, endpoint, options).await?;
        if response.status == StatusCode::UNAUTHORIZED.as_u16() {
            error!("Request to {method} {endpoint} failed again with 401 after token refresh.");
            return Err(ApiError::Unauthorized {
                method: method.to_string(),
                endpoint: endpoint.to_string(),
            });
        }
        check_status(&method, endpoint, response)
    }

    async fn send(
        &self,
        method: &Method,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let token = self.credentials.read().await.access_token.clone();
        let mut request = self
            .http
            .request(method.clone(), self.url(endpoint))
            .bearer_auth(token)
            .timeout(options.timeout.unwrap_or(self.request_timeout));
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }

    async fn refresh_tokens(&self) -> Result<(), ApiError> {
        let current = self.credentials().await;
        let response = self
            .http
            .post(self.url("/auth/refresh"))
            .bearer_auth(&current.access_token)
            .json(&RefreshRequest {
                refresh_token: &current.refresh_token,
            })
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::RefreshFailed {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: RefreshResponse = decode("/auth/refresh", &body)?;
        let mut credentials = self.credentials.write().await;
        credentials.access_token = tokens.bearer_token;
        credentials.refresh_token = tokens.refresh_token;
        info!("Tokens refreshed successfully.");
        Ok(())
    }

    pub async fn enroll_with_magic_link(
        &self,
        request: &EnrollRequest<'_>,
    ) -> Result<EnrollResponse, ApiError> {
        let endpoint = "/screen/applications/enroll_with_magic_link";
        let options = RequestOptions::new()
            .json(serde_json::to_value(request)?)
            .timeout(self.long_request_timeout);
        self.post(endpoint, &options).await?.json(endpoint)
    }

    pub async fn start_application(&self, application_id: &str) -> Result<Value, ApiError> {
        let endpoint = format!("/screen/applications/{application_id}/start_application");
        self.post(&endpoint, &RequestOptions::new())
            .await?
            .value(&endpoint)
    }

    pub async fn pass_invite_flow(&self, applicant_id: &str) -> Result<Value, ApiError> {
        let endpoint = format!("/screen/applicants/{applicant_id}/pass_invite_flow");
        self.patch(&endpoint, &RequestOptions::new())
            .await?
            .value(&endpoint)
    }

    /// The full remote view of an application, as the service computes it.
    pub async fn application_details(&self, application_id: &str) -> Result<Value, ApiError> {
        let endpoint = format!("/screen/applications/{application_id}");
        self.get(&endpoint, &RequestOptions::new())
            .await?
            .value(&endpoint)
    }

    pub async fn application_flags(
        &self,
        application_id: &str,
    ) -> Result<ApplicationDetails, ApiError> {
        let endpoint = format!("/screen/applications/{application_id}");
        self.get(&endpoint, &RequestOptions::new())
            .await?
            .json(&endpoint)
    }

    pub async fn patch_application(
        &self,
        application_id: &str,
        payload: &Value,
    ) -> Result<Value, ApiError> {
        let endpoint = format!("/screen/applications/{application_id}");
        let options = RequestOptions::new().json(payload.clone());
        self.patch(&endpoint, &options).await?.value(&endpoint)
    }

    pub async fn invite_applicant(&self, request: &InviteRequest<'_>) -> Result<Value, ApiError> {
        let endpoint = "/screen/applicants/invite";
        let options = RequestOptions::new().json(serde_json::to_value(request)?);
        self.post(endpoint, &options).await?.value(endpoint)
    }

    pub async fn magic_links(&self, application_id: &str) -> Result<MagicLinksResponse, ApiError> {
        let endpoint = format!("/screen/applications/{application_id}/magic_links");
        self.get(&endpoint, &RequestOptions::new())
            .await?
            .json(&endpoint)
    }

    /// Submit one named step of a verification.
    pub async fn submit_step(
        &self,
        application_id: &str,
        verification_id: &str,
        step: &str,
        payload: &Value,
    ) -> Result<Value, ApiError> {
        let endpoint = format!(
            "/screen/applications/{application_id}/verifications/{verification_id}/steps/{step}"
        );
        let options = RequestOptions::new()
            .json(payload.clone())
            .timeout(self.long_request_timeout);
        self.patch(&endpoint, &options).await?.value(&endpoint)
    }

    /// Create an income or income-source record under the combined income verification.
    pub async fn create_income_record(
        &self,
        application_id: &str,
        verification_id: &str,
        resource: &str,
        payload: &Value,
    ) -> Result<CreatedResource, ApiError> {
        let endpoint = format!(
            "/screen/applications/{application_id}/verifications/{verification_id}/{resource}"
        );
        let options = RequestOptions::new().json(payload.clone());
        self.post(&endpoint, &options).await?.json(&endpoint)
    }

    pub async fn finish_income(
        &self,
        application_id: &str,
        verification_id: &str,
    ) -> Result<(), ApiError> {
        let endpoint =
            format!("/screen/applications/{application_id}/verifications/{verification_id}/finish");
        self.post(&endpoint, &RequestOptions::new()).await?;
        Ok(())
    }

    pub async fn bulk_create_documents(
        &self,
        application_id: &str,
        verification_id: &str,
        income_source_id: &str,
        request: &BulkDocumentsRequest<'_>,
    ) -> Result<DocumentsResponse, ApiError> {
        let endpoint = format!(
            "/screen/applications/{application_id}/verifications/{verification_id}/income_sources/{income_source_id}/bulk_create_documents"
        );
        let options = RequestOptions::new()
            .json(serde_json::to_value(request)?)
            .timeout(self.long_request_timeout);
        self.post(&endpoint, &options).await?.json(&endpoint)
    }

    /// Ask the service to start a test identity verification for an applicant.
    pub async fn create_test_identity_verification(
        &self,
        application_id: &str,
        applicant_id: &str,
    ) -> Result<(), ApiError> {
        let options = RequestOptions::new()
            .json(serde_json::json!({
                "application_id": application_id,
                "applicant_id": applicant_id,
            }))
            .timeout(self.long_request_timeout);
        self.post("/screen/plaid/create_test_identity_verification", &options)
            .await?;
        Ok(())
    }

    pub async fn verification_details(
        &self,
        application_id: &str,
        verification_id: &str,
    ) -> Result<VerificationDetails, ApiError> {
        let endpoint =
            format!("/screen/applications/{application_id}/verifications/{verification_id}");
        self.get(&endpoint, &RequestOptions::new())
            .await?
            .json(&endpoint)
    }

    pub async fn presign(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<PresignResponse, ApiError> {
        let endpoint = "/screen/assets/presign";
        let options = RequestOptions::new()
            .query("filename", filename)
            .query("type", content_type)
            .timeout(self.long_request_timeout);
        self.get(endpoint, &options).await?.json(endpoint)
    }

    /// Register an uploaded file as an application asset.
    ///
    /// Registration has been seen to fail transiently, so it runs under the
    /// client's retry policy.
    pub async fn create_asset(
        &self,
        application_id: &str,
        url: &str,
        metadata: &FileMetadata,
    ) -> Result<AssetResponse, ApiError> {
        let endpoint = "/screen/assets";
        let options = RequestOptions::new()
            .json(serde_json::to_value(CreateAssetRequest {
                url,
                metadata,
                application_id,
            })?)
            .timeout(self.long_request_timeout);

        let response = retry_observed(
            &self.retry,
            || {
                info!("Creating asset");
                self.post(endpoint, &options)
            },
            |attempt, _| info!("Retrying asset creation (attempt {attempt})"),
        )
        .await?;
        response.json(endpoint)
    }

    pub async fn submit_application(
        &self,
        application_id: &str,
        payload: &Value,
    ) -> Result<Value, ApiError> {
        let endpoint = format!("/screen/applications/{application_id}/submit_application");
        let options = RequestOptions::new()
            .json(payload.clone())
            .timeout(self.long_request_timeout);
        self.post(&endpoint, &options).await?.value(&endpoint)
    }

    /// Transfer raw bytes to a presigned object storage URL. No credentials
    /// are attached; the URL itself authorizes the upload.
    pub async fn upload_to_presigned(
        &self,
        url: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .timeout(self.long_request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upload {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }
        Ok(())
    }
}

fn check_status(method: &Method, endpoint: &str, response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if (400..600).contains(&response.status) {
        return Err(ApiError::Status {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            status: response.status,
            body: response.body,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds(access: &str, refresh: &str) -> Credentials {
        Credentials {
            access_token: access.into(),
            refresh_token: refresh.into(),
        }
    }

    async fn client_for(server: &MockServer, access: &str, refresh: &str) -> ScreeningClient {
        ScreeningClient::new(server.uri(), creds(access, refresh)).unwrap()
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screen/applications/7"))
            .and(header("authorization", "Bearer a-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"application": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, "a-1", "r-1").await;
        let value = client.application_details("7").await.unwrap();
        assert_eq!(value, json!({"application": {}}));
    }

    #[tokio::test]
    async fn refreshes_once_and_reissues_after_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screen/applications/7"))
            .and(header("authorization", "Bearer old"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/screen/applications/7"))
            .and(header("authorization", "Bearer new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(json!({"refreshToken": "r-old"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"bearerToken": "new", "refreshToken": "r-new"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, "old", "r-old").await;
        let value = client.application_details("7").await.unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert_eq!(client.credentials().await, creds("new", "r-new"));
    }

    #[tokio::test]
    async fn second_401_is_terminal_without_another_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screen/applications/7"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"bearerToken": "new", "refreshToken": "r-new"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, "old", "r-old").await;
        let err = client.application_details("7").await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(client.credentials().await, creds("new", "r-new"));
    }

    #[tokio::test]
    async fn refresh_warns_and_terminal_401_logs_an_error() {
        use crate::telemetry::{LogEntry, LogHub};
        use tracing_subscriber::Registry;
        use tracing_subscriber::layer::SubscriberExt;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screen/applications/7"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"bearerToken": "new", "refreshToken": "r-new"})),
            )
            .mount(&server)
            .await;

        let hub = LogHub::new(64);
        let mut rx = hub.subscribe();
        let _default = tracing::subscriber::set_default(Registry::default().with(hub.layer()));

        let client = client_for(&server, "old", "r-old").await;
        client.application_details("7").await.unwrap_err();

        let mut entries: Vec<LogEntry> = Vec::new();
        while let Ok(entry) = rx.try_recv() {
            if entry.target.starts_with("app_factory::screening") && entry.level != "INFO" {
                entries.push(entry);
            }
        }
        let levels: Vec<&str> = entries.iter().map(|e| e.level.as_str()).collect();
        assert_eq!(levels, ["WARN", "ERROR"]);
        // One refresh only: the second 401 does not warn again.
        assert!(entries[0].message.contains("Refreshing tokens"));
        assert!(entries[1].message.contains("failed again with 401"));
    }

    #[tokio::test]
    async fn client_errors_surface_status_and_body_without_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/screen/applications/7"))
            .respond_with(ResponseTemplate::new(422).set_body_string("move-in date invalid"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        let err = client
            .patch_application("7", &json!({"desired_move_in_date": "2020-01-31"}))
            .await
            .unwrap_err();

        match err {
            ApiError::Status { status, body, .. } => {
                assert_eq!(status, 422);
                assert_eq!(body, "move-in date invalid");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_are_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/screen/applications/7/start_application"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        let err = client.start_application("7").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn empty_success_body_reads_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/screen/applicants/55/pass_invite_flow"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        assert_eq!(client.pass_invite_flow("55").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn failed_refresh_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screen/applications/7"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(403).set_body_string("refresh token revoked"))
            .mount(&server)
            .await;

        let client = client_for(&server, "old", "r-old").await;
        let err = client.application_details("7").await.unwrap_err();
        assert!(matches!(err, ApiError::RefreshFailed { status: 403, .. }));
        assert_eq!(client.credentials().await, creds("old", "r-old"));
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screen/applications/7/verifications/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": 1})))
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        let err = client.verification_details("7", "3").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn presign_sends_filename_and_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/screen/assets/presign"))
            .and(query_param("filename", "Paystub.pdf"))
            .and(query_param("type", "application/pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"url": "https://bucket/p", "method": "PUT"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        let presign = client.presign("Paystub.pdf", "application/pdf").await.unwrap();
        assert_eq!(presign.url, "https://bucket/p");
    }

    #[tokio::test]
    async fn create_asset_retries_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/screen/assets"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"asset": {"global_id": "slow"}})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/screen/assets"))
            .and(body_json(json!({
                "url": "https://bucket/s",
                "metadata": {"size": 3, "original_filename": "s.svg", "content_type": "image/svg+xml"},
                "application_id": "7"
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"asset": {"global_id": "gid-1"}})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r")
            .await
            .with_retry(RetryPolicy {
                backoff_base_ms: 10,
                ..Default::default()
            })
            .with_timeouts(Duration::from_millis(100), Duration::from_millis(100));
        let metadata = FileMetadata {
            size: 3,
            original_filename: "s.svg".into(),
            content_type: "image/svg+xml".into(),
        };

        let asset = client
            .create_asset("7", "https://bucket/s", &metadata)
            .await
            .unwrap();
        assert_eq!(asset.asset.unwrap().global_id.as_deref(), Some("gid-1"));
    }

    #[tokio::test]
    async fn create_asset_does_not_retry_business_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/screen/assets"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad url"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        let metadata = FileMetadata {
            size: 1,
            original_filename: "s.svg".into(),
            content_type: "image/svg+xml".into(),
        };
        let err = client
            .create_asset("7", "https://bucket/s", &metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn presigned_upload_sends_raw_bytes_without_auth() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/bucket/signature.svg"))
            .and(header("content-type", "image/svg+xml"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        let url = format!("{}/bucket/signature.svg", server.uri());
        client
            .upload_to_presigned(&url, b"<svg/>".to_vec(), "image/svg+xml")
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());
        assert_eq!(received[0].body, b"<svg/>".to_vec());
    }

    #[tokio::test]
    async fn presigned_upload_failure_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client_for(&server, "a", "r").await;
        let url = format!("{}/bucket/x.pdf", server.uri());
        let err = client
            .upload_to_presigned(&url, vec![1, 2, 3], "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upload { status: 403, .. }));
    }

    #[tokio::test]
    async fn put_and_delete_share_the_refresh_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/screen/applications/7/notes"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bearerToken": "fresh",
                "refreshToken": "r-2"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/screen/applications/7/notes"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"saved": true})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/screen/applications/7/notes"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, "stale", "r-1").await;
        let options = RequestOptions::new().json(json!({"text": "hello"}));
        let saved = client.put("/screen/applications/7/notes", &options).await.unwrap();
        assert_eq!(saved.value("notes").unwrap(), json!({"saved": true}));

        let deleted = client
            .delete("/screen/applications/7/notes", &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(deleted.status, 204);
        assert_eq!(client.credentials().await.refresh_token, "r-2");
    }
}
