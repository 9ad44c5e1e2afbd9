//! One-time sign-in that turns an invitation token into a credential pair.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info};

use super::error::ApiError;
use super::types::{Credentials, MagicLinkCheck, SendOtpResponse, SignInResponse};

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub unit_id: String,
    pub credentials: Credentials,
}

/// Performs the magic link check, OTP request and JWT sign-in against the
/// service without credentials.
pub struct Authenticator {
    http: Client,
    base_url: String,
}

impl Authenticator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    pub async fn sign_in(
        &self,
        application_token: &str,
        phone: &str,
        otp: &str,
    ) -> Result<AuthSession, ApiError> {
        info!("Requesting auth token for application token: {application_token}");

        let endpoint = "/screen/magic_links/check";
        let response = self
            .http
            .get(self.url(endpoint))
            .query(&[("token", application_token)])
            .send()
            .await?;
        let check: MagicLinkCheck = read_json(endpoint, "GET", response).await?;
        let unit_id = check
            .magic_link
            .and_then(|link| link.unit_id)
            .map(|id| id.to_string())
            .ok_or_else(|| {
                error!("Invalid magic link response: missing magic_link or unit_id");
                ApiError::InvalidResponse(
                    "Invalid magic link response: missing magic_link or unit_id".into(),
                )
            })?;

        let endpoint = "/screen/auth/send_otp";
        let response = self
            .http
            .post(self.url(endpoint))
            .json(&json!({
                "phone": phone,
                "unit_id": unit_id,
                "token": application_token,
            }))
            .send()
            .await?;
        let otp_sent: SendOtpResponse = read_json(endpoint, "POST", response).await?;
        if !otp_sent.success {
            error!("Failed to send OTP to {phone}");
            return Err(ApiError::InvalidResponse("Failed to send OTP".into()));
        }

        let endpoint = "/screen/auth/jwt/sign_in";
        let response = self
            .http
            .post(self.url(endpoint))
            .json(&json!({ "phone": phone, "otp": otp }))
            .send()
            .await?;
        let signed_in: SignInResponse = read_json(endpoint, "POST", response).await?;
        info!("Received bearer token for unit {unit_id}");

        Ok(AuthSession {
            unit_id,
            credentials: Credentials {
                access_token: signed_in.access_token,
                refresh_token: signed_in.refresh_token,
            },
        })
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    method: &str,
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        error!("{method} {endpoint} failed: {} {body}", status.as_u16());
        return Err(ApiError::Status {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("{e} in body: {body}"),
    })
}
