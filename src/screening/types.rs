//! Request and response schemas for the screening service.
//!
//! Every endpoint the workflow reads from decodes into one of these structs;
//! a body that does not fit is reported as [`ApiError::Decode`](super::ApiError::Decode).
//! Identifiers arrive as strings on some endpoints and numbers on others, so
//! they go through [`RemoteId`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier the service may encode as either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Text(String),
    Number(i64),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Text(s) => f.write_str(s),
            RemoteId::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Bearer and refresh tokens used by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

/// Answer of `POST /auth/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    #[serde(rename = "bearerToken")]
    pub bearer_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkCheck {
    pub magic_link: Option<MagicLinkInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkInfo {
    pub unit_id: Option<RemoteId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendOtpResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// A named verification sub-process as listed at enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub name: String,
    #[serde(default)]
    pub id: Option<RemoteId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollRequest<'a> {
    pub magic_link_token: &'a str,
    pub unit_id: &'a str,
    pub applicant: EnrollApplicant<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollApplicant<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub middle_name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollResponse {
    pub application: EnrolledApplication,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrolledApplication {
    pub id: RemoteId,
    pub current_applicant: Option<CurrentApplicant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentApplicant {
    pub id: RemoteId,
    #[serde(default)]
    pub verifications: Option<Vec<VerificationRecord>>,
}

/// The subset of `GET /screen/applications/{id}` the invitation loop reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationDetails {
    pub application: ApplicationFlags,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFlags {
    #[serde(default)]
    pub has_multiple_applicants: bool,
    #[serde(default)]
    pub has_multiple_guarantors: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteRequest<'a> {
    pub application_id: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinksResponse {
    #[serde(default)]
    pub magic_links: Vec<MagicLinkEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkEntry {
    pub email: String,
    pub application_link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationDetails {
    pub verification: VerificationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationStatus {
    pub status: String,
}

/// Response of income sub-resources that create a record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedResource {
    pub id: RemoteId,
}

/// Presigned object storage target from `GET /screen/assets/presign`.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignResponse {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub size: usize,
    pub original_filename: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAssetRequest<'a> {
    pub url: &'a str,
    pub metadata: &'a FileMetadata,
    pub application_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetResponse {
    #[serde(default)]
    pub asset: Option<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub global_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentUpload<'a> {
    pub document_type: &'a str,
    pub url: &'a str,
    pub metadata: &'a FileMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkDocumentsRequest<'a> {
    pub documents: Vec<DocumentUpload<'a>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsResponse {
    #[serde(default)]
    pub assets: Option<AssetItems>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetItems {
    #[serde(default)]
    pub items: Vec<Asset>,
}
