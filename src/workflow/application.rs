use serde::{Deserialize, Serialize};

use super::verification::VerificationMap;
use crate::data::{Address, PersonName};

/// Role an invited party takes on the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantRole {
    Applicant,
    CoSigner,
}

impl ApplicantRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicantRole::Applicant => "applicant",
            ApplicantRole::CoSigner => "co_signer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: Option<String>,
    pub name: Option<PersonName>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub otp: Option<String>,
    pub address: Option<Address>,
    pub role: ApplicantRole,
    pub invite_magic_link: Option<String>,
}

impl Applicant {
    pub fn primary(phone: String, otp: String) -> Self {
        Self {
            id: None,
            name: None,
            email: None,
            phone: Some(phone),
            otp: Some(otp),
            address: None,
            role: ApplicantRole::Applicant,
            invite_magic_link: None,
        }
    }
}

/// Everything a run learns about the remote application.
///
/// Owned by one workflow run and written to the `current_app` snapshot
/// whenever it changes in a way worth diagnosing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub unit_id: String,
    pub app_token: String,
    pub application_id: Option<String>,
    pub applicant: Applicant,
    #[serde(default)]
    pub applicants: Vec<Applicant>,
    pub verifications: Option<VerificationMap>,
    pub income_id: Option<String>,
    pub income_source_id: Option<String>,
}

impl ApplicationState {
    pub fn new(unit_id: String, app_token: String, applicant: Applicant) -> Self {
        Self {
            unit_id,
            app_token,
            application_id: None,
            applicant,
            applicants: Vec::new(),
            verifications: None,
            income_id: None,
            income_source_id: None,
        }
    }
}
