//! Maps the verification records listed at enrollment onto the five
//! categories later steps submit against.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FactoryError;
use crate::screening::VerificationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationCategory {
    PersonalDetails,
    HousingHistory,
    Identity,
    CombinedIncome,
    SubmissionDisclosure,
}

impl VerificationCategory {
    pub const ALL: [VerificationCategory; 5] = [
        VerificationCategory::PersonalDetails,
        VerificationCategory::HousingHistory,
        VerificationCategory::Identity,
        VerificationCategory::CombinedIncome,
        VerificationCategory::SubmissionDisclosure,
    ];

    /// Substring the service uses in the verification record's name.
    pub fn remote_name(self) -> &'static str {
        match self {
            VerificationCategory::PersonalDetails => "rental_application",
            VerificationCategory::HousingHistory => "housing_history",
            VerificationCategory::Identity => "identity",
            VerificationCategory::CombinedIncome => "combined_income",
            VerificationCategory::SubmissionDisclosure => "submission_disclosure",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VerificationCategory::PersonalDetails => "Personal details",
            VerificationCategory::HousingHistory => "Housing history",
            VerificationCategory::Identity => "Identity",
            VerificationCategory::CombinedIncome => "Combined income",
            VerificationCategory::SubmissionDisclosure => "Submission disclosure",
        }
    }
}

impl fmt::Display for VerificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationCategory::PersonalDetails => write!(f, "personal_details"),
            VerificationCategory::HousingHistory => write!(f, "housing_history"),
            VerificationCategory::Identity => write!(f, "identity"),
            VerificationCategory::CombinedIncome => write!(f, "combined_income"),
            VerificationCategory::SubmissionDisclosure => write!(f, "submission_disclosure"),
        }
    }
}

/// Find the first record whose name contains `name` and return its id.
///
/// A matching record without an id counts as missing.
pub fn resolve(
    records: &[VerificationRecord],
    name: &str,
    label: &str,
) -> Result<String, FactoryError> {
    records
        .iter()
        .find(|record| record.name.contains(name))
        .and_then(|record| record.id.as_ref())
        .map(|id| id.to_string())
        .ok_or_else(|| FactoryError::MissingVerification {
            label: label.to_string(),
            name: name.to_string(),
        })
}

/// Remote identifiers for every verification category of one applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMap {
    pub personal_details: String,
    pub housing_history: String,
    pub identity: String,
    pub combined_income: String,
    pub submission_disclosure: String,
}

impl VerificationMap {
    /// Resolve all five categories. Either every category resolves or
    /// nothing is returned.
    pub fn resolve_all(records: &[VerificationRecord]) -> Result<Self, FactoryError> {
        let lookup = |category: VerificationCategory| {
            resolve(records, category.remote_name(), category.label())
        };
        Ok(Self {
            personal_details: lookup(VerificationCategory::PersonalDetails)?,
            housing_history: lookup(VerificationCategory::HousingHistory)?,
            identity: lookup(VerificationCategory::Identity)?,
            combined_income: lookup(VerificationCategory::CombinedIncome)?,
            submission_disclosure: lookup(VerificationCategory::SubmissionDisclosure)?,
        })
    }

    pub fn get(&self, category: VerificationCategory) -> &str {
        match category {
            VerificationCategory::PersonalDetails => &self.personal_details,
            VerificationCategory::HousingHistory => &self.housing_history,
            VerificationCategory::Identity => &self.identity,
            VerificationCategory::CombinedIncome => &self.combined_income,
            VerificationCategory::SubmissionDisclosure => &self.submission_disclosure,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (VerificationCategory, &str)> {
        VerificationCategory::ALL
            .into_iter()
            .map(move |category| (category, self.get(category)))
    }
}
