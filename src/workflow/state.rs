use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FactoryError;

/// The four step groups submitted between `Started` and `DisclosureSigned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepGroup {
    PersonalDetails,
    HousingHistory,
    CombinedIncome,
    MoveInDate,
}

impl StepGroup {
    pub const ALL: [StepGroup; 4] = [
        StepGroup::PersonalDetails,
        StepGroup::HousingHistory,
        StepGroup::CombinedIncome,
        StepGroup::MoveInDate,
    ];

    /// 1-based position among the four groups.
    pub fn ordinal(self) -> usize {
        self as usize + 1
    }

    fn next(self) -> Option<StepGroup> {
        Self::ALL.get(self.ordinal()).copied()
    }
}

impl fmt::Display for StepGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepGroup::PersonalDetails => write!(f, "personal_details"),
            StepGroup::HousingHistory => write!(f, "housing_history"),
            StepGroup::CombinedIncome => write!(f, "combined_income"),
            StepGroup::MoveInDate => write!(f, "move_in_date"),
        }
    }
}

/// Stages of one onboarding run.
///
/// Each run flows strictly forward:
/// UNAUTHENTICATED → AUTHENTICATED → ENROLLED → STARTED → STEPS_SUBMITTED(1..4)
/// → DISCLOSURE_SIGNED → VERIFICATION_PENDING → VERIFICATION_RESOLVED → SUBMITTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Unauthenticated,
    Authenticated,
    Enrolled,
    Started,
    StepsSubmitted(StepGroup),
    DisclosureSigned,
    VerificationPending,
    VerificationResolved,
    Submitted,
}

impl Stage {
    /// The only stage a run may move to from `self`.
    pub fn successor(self) -> Option<Stage> {
        match self {
            Stage::Unauthenticated => Some(Stage::Authenticated),
            Stage::Authenticated => Some(Stage::Enrolled),
            Stage::Enrolled => Some(Stage::Started),
            Stage::Started => Some(Stage::StepsSubmitted(StepGroup::PersonalDetails)),
            Stage::StepsSubmitted(group) => Some(
                group
                    .next()
                    .map(Stage::StepsSubmitted)
                    .unwrap_or(Stage::DisclosureSigned),
            ),
            Stage::DisclosureSigned => Some(Stage::VerificationPending),
            Stage::VerificationPending => Some(Stage::VerificationResolved),
            Stage::VerificationResolved => Some(Stage::Submitted),
            Stage::Submitted => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Unauthenticated => write!(f, "UNAUTHENTICATED"),
            Stage::Authenticated => write!(f, "AUTHENTICATED"),
            Stage::Enrolled => write!(f, "ENROLLED"),
            Stage::Started => write!(f, "STARTED"),
            Stage::StepsSubmitted(group) => write!(
                f,
                "STEPS_SUBMITTED({}/{} {group})",
                group.ordinal(),
                StepGroup::ALL.len()
            ),
            Stage::DisclosureSigned => write!(f, "DISCLOSURE_SIGNED"),
            Stage::VerificationPending => write!(f, "VERIFICATION_PENDING"),
            Stage::VerificationResolved => write!(f, "VERIFICATION_RESOLVED"),
            Stage::Submitted => write!(f, "SUBMITTED"),
        }
    }
}

/// Tracks the current stage of a run and every stage it has left behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMachine {
    pub stage: Stage,
    pub history: Vec<Stage>,
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StageMachine {
    pub fn new() -> Self {
        Self {
            stage: Stage::Unauthenticated,
            history: Vec::new(),
        }
    }

    /// Move to `next`, which must be the direct successor of the current stage.
    pub fn advance(&mut self, next: Stage) -> Result<(), FactoryError> {
        if self.stage.successor() != Some(next) {
            return Err(FactoryError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.history.push(self.stage);
        self.stage = next;
        Ok(())
    }

    /// Every stage visited so far, including the current one.
    pub fn visited(&self) -> Vec<Stage> {
        let mut stages = self.history.clone();
        stages.push(self.stage);
        stages
    }
}

/// Structured record produced when a run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub application_id: Option<String>,
    pub applicant_id: Option<String>,
    pub invited_applicants: usize,
    pub stage_transitions: Vec<Stage>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunRecord {
    pub fn new_run_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_all_stages() {
        let mut machine = StageMachine::new();
        let mut stage = machine.stage;
        let mut steps = 0;
        while let Some(next) = stage.successor() {
            machine.advance(next).unwrap();
            stage = next;
            steps += 1;
        }
        assert_eq!(machine.stage, Stage::Submitted);
        assert_eq!(machine.stage.successor(), None);
        // 3 setup stages, 4 step groups, 4 closing stages.
        assert_eq!(steps, 11);
        assert_eq!(machine.visited().len(), 12);
    }

    #[test]
    fn step_groups_are_sequential() {
        assert_eq!(
            Stage::Started.successor(),
            Some(Stage::StepsSubmitted(StepGroup::PersonalDetails))
        );
        assert_eq!(
            Stage::StepsSubmitted(StepGroup::CombinedIncome).successor(),
            Some(Stage::StepsSubmitted(StepGroup::MoveInDate))
        );
        assert_eq!(
            Stage::StepsSubmitted(StepGroup::MoveInDate).successor(),
            Some(Stage::DisclosureSigned)
        );
    }

    #[test]
    fn skipping_a_stage_is_rejected() {
        let mut machine = StageMachine::new();
        machine.advance(Stage::Authenticated).unwrap();

        let err = machine.advance(Stage::Started).unwrap_err();
        assert!(matches!(
            err,
            FactoryError::InvalidTransition {
                from: Stage::Authenticated,
                to: Stage::Started
            }
        ));
        assert_eq!(machine.stage, Stage::Authenticated);
    }

    #[test]
    fn going_backwards_is_rejected() {
        let mut machine = StageMachine::new();
        machine.advance(Stage::Authenticated).unwrap();
        machine.advance(Stage::Enrolled).unwrap();
        assert!(machine.advance(Stage::Authenticated).is_err());
        assert_eq!(machine.history, vec![Stage::Unauthenticated, Stage::Authenticated]);
    }

    #[test]
    fn submitted_is_terminal() {
        let mut machine = StageMachine {
            stage: Stage::Submitted,
            history: Vec::new(),
        };
        assert!(machine.advance(Stage::Submitted).is_err());
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Unauthenticated.to_string(), "UNAUTHENTICATED");
        assert_eq!(
            Stage::StepsSubmitted(StepGroup::HousingHistory).to_string(),
            "STEPS_SUBMITTED(2/4 housing_history)"
        );
        assert_eq!(Stage::VerificationPending.to_string(), "VERIFICATION_PENDING");
    }

    #[test]
    fn stage_serialization_roundtrip() {
        let json = serde_json::to_string(&Stage::StepsSubmitted(StepGroup::MoveInDate)).unwrap();
        let parsed: Stage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Stage::StepsSubmitted(StepGroup::MoveInDate));
    }
}
