pub mod application;
pub mod sequencer;
pub mod state;
pub mod steps;
pub mod upload;
pub mod verification;

pub use application::{Applicant, ApplicantRole, ApplicationState};
pub use sequencer::{RunOutcome, StageObserver, Workflow};
pub use state::{RunRecord, Stage, StageMachine, StepGroup};
pub use verification::{VerificationCategory, VerificationMap};
