use chrono::{Local, Utc};
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::application::{Applicant, ApplicantRole, ApplicationState};
use super::state::{RunRecord, Stage, StageMachine, StepGroup};
use super::steps::{
    self, Contact, EmergencyContact, HOUSING_HISTORY_STEP, STATUS_VERIFIED,
    SUBMISSION_DISCLOSURE_STEP,
};
use super::upload;
use super::verification::VerificationMap;
use crate::config::FactoryConfig;
use crate::data::{ApplicantDataSource, PersonName, RandomDataSource};
use crate::error::FactoryError;
use crate::poll::wait_for;
use crate::screening::types::{EnrollApplicant, EnrollRequest, InviteRequest};
use crate::screening::{ApiError, ScreeningClient};
use crate::snapshot::{FileSnapshotSink, SnapshotSink};

/// Called with every stage a run reaches.
pub type StageObserver = Box<dyn Fn(Stage) + Send + Sync>;

/// Final application state and audit record of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: ApplicationState,
    pub record: RunRecord,
}

/// Identifiers fixed at enrollment and needed by every later step.
struct Enrollment {
    application_id: String,
    applicant_id: String,
    name: PersonName,
    email: String,
    verifications: VerificationMap,
}

/// Drives one authenticated applicant from enrollment to final submission.
///
/// Every remote call goes through the owned [`ScreeningClient`]. After each
/// step group the full remote application view is re-read and written to the
/// application snapshot. Any failure ends the run.
pub struct Workflow {
    client: ScreeningClient,
    data: Box<dyn ApplicantDataSource + Send + Sync>,
    snapshots: Box<dyn SnapshotSink + Send + Sync>,
    config: FactoryConfig,
    machine: StageMachine,
    observer: Option<StageObserver>,
}

impl Workflow {
    pub fn new(client: ScreeningClient, config: FactoryConfig) -> Self {
        Self {
            client,
            data: Box::new(RandomDataSource::default()),
            snapshots: Box::new(FileSnapshotSink),
            config,
            machine: StageMachine::new(),
            observer: None,
        }
    }

    pub fn with_data_source(mut self, data: impl ApplicantDataSource + Send + Sync + 'static) -> Self {
        self.data = Box::new(data);
        self
    }

    /// Replaces the file-backed snapshot sink.
    #[allow(dead_code)]
    pub fn with_snapshot_sink(mut self, sink: impl SnapshotSink + Send + Sync + 'static) -> Self {
        self.snapshots = Box::new(sink);
        self
    }

    pub fn on_stage(mut self, observer: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn advance(&mut self, next: Stage) -> Result<(), FactoryError> {
        self.machine.advance(next)?;
        info!("Stage reached: {next}");
        if let Some(observer) = &self.observer {
            observer(next);
        }
        Ok(())
    }

    /// Run every stage in order. `app` must come from a completed sign-in.
    pub async fn run(mut self, mut app: ApplicationState) -> Result<RunOutcome, FactoryError> {
        let run_id = RunRecord::new_run_id();
        let started_at = Utc::now();
        info!("Starting run {run_id} for unit {}", app.unit_id);

        self.advance(Stage::Authenticated)?;
        self.save_app(&app)?;

        let enrollment = self.enroll(&mut app).await?;
        self.advance(Stage::Enrolled)?;

        self.start(&enrollment).await?;
        self.advance(Stage::Started)?;

        self.request_identity_verification(&enrollment).await?;
        self.invite_parties(&mut app, &enrollment).await?;

        self.submit_personal_details(&app, &enrollment).await?;
        self.snapshot_application(&enrollment.application_id).await?;
        self.advance(Stage::StepsSubmitted(StepGroup::PersonalDetails))?;

        self.submit_housing_history(&mut app, &enrollment).await?;
        self.snapshot_application(&enrollment.application_id).await?;
        self.advance(Stage::StepsSubmitted(StepGroup::HousingHistory))?;

        self.submit_combined_income(&mut app, &enrollment).await?;
        self.snapshot_application(&enrollment.application_id).await?;
        self.advance(Stage::StepsSubmitted(StepGroup::CombinedIncome))?;

        self.submit_move_in_date(&enrollment).await?;
        self.snapshot_application(&enrollment.application_id).await?;
        self.advance(Stage::StepsSubmitted(StepGroup::MoveInDate))?;

        self.sign_disclosure(&enrollment).await?;
        self.snapshot_application(&enrollment.application_id).await?;
        self.advance(Stage::DisclosureSigned)?;

        self.advance(Stage::VerificationPending)?;
        self.await_identity_verification(&enrollment).await?;
        self.snapshot_application(&enrollment.application_id).await?;
        self.advance(Stage::VerificationResolved)?;

        self.submit_application(&app, &enrollment).await?;
        self.snapshot_application(&enrollment.application_id).await?;
        self.advance(Stage::Submitted)?;

        info!(
            "Completed application flow for application ID: {}. Applicant name is {}",
            enrollment.application_id,
            enrollment.name.signature_name()
        );

        let completed_at = Utc::now();
        let record = RunRecord {
            run_id,
            application_id: Some(enrollment.application_id),
            applicant_id: Some(enrollment.applicant_id),
            invited_applicants: app.applicants.len(),
            stage_transitions: self.machine.visited(),
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        };
        Ok(RunOutcome { state: app, record })
    }

    fn save_app(&self, app: &ApplicationState) -> Result<(), FactoryError> {
        self.snapshots
            .write(&self.config.paths.current_app, &serde_json::to_value(app)?)
    }

    /// Read-after-write capture of the remote application view.
    async fn snapshot_application(&self, application_id: &str) -> Result<(), FactoryError> {
        let view = self.client.application_details(application_id).await?;
        self.snapshots
            .write(&self.config.paths.application_snapshot, &view)
    }

    async fn enroll(&self, app: &mut ApplicationState) -> Result<Enrollment, FactoryError> {
        let name = self.data.full_name();
        let email = self.data.email();

        let response = self
            .client
            .enroll_with_magic_link(&EnrollRequest {
                magic_link_token: &app.app_token,
                unit_id: &app.unit_id,
                applicant: EnrollApplicant {
                    email: &email,
                    first_name: &name.first,
                    last_name: &name.last,
                    middle_name: &name.middle,
                },
            })
            .await?;

        let application_id = response.application.id.to_string();
        let current = response.application.current_applicant.ok_or_else(|| {
            ApiError::InvalidResponse("Enroll response missing current_applicant".into())
        })?;
        let records = current.verifications.ok_or_else(|| {
            ApiError::InvalidResponse(
                "Enroll response missing current_applicant.verifications".into(),
            )
        })?;
        let verifications = VerificationMap::resolve_all(&records)?;
        for (category, id) in verifications.entries() {
            debug!("Resolved {category} verification: {id}");
        }
        let applicant_id = current.id.to_string();

        app.application_id = Some(application_id.clone());
        app.applicant.id = Some(applicant_id.clone());
        app.applicant.name = Some(name.clone());
        app.applicant.email = Some(email.clone());
        app.verifications = Some(verifications.clone());
        self.save_app(app)?;
        info!("Enrolled application ID: {application_id} for {email}");

        Ok(Enrollment {
            application_id,
            applicant_id,
            name,
            email,
            verifications,
        })
    }

    async fn start(&self, enrollment: &Enrollment) -> Result<(), FactoryError> {
        let started = self
            .client
            .start_application(&enrollment.application_id)
            .await?;
        self.snapshots
            .write(&self.config.paths.application_snapshot, &started)?;

        let passed = self
            .client
            .pass_invite_flow(&enrollment.applicant_id)
            .await?;
        self.snapshots
            .write(&self.config.paths.applicant_snapshot, &passed)?;
        info!("Passed invite flow for applicant ID: {}", enrollment.applicant_id);
        Ok(())
    }

    async fn request_identity_verification(&self, enrollment: &Enrollment) -> Result<(), FactoryError> {
        info!("Starting identity verification process");
        self.client
            .create_test_identity_verification(&enrollment.application_id, &enrollment.applicant_id)
            .await?;
        info!("Identity verification requested; it resolves asynchronously");
        Ok(())
    }

    async fn invite_parties(
        &self,
        app: &mut ApplicationState,
        enrollment: &Enrollment,
    ) -> Result<(), FactoryError> {
        let actors = &self.config.actors;
        for _ in 0..actors.co_applicants {
            self.invite(app, enrollment, ApplicantRole::Applicant).await?;
        }
        for _ in 0..actors.guarantors {
            self.invite(app, enrollment, ApplicantRole::CoSigner).await?;
        }
        Ok(())
    }

    async fn invite(
        &self,
        app: &mut ApplicationState,
        enrollment: &Enrollment,
        role: ApplicantRole,
    ) -> Result<(), FactoryError> {
        let application_id = enrollment.application_id.as_str();
        let flags = self.client.application_flags(application_id).await?.application;

        match role {
            ApplicantRole::Applicant if !flags.has_multiple_applicants => {
                info!("Setting has_multiple_applicants to true");
                self.client
                    .patch_application(application_id, &json!({ "has_multiple_applicants": true }))
                    .await?;
            }
            ApplicantRole::CoSigner if !flags.has_multiple_guarantors => {
                info!("Setting has_multiple_guarantors to true");
                self.client
                    .patch_application(application_id, &json!({ "has_multiple_guarantors": true }))
                    .await?;
            }
            _ => {}
        }

        let name = self.data.full_name();
        let email = self.data.email();
        info!("Inviting {}: {email}", role.as_str());
        self.client
            .invite_applicant(&InviteRequest {
                application_id,
                email: &email,
                first_name: &name.first,
                last_name: &name.last,
                role: role.as_str(),
            })
            .await?;

        let links = self.client.magic_links(application_id).await?;
        let magic_link = links
            .magic_links
            .into_iter()
            .find(|link| link.email == email)
            .map(|link| link.application_link)
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!("No magic link returned for invitee {email}"))
            })?;

        info!("Invitee added successfully. Magic link: {magic_link}");
        app.applicants.push(Applicant {
            id: None,
            name: Some(name),
            email: Some(email),
            phone: None,
            otp: None,
            address: None,
            role,
            invite_magic_link: Some(magic_link),
        });
        self.save_app(app)
    }

    async fn submit_personal_details(
        &self,
        app: &ApplicationState,
        enrollment: &Enrollment,
    ) -> Result<(), FactoryError> {
        let contact = Contact {
            name: &enrollment.name,
            email: &enrollment.email,
            phone: app.applicant.phone.as_deref().unwrap_or_default(),
        };
        let emergency = EmergencyContact {
            name: self.data.full_name(),
            phone: self.data.phone(),
        };

        let verification_id = &enrollment.verifications.personal_details;
        for (step, payload) in steps::personal_details_steps(&contact, &emergency, &self.config.defaults) {
            self.client
                .submit_step(&enrollment.application_id, verification_id, step, &payload)
                .await?;
            info!("Submitted step: {step}");
        }
        Ok(())
    }

    async fn submit_housing_history(
        &self,
        app: &mut ApplicationState,
        enrollment: &Enrollment,
    ) -> Result<(), FactoryError> {
        let address = self.data.address();
        let payload = steps::housing_history_payload(
            &address,
            self.data.monthly_mortgage_payment(),
            &self.config.defaults,
        );
        self.client
            .submit_step(
                &enrollment.application_id,
                &enrollment.verifications.housing_history,
                HOUSING_HISTORY_STEP,
                &payload,
            )
            .await?;
        app.applicant.address = Some(address);
        info!("Submitted housing history");
        Ok(())
    }

    async fn submit_combined_income(
        &self,
        app: &mut ApplicationState,
        enrollment: &Enrollment,
    ) -> Result<(), FactoryError> {
        let application_id = enrollment.application_id.as_str();
        let verification_id = enrollment.verifications.combined_income.as_str();

        let employment = self.data.employment();
        let income = self
            .client
            .create_income_record(
                application_id,
                verification_id,
                "income",
                &steps::self_employment_payload(&employment),
            )
            .await?;
        let income_id = income.id.to_string();
        info!("Submitted first part of combined income verification: {income_id}");

        let source = self
            .client
            .create_income_record(
                application_id,
                verification_id,
                "income_sources",
                &steps::paystub_source_payload(&income_id),
            )
            .await?;
        let income_source_id = source.id.to_string();
        info!("Submitted second part of combined income verification: {income_source_id}");

        app.income_id = Some(income_id);
        app.income_source_id = Some(income_source_id.clone());

        upload::upload_income_document(
            &self.client,
            application_id,
            verification_id,
            &income_source_id,
            &self.config.paths.paystub,
            "paystub",
        )
        .await?;

        self.client
            .finish_income(application_id, verification_id)
            .await?;
        Ok(())
    }

    async fn submit_move_in_date(&self, enrollment: &Enrollment) -> Result<(), FactoryError> {
        let date = steps::last_day_of_month(Local::now().date_naive());
        self.client
            .patch_application(&enrollment.application_id, &steps::move_in_payload(date))
            .await?;
        info!("Submitted desired move-in date: {date}");
        Ok(())
    }

    async fn sign_disclosure(&self, enrollment: &Enrollment) -> Result<(), FactoryError> {
        let signature_id = upload::upload_signature(
            &self.client,
            &enrollment.application_id,
            &self.config.paths.signature,
        )
        .await?;

        self.client
            .submit_step(
                &enrollment.application_id,
                &enrollment.verifications.submission_disclosure,
                SUBMISSION_DISCLOSURE_STEP,
                &steps::disclosure_payload(&enrollment.name, &signature_id),
            )
            .await?;
        info!("Submitted submission disclosure");
        info!("Signature uploaded with asset ID: {signature_id}");
        Ok(())
    }

    /// Poll the identity verification until it reports `verified`.
    ///
    /// Any other status, including a failed one, only keeps the poll going.
    async fn await_identity_verification(&self, enrollment: &Enrollment) -> Result<(), FactoryError> {
        let timeouts = &self.config.timeouts;
        info!("Checking identity verification");
        sleep(timeouts.identity_verification_wait()).await;

        let client = &self.client;
        let application_id = enrollment.application_id.as_str();
        let verification_id = enrollment.verifications.identity.as_str();
        wait_for(
            || async move {
                let details = client
                    .verification_details(application_id, verification_id)
                    .await?;
                let status = details.verification.status;
                let verified = status == STATUS_VERIFIED;
                if verified {
                    info!("Identity verification completed successfully");
                } else {
                    error!("Identity verification not completed. Status: {status}");
                }
                Ok::<bool, FactoryError>(verified)
            },
            timeouts.identity_verification_check(),
            timeouts.identity_verification_interval(),
        )
        .await
    }

    async fn submit_application(
        &self,
        app: &ApplicationState,
        enrollment: &Enrollment,
    ) -> Result<(), FactoryError> {
        let view = self
            .client
            .application_details(&enrollment.application_id)
            .await?;
        let payload = steps::mark_submitted(view);
        self.client
            .submit_application(&enrollment.application_id, &payload)
            .await?;
        info!(
            "Application {} for applicant {} with phone number {} successfully submitted",
            enrollment.application_id,
            enrollment.applicant_id,
            app.applicant.phone.as_deref().unwrap_or_default()
        );
        Ok(())
    }
}
