use std::sync::Arc;

use reqwest::Url;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::config::{ApiConfig, FactoryConfig};
use crate::data::{ApplicantDataSource, RandomDataSource};
use crate::error::FactoryError;
use crate::screening::{AuthSession, Authenticator, ScreeningClient};
use crate::workflow::{Applicant, ApplicationState, RunOutcome, Stage, StageObserver, Workflow};

/// Single-slot lock allowing one run per process at a time.
#[derive(Debug, Clone, Default)]
pub struct RunGate {
    slot: Arc<Mutex<()>>,
}

/// Held for the duration of a run; dropping it reopens the gate.
#[derive(Debug)]
pub struct RunGuard {
    _slot: OwnedMutexGuard<()>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<RunGuard, FactoryError> {
        Arc::clone(&self.slot)
            .try_lock_owned()
            .map(|slot| RunGuard { _slot: slot })
            .map_err(|_| FactoryError::AlreadyRunning)
    }

    pub fn is_running(&self) -> bool {
        self.slot.try_lock().is_err()
    }
}

/// The service address for a magic link: `screen.<env>` becomes `api.<env>`.
pub fn base_url_from_link(link: &str) -> Result<String, FactoryError> {
    let invalid = || FactoryError::Config(format!("Invalid magic link URL: {link}"));
    let url = Url::parse(link).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?;
    let api_host = match host.strip_prefix("screen.") {
        Some(rest) => format!("api.{rest}"),
        None => host.to_string(),
    };
    Ok(match url.port() {
        Some(port) => format!("{}://{api_host}:{port}", url.scheme()),
        None => format!("{}://{api_host}", url.scheme()),
    })
}

/// The address a run signs in against: the explicit `api.base_url` override
/// when one is configured, otherwise the environment named by the link.
pub fn service_base_url(api: &ApiConfig, link: &str) -> Result<String, FactoryError> {
    match &api.base_url {
        Some(url) => {
            info!("Using configured base URL override");
            Ok(url.clone())
        }
        None => base_url_from_link(link),
    }
}

/// The invitation token is the last path segment of the magic link.
pub fn application_token(link: &str) -> Result<String, FactoryError> {
    let token = link.trim().trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if token.trim().is_empty() {
        return Err(FactoryError::Config("Application token is required".into()));
    }
    Ok(token.to_string())
}

fn validate_session(session: &AuthSession) -> Result<(), FactoryError> {
    if session.credentials.access_token.is_empty() {
        return Err(FactoryError::Config("App info missing bearer_token".into()));
    }
    if session.credentials.refresh_token.is_empty() {
        return Err(FactoryError::Config("App info missing refresh_token".into()));
    }
    if session.unit_id.is_empty() {
        return Err(FactoryError::Config("App info missing unit_id".into()));
    }
    Ok(())
}

/// Signs in with a magic link and drives the resulting application through
/// the full workflow.
pub struct ApplicationRunner<D = RandomDataSource> {
    config: FactoryConfig,
    data: D,
    observer: Option<StageObserver>,
}

impl ApplicationRunner<RandomDataSource> {
    pub fn new(config: FactoryConfig) -> Self {
        Self {
            config,
            data: RandomDataSource::default(),
            observer: None,
        }
    }
}

impl<D> ApplicationRunner<D>
where
    D: ApplicantDataSource + Send + Sync + 'static,
{
    pub fn with_data_source<N>(self, data: N) -> ApplicationRunner<N> {
        ApplicationRunner {
            config: self.config,
            data,
            observer: self.observer,
        }
    }

    pub fn on_stage(mut self, observer: impl Fn(Stage) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub async fn run(self, magic_link: &str) -> Result<RunOutcome, FactoryError> {
        let base_url = service_base_url(&self.config.api, magic_link)?;
        info!("Using service address: {base_url}");

        let token = application_token(magic_link)?;
        let phone = self.data.phone();
        let otp = self.data.otp();

        let timeouts = &self.config.timeouts;
        let session = Authenticator::new(&base_url, timeouts.api_request())?
            .sign_in(&token, &phone, &otp)
            .await?;
        validate_session(&session)?;

        let client = ScreeningClient::new(&base_url, session.credentials)?
            .with_retry(self.config.retry.clone())
            .with_timeouts(timeouts.api_request(), timeouts.api_long_request());
        let app = ApplicationState::new(session.unit_id, token, Applicant::primary(phone, otp));

        let mut workflow = Workflow::new(client, self.config).with_data_source(self.data);
        if let Some(observer) = self.observer {
            workflow = workflow.on_stage(observer);
        }
        workflow.run(app).await
    }
}
