//! Logging setup: stdout, a plain-text log file and a live broadcast feed.
//!
//! Components log through `tracing` macros; the module path of each call
//! site is its logger name. [`LogHub`] fans events out to any number of live
//! observers (the `/api/logs` stream subscribes to it).

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::TelemetryConfig;

pub const LOG_FILE_NAME: &str = "app-factory.log";
pub const RUN_COMPLETE_MARKER: &str = "__RUN_COMPLETE__";

const HUB_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },

    #[error("unable to open log file: {0}")]
    LogFile(#[from] std::io::Error),

    #[error("telemetry error: {0}")]
    Subscriber(#[from] TryInitError),
}

/// One log event as seen by live observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn info(target: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: "INFO".to_string(),
            target: target.to_string(),
            message: message.into(),
        }
    }
}

/// Broadcast channel of [`LogEntry`] values.
#[derive(Debug, Clone)]
pub struct LogHub {
    sender: broadcast::Sender<LogEntry>,
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new(HUB_CAPACITY)
    }
}

impl LogHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Send an entry to current observers. Entries sent with no observer
    /// attached are dropped.
    pub fn publish(&self, entry: LogEntry) {
        let _ = self.sender.send(entry);
    }

    pub fn layer(&self) -> HubLayer {
        HubLayer { hub: self.clone() }
    }
}

/// `tracing` layer that forwards every event to a [`LogHub`].
pub struct HubLayer {
    hub: LogHub,
}

impl<S: Subscriber> Layer<S> for HubLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        self.hub.publish(LogEntry {
            timestamp: Utc::now(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message: visitor.finish(),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::EnvFilter {
            value: config.log_level.clone(),
            source,
        }),
    }
}

/// Install the global subscriber. Call once per process.
pub fn init(config: &TelemetryConfig, logs_dir: &Path, hub: &LogHub) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    std::fs::create_dir_all(logs_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(LOG_FILE_NAME))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(hub.layer())
        .try_init()?;
    Ok(())
}

/// What [`clear_log_files`] did. Runs before a subscriber exists, so the
/// failures are kept for [`LogCleanup::report`] instead of being logged.
#[derive(Debug, Default)]
pub struct LogCleanup {
    pub removed: usize,
    pub failures: Vec<String>,
}

impl LogCleanup {
    /// Log the outcome, failures as warnings. Call once telemetry is
    /// initialised.
    pub fn report(&self) {
        if self.removed > 0 {
            info!("Cleared {} log file(s) from earlier runs", self.removed);
        }
        for failure in &self.failures {
            warn!("{failure}");
        }
    }
}

/// Delete `*.log` files left in `logs_dir` by earlier runs. Best effort.
pub fn clear_log_files(logs_dir: &Path) -> LogCleanup {
    let mut cleanup = LogCleanup::default();
    let entries = match std::fs::read_dir(logs_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return cleanup,
        Err(e) => {
            cleanup
                .failures
                .push(format!("Could not read log directory {}: {e}", logs_dir.display()));
            return cleanup;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("log") {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => cleanup.removed += 1,
            Err(e) => cleanup
                .failures
                .push(format!("Could not remove log file {}: {e}", path.display())),
        }
    }
    cleanup
}
