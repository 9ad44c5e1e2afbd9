//! Terminal progress for a CLI run: a spinner that follows the workflow
//! stage and a coloured result line.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::workflow::{RunRecord, Stage};

pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    cyan: Style,
}

impl RunProgress {
    pub fn start(magic_link: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{}: {magic_link}", Stage::Unauthenticated));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            cyan: Style::new().cyan(),
        }
    }

    /// A cheap handle for updating the spinner from a stage observer.
    pub fn bar(&self) -> ProgressBar {
        self.pb.clone()
    }

    pub fn update_stage(bar: &ProgressBar, stage: Stage) {
        bar.set_message(stage.to_string());
    }

    pub fn succeed(&self, record: &RunRecord) {
        self.pb.finish_and_clear();
        println!(
            "  {} Application {} submitted in {}ms",
            self.green.apply_to("✓"),
            record.application_id.as_deref().unwrap_or("?"),
            record.duration_ms
        );
    }

    pub fn fail(&self, error: &dyn std::fmt::Display) {
        self.pb.finish_and_clear();
        println!("  {} Run failed: {error}", self.red.apply_to("✗"));
    }

    pub fn print_record(&self, record: &RunRecord) {
        println!();
        println!("{}", self.cyan.apply_to("─── Run Record ───"));
        println!("{}", serde_json::to_string_pretty(record).unwrap_or_default());
    }
}
