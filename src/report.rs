use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use directories::ProjectDirs;
use serde::Serialize;

use crate::metrics::Metrics;

/// One row of the session history log.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub date: String,
    pub subject_id: String,
    pub total_trials: usize,
    pub premature_count: u32,
    pub mean_latency_ms: f64,
    pub latency_std_dev_ms: f64,
    pub impulsivity_error_rate: f64,
    pub focus_consistency_score: f64,
    /// Remote score, empty when the session was not submitted.
    pub score: Option<f64>,
}

impl SessionRecord {
    pub fn from_metrics(
        subject_id: impl Into<String>,
        total_trials: usize,
        premature_count: u32,
        metrics: &Metrics,
        score: Option<f64>,
    ) -> Self {
        Self {
            date: Local::now().format("%c").to_string(),
            subject_id: subject_id.into(),
            total_trials,
            premature_count,
            mean_latency_ms: metrics.mean_latency_ms,
            latency_std_dev_ms: metrics.latency_std_dev_ms,
            impulsivity_error_rate: metrics.impulsivity_error_rate,
            focus_consistency_score: metrics.focus_consistency_score,
            score,
        }
    }
}

/// Append-only CSV history of completed sessions.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "reflx") {
            pd.data_dir().join("sessions.csv")
        } else {
            PathBuf::from("reflx_sessions.csv")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, record: &SessionRecord) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // emit the header only when creating the file
        let needs_header = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()
    }
}
