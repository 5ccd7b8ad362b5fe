use crate::error::EngineError;

pub const DEFAULT_TOTAL_TRIALS: usize = 5;
pub const DEFAULT_MIN_DELAY_MS: u64 = 2000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Settings for one reaction-task run, fixed at session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub subject_id: String,
    pub total_trials: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            subject_id: String::new(),
            total_trials: DEFAULT_TOTAL_TRIALS,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl SessionConfig {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.total_trials == 0 {
            return Err(EngineError::NoTrialsConfigured);
        }
        if self.min_delay_ms >= self.max_delay_ms {
            return Err(EngineError::EmptyDelayWindow {
                min_ms: self.min_delay_ms,
                max_ms: self.max_delay_ms,
            });
        }
        Ok(())
    }
}

/// Phase of the trial state machine. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TrialState {
    Idle,
    Waiting,
    Active,
    Finished,
}
