use thiserror::Error;

/// Contract violations by the caller. These are programmer errors and the
/// engine fails fast instead of coercing state.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("session restarted while a trial was in flight")]
    RestartMidSession,

    #[error("metrics requested on an incomplete sample ({actual} of {expected} trials)")]
    IncompleteSample { expected: usize, actual: usize },

    #[error("session configured with zero trials")]
    NoTrialsConfigured,

    #[error("stimulus delay window is empty (min {min_ms} ms >= max {max_ms} ms)")]
    EmptyDelayWindow { min_ms: u64, max_ms: u64 },
}
