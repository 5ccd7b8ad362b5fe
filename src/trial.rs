use std::time::{Duration, SystemTime};

use crate::delay::DelaySource;
use crate::error::EngineError;
use crate::metrics::{self, Metrics};
use crate::session::{SessionConfig, TrialState};

/// What a single tap did to the session. The rendering layer observes these
/// transitions; it never mutates the run itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Tap landed before the stimulus; counted, never timed.
    Premature,
    /// Valid tap, latency recorded, more trials remain.
    Recorded(u64),
    /// Valid tap that completed the final trial.
    Completed(u64),
    /// Tap outside a running session, deliberately dropped.
    Ignored,
}

/// One reaction-task run for one subject.
///
/// The stimulus "timer" is a single armed deadline polled by `on_tick`; the
/// caller supplies `now` on every operation, so the run has no clock of its
/// own and is fully deterministic under test. Re-arming overwrites the
/// deadline, which cancels the previous one-shot: at most one deadline is
/// ever live, so a replaced deadline can never fire late.
pub struct TrialRun {
    config: SessionConfig,
    delay: Box<dyn DelaySource + Send>,
    state: TrialState,
    current_trial: usize,
    latencies_ms: Vec<u64>,
    premature_count: u32,
    deadline: Option<SystemTime>,
    stimulus_onset: Option<SystemTime>,
}

impl TrialRun {
    pub fn new(
        config: SessionConfig,
        delay: Box<dyn DelaySource + Send>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            delay,
            state: TrialState::Idle,
            current_trial: 0,
            latencies_ms: Vec::new(),
            premature_count: 0,
            deadline: None,
            stimulus_onset: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    /// 1-based index of the trial in progress; 0 before `start`.
    pub fn current_trial(&self) -> usize {
        self.current_trial
    }

    pub fn latencies_ms(&self) -> &[u64] {
        &self.latencies_ms
    }

    pub fn premature_count(&self) -> u32 {
        self.premature_count
    }

    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    pub fn stimulus_onset(&self) -> Option<SystemTime> {
        self.stimulus_onset
    }

    pub fn has_finished(&self) -> bool {
        self.state == TrialState::Finished
    }

    /// Begin (or restart) the run. Only legal from `Idle` or `Finished`;
    /// a restart while a trial is in flight is caller misuse.
    pub fn start(&mut self, now: SystemTime) -> Result<(), EngineError> {
        match self.state {
            TrialState::Idle | TrialState::Finished => {
                self.latencies_ms.clear();
                self.premature_count = 0;
                self.current_trial = 1;
                self.arm_stimulus(now);
                Ok(())
            }
            TrialState::Waiting | TrialState::Active => Err(EngineError::RestartMidSession),
        }
    }

    /// Fires the stimulus once the armed deadline has passed. Returns true
    /// on the tick that flips `Waiting` to `Active`. Onset is the time the
    /// poll observed the deadline, not the scheduled instant.
    pub fn on_tick(&mut self, now: SystemTime) -> bool {
        if self.state != TrialState::Waiting {
            return false;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.stimulus_onset = Some(now);
                self.state = TrialState::Active;
                true
            }
            _ => false,
        }
    }

    pub fn on_response(&mut self, now: SystemTime) -> ResponseOutcome {
        match self.state {
            TrialState::Waiting => {
                self.premature_count += 1;
                self.arm_stimulus(now);
                ResponseOutcome::Premature
            }
            TrialState::Active => {
                let latency = self
                    .stimulus_onset
                    .and_then(|onset| now.duration_since(onset).ok())
                    .unwrap_or(Duration::ZERO)
                    .as_millis() as u64;
                self.latencies_ms.push(latency);
                self.stimulus_onset = None;

                if self.latencies_ms.len() == self.config.total_trials {
                    self.state = TrialState::Finished;
                    ResponseOutcome::Completed(latency)
                } else {
                    self.current_trial += 1;
                    self.arm_stimulus(now);
                    ResponseOutcome::Recorded(latency)
                }
            }
            TrialState::Idle | TrialState::Finished => ResponseOutcome::Ignored,
        }
    }

    /// Unconditional teardown: drops any armed deadline or visible stimulus
    /// and returns an unfinished run to `Idle`. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.stimulus_onset = None;
        if matches!(self.state, TrialState::Waiting | TrialState::Active) {
            self.state = TrialState::Idle;
        }
    }

    /// Reduce the completed sample. Errs until the run is `Finished`.
    pub fn metrics(&self) -> Result<Metrics, EngineError> {
        metrics::reduce(
            &self.latencies_ms,
            self.premature_count,
            self.config.total_trials,
        )
    }

    fn arm_stimulus(&mut self, now: SystemTime) {
        self.stimulus_onset = None;
        self.deadline = Some(now + self.delay.next_delay());
        self.state = TrialState::Waiting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::{FixedDelay, ScriptedDelay};
    use assert_matches::assert_matches;

    fn at(ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(ms)
    }

    fn run_with_delays(total_trials: usize, delays: &[u64]) -> TrialRun {
        let config = SessionConfig {
            total_trials,
            ..SessionConfig::new("test-subject")
        };
        TrialRun::new(config, Box::new(ScriptedDelay::from_millis(delays))).unwrap()
    }

    #[test]
    fn new_run_is_idle_and_empty() {
        let run = run_with_delays(5, &[100]);
        assert_eq!(run.state(), TrialState::Idle);
        assert_eq!(run.current_trial(), 0);
        assert!(run.latencies_ms().is_empty());
        assert_eq!(run.premature_count(), 0);
        assert!(run.deadline().is_none());
        assert!(run.stimulus_onset().is_none());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = SessionConfig {
            total_trials: 0,
            ..SessionConfig::new("s")
        };
        let err = TrialRun::new(config, Box::new(FixedDelay(Duration::from_millis(1))))
            .err()
            .unwrap();
        assert_eq!(err, EngineError::NoTrialsConfigured);
    }

    #[test]
    fn start_arms_the_first_stimulus() {
        let mut run = run_with_delays(5, &[100]);
        run.start(at(0)).unwrap();
        assert_eq!(run.state(), TrialState::Waiting);
        assert_eq!(run.current_trial(), 1);
        assert_eq!(run.deadline(), Some(at(100)));
        assert!(run.stimulus_onset().is_none());
    }

    #[test]
    fn tick_before_deadline_does_nothing() {
        let mut run = run_with_delays(5, &[100]);
        run.start(at(0)).unwrap();
        assert!(!run.on_tick(at(99)));
        assert_eq!(run.state(), TrialState::Waiting);
    }

    #[test]
    fn tick_at_deadline_fires_stimulus_and_records_onset() {
        let mut run = run_with_delays(5, &[100]);
        run.start(at(0)).unwrap();
        // onset is the observation time, which may lag the deadline
        assert!(run.on_tick(at(130)));
        assert_eq!(run.state(), TrialState::Active);
        assert_eq!(run.stimulus_onset(), Some(at(130)));
        assert!(run.deadline().is_none());
    }

    #[test]
    fn valid_response_records_latency_and_rearms() {
        let mut run = run_with_delays(5, &[100, 200]);
        run.start(at(0)).unwrap();
        run.on_tick(at(100));
        assert_matches!(run.on_response(at(345)), ResponseOutcome::Recorded(245));
        assert_eq!(run.latencies_ms(), &[245]);
        assert_eq!(run.current_trial(), 2);
        assert_eq!(run.state(), TrialState::Waiting);
        assert_eq!(run.deadline(), Some(at(545)));
    }

    #[test]
    fn premature_tap_counts_and_rearms_without_timing() {
        let mut run = run_with_delays(5, &[100, 300]);
        run.start(at(0)).unwrap();
        assert_matches!(run.on_response(at(50)), ResponseOutcome::Premature);
        assert_eq!(run.premature_count(), 1);
        assert!(run.latencies_ms().is_empty());
        assert_eq!(run.state(), TrialState::Waiting);
        // fresh draw measured from the tap
        assert_eq!(run.deadline(), Some(at(350)));
    }

    #[test]
    fn replaced_deadline_never_fires() {
        let mut run = run_with_delays(5, &[100, 300]);
        run.start(at(0)).unwrap();
        run.on_response(at(50)); // premature, re-arm at 350
        // the original 100 ms deadline has passed but was replaced
        assert!(!run.on_tick(at(150)));
        assert_eq!(run.state(), TrialState::Waiting);
        assert!(run.on_tick(at(350)));
    }

    #[test]
    fn in_window_tap_never_touches_premature_count() {
        let mut run = run_with_delays(5, &[100]);
        run.start(at(0)).unwrap();
        run.on_tick(at(100));
        run.on_response(at(400));
        assert_eq!(run.premature_count(), 0);
    }

    #[test]
    fn final_response_finishes_the_run() {
        let mut run = run_with_delays(1, &[100]);
        run.start(at(0)).unwrap();
        run.on_tick(at(100));
        assert_matches!(run.on_response(at(512)), ResponseOutcome::Completed(412));
        assert_eq!(run.state(), TrialState::Finished);
        assert!(run.has_finished());
        assert!(run.deadline().is_none());
        assert!(run.stimulus_onset().is_none());
        assert_eq!(run.latencies_ms().len(), run.config().total_trials);
    }

    #[test]
    fn responses_are_ignored_when_idle_or_finished() {
        let mut run = run_with_delays(1, &[100]);
        assert_matches!(run.on_response(at(10)), ResponseOutcome::Ignored);

        run.start(at(0)).unwrap();
        run.on_tick(at(100));
        run.on_response(at(200));
        assert!(run.has_finished());
        let count = run.premature_count();
        assert_matches!(run.on_response(at(300)), ResponseOutcome::Ignored);
        assert_eq!(run.premature_count(), count);
        assert_eq!(run.latencies_ms().len(), 1);
    }

    #[test]
    fn restart_mid_session_is_rejected() {
        let mut run = run_with_delays(5, &[100]);
        run.start(at(0)).unwrap();
        assert_eq!(run.start(at(10)), Err(EngineError::RestartMidSession));

        run.on_tick(at(100));
        assert_eq!(run.start(at(110)), Err(EngineError::RestartMidSession));
    }

    #[test]
    fn restart_from_finished_resets_the_sample() {
        let mut run = run_with_delays(1, &[100]);
        run.start(at(0)).unwrap();
        run.on_response(at(50)); // premature
        run.on_tick(at(350));
        run.on_response(at(500));
        assert!(run.has_finished());

        run.start(at(1000)).unwrap();
        assert_eq!(run.state(), TrialState::Waiting);
        assert_eq!(run.current_trial(), 1);
        assert!(run.latencies_ms().is_empty());
        assert_eq!(run.premature_count(), 0);
    }

    #[test]
    fn cancel_is_idempotent_and_returns_to_idle() {
        let mut run = run_with_delays(5, &[100]);
        run.start(at(0)).unwrap();
        run.cancel();
        assert_eq!(run.state(), TrialState::Idle);
        assert!(run.deadline().is_none());

        run.cancel();
        assert_eq!(run.state(), TrialState::Idle);
        assert_eq!(run.premature_count(), 0);

        // cancelled deadline must not fire
        assert!(!run.on_tick(at(500)));
    }

    #[test]
    fn cancel_preserves_a_finished_run() {
        let mut run = run_with_delays(1, &[100]);
        run.start(at(0)).unwrap();
        run.on_tick(at(100));
        run.on_response(at(300));
        run.cancel();
        assert_eq!(run.state(), TrialState::Finished);
        assert_eq!(run.latencies_ms(), &[200]);
    }

    #[test]
    fn metrics_err_until_finished() {
        let mut run = run_with_delays(2, &[100, 100]);
        assert_matches!(run.metrics(), Err(EngineError::IncompleteSample { .. }));

        run.start(at(0)).unwrap();
        run.on_tick(at(100));
        run.on_response(at(400));
        assert_matches!(run.metrics(), Err(EngineError::IncompleteSample { .. }));

        run.on_tick(at(500));
        run.on_response(at(800));
        let m = run.metrics().unwrap();
        assert_eq!(m.mean_latency_ms, 300.0);
        assert_eq!(m.latency_std_dev_ms, 0.0);
    }

    #[test]
    fn full_session_sample_matches_trial_count() {
        let mut run = run_with_delays(5, &[100]);
        run.start(at(0)).unwrap();
        let mut now = 0;
        while !run.has_finished() {
            now += 100;
            run.on_tick(at(now));
            now += 250;
            run.on_response(at(now));
        }
        assert_eq!(run.latencies_ms().len(), 5);
        assert!(run.latencies_ms().iter().all(|ms| *ms == 250));
    }
}
