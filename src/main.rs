mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    time::{Duration, SystemTime},
};

use reflx::{
    config::{Config, ConfigStore, FileConfigStore},
    delay::UniformDelay,
    error::EngineError,
    metrics::Metrics,
    report::{SessionLog, SessionRecord},
    runtime::{AppEvent, CrosstermEventSource, Runner},
    session::{SessionConfig, TrialState},
    submit::{CommandSubmitter, MetricsPayload, ScoreReport, SubmitError, Submitter},
    trial::{ResponseOutcome, TrialRun},
    TICK_RATE_MS,
};

const PREMATURE_NOTICE_MS: u64 = 1500;

/// terminal reaction-time assessment
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal reaction-time assessment: timed stimulus/response trials reduced into behavioral metrics and handed to a configurable scoring collaborator."
)]
pub struct Cli {
    /// identifier of the subject being assessed
    #[clap(short = 'i', long, default_value = "anonymous")]
    subject: String,

    /// number of reaction trials per session
    #[clap(short = 't', long)]
    trials: Option<usize>,

    /// lower bound of the random stimulus delay (milliseconds, inclusive)
    #[clap(long)]
    min_delay_ms: Option<u64>,

    /// upper bound of the random stimulus delay (milliseconds, exclusive)
    #[clap(long)]
    max_delay_ms: Option<u64>,

    /// shell command the payload is piped to; must print a score report as JSON
    #[clap(long)]
    submit_cmd: Option<String>,
}

impl Cli {
    /// CLI flags win over the config file.
    fn merge_over(&self, cfg: &Config) -> Config {
        Config {
            total_trials: self.trials.unwrap_or(cfg.total_trials),
            min_delay_ms: self.min_delay_ms.unwrap_or(cfg.min_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(cfg.max_delay_ms),
            submit_command: self.submit_cmd.clone().or_else(|| cfg.submit_command.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Task,
    Results,
}

pub struct App {
    pub trial: TrialRun,
    pub state: AppState,
    pub metrics: Option<Metrics>,
    pub payload: Option<MetricsPayload>,
    pub submission: Option<Result<ScoreReport, SubmitError>>,
    submitter: Option<CommandSubmitter>,
    log: SessionLog,
    premature_at: Option<SystemTime>,
}

impl App {
    pub fn new(cfg: &Config, subject: String) -> Result<Self, Box<dyn Error>> {
        let session = SessionConfig {
            subject_id: subject,
            total_trials: cfg.total_trials,
            min_delay_ms: cfg.min_delay_ms,
            max_delay_ms: cfg.max_delay_ms,
        };
        let delay = UniformDelay::new(session.min_delay_ms, session.max_delay_ms);
        let trial = TrialRun::new(session, Box::new(delay))?;

        Ok(Self {
            trial,
            state: AppState::Task,
            metrics: None,
            payload: None,
            submission: None,
            submitter: cfg.submit_command.as_deref().map(CommandSubmitter::new),
            log: SessionLog::new(),
            premature_at: None,
        })
    }

    pub fn premature_notice_visible(&self) -> bool {
        self.premature_at
            .and_then(|at| SystemTime::now().duration_since(at).ok())
            .map(|elapsed| elapsed < Duration::from_millis(PREMATURE_NOTICE_MS))
            .unwrap_or(false)
    }

    fn on_tap(&mut self, now: SystemTime) {
        match self.trial.on_response(now) {
            ResponseOutcome::Premature => self.premature_at = Some(now),
            ResponseOutcome::Recorded(_) => self.premature_at = None,
            ResponseOutcome::Completed(_) => {
                self.premature_at = None;
                self.finish();
            }
            ResponseOutcome::Ignored => {}
        }
    }

    fn finish(&mut self) {
        let Ok(metrics) = self.trial.metrics() else {
            return;
        };
        let payload = MetricsPayload::new(self.trial.config().subject_id.clone(), &metrics);

        self.submission = self.submitter.as_ref().map(|s| s.submit(&payload));
        let score = match &self.submission {
            Some(Ok(report)) => Some(report.objective_result.score),
            _ => None,
        };

        let record = SessionRecord::from_metrics(
            self.trial.config().subject_id.clone(),
            self.trial.config().total_trials,
            self.trial.premature_count(),
            &metrics,
            score,
        );
        // history log is best effort, never blocks the results screen
        let _ = self.log.append(&record);

        self.metrics = Some(metrics);
        self.payload = Some(payload);
        self.state = AppState::Results;
    }

    /// Resend the completed payload without rerunning the trials.
    fn resubmit(&mut self) {
        if let (Some(submitter), Some(payload)) = (self.submitter.as_ref(), self.payload.as_ref()) {
            self.submission = Some(submitter.submit(payload));
        }
    }

    fn restart(&mut self, now: SystemTime) {
        // legal restart: the previous run is Finished
        if self.trial.start(now).is_ok() {
            self.metrics = None;
            self.payload = None;
            self.submission = None;
            self.premature_at = None;
            self.state = AppState::Task;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let cfg = cli.merge_over(&FileConfigStore::new().load());
    let mut app = App::new(&cfg, cli.subject.clone())?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        Duration::from_millis(TICK_RATE_MS),
    );

    let result = loop {
        if let Err(err) = terminal.draw(|f| draw(app, f)) {
            break Err(err.into());
        }

        match runner.pump(&mut app.trial) {
            AppEvent::Tick | AppEvent::Resize => {}
            AppEvent::Key(key) => match handle_key(app, key) {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(err) => break Err(err.into()),
            },
        }
    };

    // pending stimulus deadlines must not outlive the screen
    app.trial.cancel();
    result
}

/// Returns Ok(false) when the app should exit. Engine contract violations
/// propagate instead of being dropped on the floor.
fn handle_key(app: &mut App, key: KeyEvent) -> Result<bool, EngineError> {
    if key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
    {
        return Ok(false);
    }

    let now = SystemTime::now();
    match app.state {
        AppState::Task => match key.code {
            KeyCode::Char(' ') | KeyCode::Enter if !app.trial.has_finished() => {
                if app.trial.state() == TrialState::Idle {
                    app.trial.start(now)?;
                } else {
                    app.on_tap(now);
                }
            }
            _ => {}
        },
        AppState::Results => match key.code {
            KeyCode::Char('r') => app.restart(now),
            KeyCode::Char('s') => app.resubmit(),
            _ => {}
        },
    }
    Ok(true)
}

fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
