use super::config::ExperimentConfig;
use super::queue::build_trial_queue;
use super::summary::{ConditionSummary, summarize};
use percex_core::{
    Condition, ExperimentError, Frontend, Grader, RecordStore, Screen, TrialData, TrialGenerator,
    TrialQueueEntry, TrialRecord, ValidationError,
};
use percex_timing::{Timer, iso_timestamp};
use rand::Rng;
use tracing::{debug, error, info, warn};

/// Commands a front end dispatches into a session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start { participant_id: String },
    Submit { response: String },
    /// Re-enter the current queue slot after a failed trial step
    Resume,
    Reset,
}

/// Everything a running session tracks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentState {
    pub participant_id: Option<String>,
    pub trial_queue: Vec<TrialQueueEntry>,
    pub current_index: usize,
    pub current_trial: Option<TrialData>,
    pub current_condition: Option<Condition>,
    pub results: Vec<TrialRecord>,
    pub start_time: Option<u64>,
    pub screen: Screen,
}

pub struct ExperimentController<T, R>
where
    T: Timer,
    R: Rng,
{
    config: ExperimentConfig,
    generator: Box<dyn TrialGenerator>,
    grader: Box<dyn Grader>,
    store: Box<dyn RecordStore>,
    timer: T,
    rng: R,
    state: ExperimentState,
}

/// Collects collaborators and refuses to build a session with any missing
pub struct ExperimentBuilder<T, R>
where
    T: Timer,
    R: Rng,
{
    config: ExperimentConfig,
    timer: T,
    rng: R,
    generator: Option<Box<dyn TrialGenerator>>,
    grader: Option<Box<dyn Grader>>,
    store: Option<Box<dyn RecordStore>>,
}

impl<T, R> ExperimentBuilder<T, R>
where
    T: Timer,
    R: Rng,
{
    pub fn new(config: ExperimentConfig, timer: T, rng: R) -> Self {
        Self {
            config,
            timer,
            rng,
            generator: None,
            grader: None,
            store: None,
        }
    }

    pub fn generator(mut self, generator: impl TrialGenerator + 'static) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    pub fn grader(mut self, grader: impl Grader + 'static) -> Self {
        self.grader = Some(Box::new(grader));
        self
    }

    pub fn store(mut self, store: impl RecordStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn build(self) -> Result<ExperimentController<T, R>, ExperimentError> {
        let generator = self
            .generator
            .ok_or(ExperimentError::MissingCollaborator("generator"))?;
        let grader = self
            .grader
            .ok_or(ExperimentError::MissingCollaborator("grader"))?;
        let store = self
            .store
            .ok_or(ExperimentError::MissingCollaborator("store"))?;
        self.config.validate()?;

        info!(
            conditions = self.config.conditions.len(),
            trials_per_condition = self.config.trials_per_condition,
            points_per_trial = self.config.points_per_trial,
            "experiment ready"
        );

        Ok(ExperimentController {
            config: self.config,
            generator,
            grader,
            store,
            timer: self.timer,
            rng: self.rng,
            state: ExperimentState::default(),
        })
    }
}

impl<T, R> ExperimentController<T, R>
where
    T: Timer,
    R: Rng,
{
    /// Applies one command and returns the screen the session ends up on.
    pub fn dispatch<F>(&mut self, command: Command, ui: &mut F) -> Result<Screen, ExperimentError>
    where
        F: Frontend + ?Sized,
    {
        match command {
            Command::Start { participant_id } => self.start(&participant_id, ui),
            Command::Submit { response } => self.submit(&response, ui),
            Command::Resume => self.resume(ui),
            Command::Reset => {
                self.reset(ui);
                Ok(Screen::Intro)
            }
        }
    }

    pub fn start<F>(&mut self, participant_id: &str, ui: &mut F) -> Result<Screen, ExperimentError>
    where
        F: Frontend + ?Sized,
    {
        let pid = participant_id.trim();
        if pid.is_empty() {
            return Err(self.reject(ValidationError::EmptyParticipantId, ui));
        }

        let trial_queue = build_trial_queue(
            &self.config.conditions,
            self.config.trials_per_condition,
            &mut self.rng,
        );
        info!(
            participant = pid,
            total_trials = trial_queue.len(),
            "starting experiment"
        );
        self.state = ExperimentState {
            participant_id: Some(pid.to_string()),
            trial_queue,
            ..ExperimentState::default()
        };

        self.advance(ui)
    }

    /// Records a response for the trial on screen and moves to the next one
    pub fn submit<F>(&mut self, raw_response: &str, ui: &mut F) -> Result<Screen, ExperimentError>
    where
        F: Frontend + ?Sized,
    {
        let screen = self.state.screen;
        if !screen.accepts_response() {
            return Err(ExperimentError::InvalidState(screen));
        }
        let (Some(participant_id), Some(trial), Some(condition)) = (
            self.state.participant_id.as_deref(),
            self.state.current_trial.as_ref(),
            self.state.current_condition.as_ref(),
        ) else {
            return Err(ExperimentError::InvalidState(screen));
        };

        let response = match parse_response(raw_response) {
            Ok(response) => response,
            Err(e) => {
                debug!(input = raw_response, "response rejected");
                ui.write_error(&e.to_string());
                return Err(e.into());
            }
        };

        let reaction_time_ms = self
            .state
            .start_time
            .map_or(0, |start| self.timer.elapsed(start).as_millis() as u64);
        let grade = self.grader.score(trial, response);
        let record = TrialRecord::assemble(
            participant_id,
            self.state.current_index + 1,
            condition,
            trial,
            response,
            grade,
            reaction_time_ms,
            iso_timestamp(self.timer.wall_clock()),
        );

        if let Err(e) = self.store.save(&record) {
            error!(error = %e, trial = record.trial_number, "failed to persist trial record");
            ui.write_error("Could not save your response. Please submit again.");
            return Err(e.into());
        }

        info!(
            trial = record.trial_number,
            condition = %record.condition_id,
            true_percentage = record.true_percentage,
            response = record.response,
            log2_error = record.log2_error,
            reaction_time_ms = record.reaction_time_ms,
            "response recorded"
        );
        self.state.results.push(record);
        self.state.current_index += 1;

        self.advance(ui)
    }

    /// Clears the session and returns to the intro screen
    pub fn reset<F>(&mut self, ui: &mut F)
    where
        F: Frontend + ?Sized,
    {
        self.state = ExperimentState::default();
        ui.clear();
        ui.clear_response();
        ui.write_error("");
        ui.show_screen(Screen::Intro);
        info!("state reset, ready for next participant");
    }

    fn resume<F>(&mut self, ui: &mut F) -> Result<Screen, ExperimentError>
    where
        F: Frontend + ?Sized,
    {
        if self.state.participant_id.is_none() || self.state.screen.is_end() {
            return Err(ExperimentError::InvalidState(self.state.screen));
        }
        if self.state.current_trial.is_some() {
            return Ok(self.state.screen);
        }
        self.advance(ui)
    }

    /// Presents the trial at the queue pointer, or finishes when the queue is used up.
    fn advance<F>(&mut self, ui: &mut F) -> Result<Screen, ExperimentError>
    where
        F: Frontend + ?Sized,
    {
        let total = self.state.trial_queue.len();
        let index = self.state.current_index;
        if index >= total {
            return Ok(self.finish(ui));
        }

        self.state.current_trial = None;
        self.state.current_condition = None;
        self.state.start_time = None;

        let entry = &self.state.trial_queue[index];
        let condition = self
            .config
            .condition(&entry.condition_id)
            .cloned()
            .ok_or_else(|| ExperimentError::UnknownCondition(entry.condition_id.clone()))?;

        let trial = self
            .generator
            .generate(self.config.points_per_trial)
            .inspect_err(|e| error!(error = %e, trial = index + 1, "trial generation failed"))?;

        ui.clear();
        ui.render(&condition, &trial)
            .inspect_err(|e| error!(error = %e, condition = %condition.id, "render failed"))?;
        ui.write_label(&condition.label);
        ui.write_counter(&format!("Trial {} of {}", index + 1, total));
        ui.clear_response();
        ui.write_error("");

        debug!(
            trial = index + 1,
            condition = %condition.id,
            values = ?trial.values(),
            true_percentage = trial.true_percentage(),
            "trial presented"
        );

        self.state.current_trial = Some(trial);
        self.state.current_condition = Some(condition);
        self.state.start_time = Some(self.timer.now());
        self.state.screen = Screen::Trial;
        ui.show_screen(Screen::Trial);
        Ok(Screen::Trial)
    }

    fn finish<F>(&mut self, ui: &mut F) -> Screen
    where
        F: Frontend + ?Sized,
    {
        info!(records = self.state.results.len(), "experiment complete");

        match self.store.export_csv(None) {
            Ok(csv) => ui.write_export(&csv),
            Err(e) => {
                warn!(error = %e, "CSV export failed");
                ui.write_export("");
            }
        }
        for row in self.summary() {
            info!("{row}");
        }

        self.state.current_trial = None;
        self.state.current_condition = None;
        self.state.start_time = None;
        self.state.screen = Screen::End;
        ui.clear();
        ui.show_screen(Screen::End);
        Screen::End
    }

    fn reject<F>(&self, e: ValidationError, ui: &mut F) -> ExperimentError
    where
        F: Frontend + ?Sized,
    {
        debug!(error = %e, "input rejected");
        ui.write_error(&e.to_string());
        e.into()
    }

    pub fn summary(&self) -> Vec<ConditionSummary> {
        summarize(&self.config.conditions, &self.state.results)
    }

    pub fn state(&self) -> &ExperimentState {
        &self.state
    }

    pub fn results(&self) -> Vec<TrialRecord> {
        self.state.results.clone()
    }

    pub fn screen(&self) -> Screen {
        self.state.screen
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn RecordStore {
        self.store.as_mut()
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// 1-based position of the trial on screen and the session length
    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        if self.state.screen.accepts_response() {
            Some((self.state.current_index + 1, self.state.trial_queue.len()))
        } else {
            None
        }
    }
}

/// The leading number of the trimmed text, which must be finite and in [0, 100].
/// Anything after the number is ignored, so `50%` reads as 50.
pub fn parse_response(raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    let value = leading_number(trimmed)
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::NotANumber(trimmed.to_string()))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::OutOfRange(value));
    }
    Ok(value)
}

/// Longest `[+-]digits[.digits][e[+-]digits]` prefix, needing at least one mantissa digit.
fn leading_number(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        start
            + bytes[start.min(bytes.len())..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if mantissa_digits > 0 || frac_end > end + 1 {
            mantissa_digits += frac_end - (end + 1);
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_start = end + 1 + sign;
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    text[..end].parse().ok()
}
