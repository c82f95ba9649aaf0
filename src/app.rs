use anyhow::{anyhow, Context, Result};
use percex_core::{ExperimentError, Presenter, RecordStore, Screen, StoreError};
use percex_experiment::{
    CmErrorGrader, Command, ExperimentBuilder, ExperimentController, ExperimentState,
    RandomTrialGenerator, RngSource,
};
use percex_render::{BarChartRenderer, ChartLayout};
use percex_store::{write_csv_file, FileBackend, TrialStore};
use percex_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::config::{AppConfig, DisplayConfig};
use crate::frontend::WindowFrontend;

const BACKGROUND: [u8; 4] = [255, 255, 255, 255];
const MAX_INPUT: usize = 64;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    experiment: ExperimentController<HighPrecisionTimer, ThreadRng>,
    frontend: WindowFrontend,
    display: DisplayConfig,
    data_dir: PathBuf,
    input: String,
    current_size: Option<PhysicalSize<u32>>,
    should_exit: bool,
}

impl App {
    pub fn new(config: AppConfig, store: TrialStore<FileBackend>, participant: Option<String>) -> Result<Self> {
        let AppConfig {
            experiment: experiment_config,
            display,
            storage,
            ..
        } = config;

        let generator =
            RandomTrialGenerator::from_config(RngSource(rand::rng()), &experiment_config);
        let experiment = ExperimentBuilder::new(experiment_config, HighPrecisionTimer::new(), rand::rng())
            .generator(generator)
            .grader(CmErrorGrader)
            .store(store)
            .build()?;

        let chart = BarChartRenderer::new(ChartLayout::default(), display.chart_scale, rand::rng())?;

        Ok(Self {
            window: None,
            pixels: None,
            experiment,
            frontend: WindowFrontend::new(chart),
            display,
            data_dir: storage.data_dir,
            input: participant.unwrap_or_default(),
            current_size: None,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "type a participant ID and press Enter to start, Escape to exit"
        );
        event_loop.run_app(&mut self).map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut attributes = Window::default_attributes()
            .with_title(self.frontend.title(&self.input))
            .with_resizable(true);
        if self.display.fullscreen {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next())
                .ok_or_else(|| anyhow!("No monitor available"))?;
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(monitor))));
        } else {
            attributes = attributes.with_inner_size(LogicalSize::new(
                self.display.window_width,
                self.display.window_height,
            ));
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(
            width = size.width,
            height = size.height,
            scale_factor = window.scale_factor(),
            "window created"
        );

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(
            Pixels::new(size.width, size.height, surface_texture)
                .context("failed to create pixel surface")?,
        );
        self.current_size = Some(size);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(size)) = (self.pixels.as_mut(), self.current_size) else {
            return Ok(());
        };
        let started = self.experiment.timer_mut().now();

        let frame = pixels.frame_mut();
        for px in frame.chunks_exact_mut(4) {
            px.copy_from_slice(&BACKGROUND);
        }
        if self.frontend.screen() == Screen::Trial {
            self.frontend
                .chart()
                .copy_into(frame, size.width, size.height);
        }
        pixels.render().context("failed to present frame")?;

        let timer = self.experiment.timer_mut();
        let elapsed = timer.elapsed(started);
        timer.record_frame(elapsed);
        Ok(())
    }

    /// Pushes text regions to the title and schedules a repaint if the chart changed.
    fn refresh(&mut self) {
        if self.frontend.take_response_cleared() {
            self.input.clear();
        }
        if let Some(window) = &self.window {
            window.set_title(&self.frontend.title(&self.input));
            if self.frontend.take_dirty() {
                window.request_redraw();
            }
        }
    }

    fn dispatch(&mut self, command: Command) {
        debug!(?command, "dispatch");
        match self.experiment.dispatch(command, &mut self.frontend) {
            Ok(Screen::End) => self.save_export(),
            Ok(_) => {}
            Err(e) if e.is_recoverable() => debug!(error = %e, "input rejected"),
            Err(ExperimentError::Store(e)) => warn!(error = %e, "response not saved"),
            Err(e) => {
                error!(error = %e, "trial step failed");
                self.frontend
                    .write_error("Something went wrong. Press Enter to try again.");
            }
        }
    }

    fn save_export(&mut self) {
        if self.frontend.take_export().is_none() {
            return;
        }
        let at = self.experiment.timer_mut().wall_clock();
        export_session(self.experiment.store(), &self.data_dir, at);
    }

    fn on_enter(&mut self) {
        let command = enter_command(self.experiment.state(), &self.input);
        self.dispatch(command);
    }

    fn handle_key(&mut self, event: &KeyEvent, event_loop: &ActiveEventLoop) {
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => self.cleanup_and_exit(event_loop),
            Key::Named(NamedKey::Enter) => self.on_enter(),
            Key::Named(NamedKey::Backspace) => {
                self.input.pop();
            }
            _ => {
                if self.experiment.screen() == Screen::End {
                    return;
                }
                if let Some(text) = &event.text {
                    for c in text.chars().filter(|c| !c.is_control()) {
                        if self.input.chars().count() < MAX_INPUT {
                            self.input.push(c);
                        }
                    }
                }
            }
        }
        self.refresh();
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!(error = %e, "failed to resize buffer");
            }
        }
        debug!(width = new_size.width, height = new_size.height, "display resized");
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        let stats = self.experiment.timer_mut().frame_stats();
        info!(
            frames = stats.samples,
            avg_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            "frame timing"
        );
        info!(
            records = self.experiment.store().get_all().len(),
            "session closed"
        );
        self.should_exit = true;
        event_loop.exit();
    }
}

/// What Enter means on the current screen.
///
/// The intro always starts afresh with the typed ID, even after a failed start.
/// On a trial with nothing drawn, Enter retries the slot instead of submitting.
fn enter_command(state: &ExperimentState, input: &str) -> Command {
    match state.screen {
        Screen::End => Command::Reset,
        Screen::Intro => Command::Start {
            participant_id: input.to_string(),
        },
        Screen::Trial if state.current_trial.is_none() => Command::Resume,
        Screen::Trial => Command::Submit {
            response: input.to_string(),
        },
    }
}

/// Writes every stored record to a timestamped CSV in `dir`.
fn export_session(store: &dyn RecordStore, dir: &Path, at: OffsetDateTime) -> Option<PathBuf> {
    match write_csv_file(store, None, dir, at) {
        Ok(path) => Some(path),
        Err(StoreError::NoData) => None,
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "failed to write CSV export");
            None
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(error = %e, "render failed");
                    event_loop.exit();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_key(&event, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.handle_resize(size);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percex_core::{Condition, Encoding, Grader, TrialData, TrialRecord};
    use percex_store::MemoryBackend;

    fn unique_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "percex_app_test_{}_{}",
            name,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        p
    }

    fn trial_state(screen: Screen) -> ExperimentState {
        ExperimentState {
            participant_id: Some("P001".into()),
            screen,
            ..ExperimentState::default()
        }
    }

    #[test]
    fn enter_on_intro_starts_with_typed_id_after_failed_start() {
        // A start whose first trial failed leaves the old ID behind on the intro.
        let state = trial_state(Screen::Intro);
        assert_eq!(
            enter_command(&state, "P002"),
            Command::Start {
                participant_id: "P002".into()
            }
        );
        assert_eq!(
            enter_command(&ExperimentState::default(), "P003"),
            Command::Start {
                participant_id: "P003".into()
            }
        );
    }

    #[test]
    fn enter_on_trial_submits_or_retries() {
        let mut state = trial_state(Screen::Trial);
        assert_eq!(enter_command(&state, "50"), Command::Resume);

        state.current_trial = Some(TrialData::from_values(vec![10, 50, 60]).unwrap());
        assert_eq!(
            enter_command(&state, "50%"),
            Command::Submit {
                response: "50%".into()
            }
        );
        assert_eq!(enter_command(&trial_state(Screen::End), "x"), Command::Reset);
    }

    #[test]
    fn export_session_writes_all_records() {
        let dir = unique_dir("export");
        let at = OffsetDateTime::UNIX_EPOCH;
        let mut store = TrialStore::new(MemoryBackend::new());
        assert_eq!(export_session(&store, &dir, at), None);
        assert!(!dir.exists());

        let condition = Condition::new("bw", "Bar Chart (B&W)", "", Encoding::Bw);
        let trial = TrialData::from_values(vec![10, 50, 60, 5, 80]).unwrap();
        let grade = CmErrorGrader.score(&trial, 80.0);
        let record = TrialRecord::assemble(
            "P001",
            1,
            &condition,
            &trial,
            80.0,
            grade,
            1200,
            "2026-10-16T09:30:01.200Z".into(),
        );
        store.save(&record).unwrap();

        let path = export_session(&store, &dir, at).unwrap();
        assert_eq!(path, dir.join("experiment_all_1970-01-01T00-00-00.csv"));
        let csv = std::fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("participantId,trialNumber,"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
