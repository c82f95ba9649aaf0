use percex_core::{Condition, Presenter, RenderError, Screen, TrialData, Visualization};
use percex_render::BarChartRenderer;
use rand::rngs::ThreadRng;

const APP_NAME: &str = "Graphical Perception";
const PROMPT: &str = "What percentage is the smaller marked bar of the larger?";

/// Window-side regions the controller writes to. Text goes to the window
/// title; the chart is copied into the pixel frame on redraw.
pub struct WindowFrontend {
    chart: BarChartRenderer<ThreadRng>,
    screen: Screen,
    label: String,
    counter: String,
    error: String,
    response_cleared: bool,
    export: Option<String>,
    dirty: bool,
}

impl WindowFrontend {
    pub fn new(chart: BarChartRenderer<ThreadRng>) -> Self {
        Self {
            chart,
            screen: Screen::Intro,
            label: String::new(),
            counter: String::new(),
            error: String::new(),
            response_cleared: false,
            export: None,
            dirty: true,
        }
    }

    pub fn chart(&self) -> &BarChartRenderer<ThreadRng> {
        &self.chart
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// True once after the controller asked for the response field to be emptied.
    pub fn take_response_cleared(&mut self) -> bool {
        std::mem::take(&mut self.response_cleared)
    }

    pub fn take_export(&mut self) -> Option<String> {
        self.export.take()
    }

    /// Whether the frame needs repainting since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn title(&self, input: &str) -> String {
        compose_title(
            self.screen,
            &self.label,
            &self.counter,
            &self.error,
            input,
        )
    }
}

pub fn compose_title(screen: Screen, label: &str, counter: &str, error: &str, input: &str) -> String {
    let mut parts: Vec<String> = match screen {
        Screen::Intro => vec![
            APP_NAME.to_string(),
            format!("Participant ID: {input}_"),
            "Enter to start".to_string(),
        ],
        Screen::Trial => vec![
            label.to_string(),
            counter.to_string(),
            format!("{PROMPT} {input}_"),
        ],
        Screen::End => vec![
            "Thank you! Your responses have been saved.".to_string(),
            "Enter for the next participant".to_string(),
        ],
    };
    if !error.is_empty() {
        parts.push(error.to_string());
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" | ")
}

impl Presenter for WindowFrontend {
    fn show_screen(&mut self, screen: Screen) {
        self.screen = screen;
        self.dirty = true;
    }

    fn write_error(&mut self, text: &str) {
        self.error = text.to_string();
    }

    fn write_label(&mut self, text: &str) {
        self.label = text.to_string();
    }

    fn write_counter(&mut self, text: &str) {
        self.counter = text.to_string();
    }

    fn clear_response(&mut self) {
        self.response_cleared = true;
    }

    fn write_export(&mut self, csv: &str) {
        self.export = Some(csv.to_string());
    }
}

impl Visualization for WindowFrontend {
    fn render(&mut self, condition: &Condition, trial: &TrialData) -> Result<(), RenderError> {
        self.dirty = true;
        self.chart.render(condition, trial)
    }

    fn clear(&mut self) {
        self.dirty = true;
        self.chart.clear();
    }
}
