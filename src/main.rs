mod app;
mod config;
mod frontend;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use percex_core::{RecordStore, StoreError};
use percex_experiment::{RandomTrialGenerator, RngSource};
use percex_render::{BarChartRenderer, ChartLayout};
use percex_store::{write_csv_file, FileBackend, TrialStore};
use time::OffsetDateTime;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::app::App;
use crate::config::AppConfig;

/// Cleveland & McGill bar chart perception experiment
#[derive(Debug, Parser)]
#[command(name = "graphical-perception", version, about)]
struct Args {
    /// Prefill the participant ID on the intro screen
    #[arg(long)]
    participant: Option<String>,

    #[arg(long, default_value = "percex.toml")]
    config: PathBuf,

    /// Overrides `[storage] data_dir`
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Write stored records to a CSV file and exit; give an ID to export one participant
    #[arg(long, value_name = "PARTICIPANT", num_args = 0..=1)]
    export: Option<Option<String>>,

    /// Delete every stored record and exit
    #[arg(long)]
    clear: bool,

    /// Render one PNG per condition into DIR and exit
    #[arg(long, value_name = "DIR")]
    preview: Option<PathBuf>,

    /// Overrides `[logging] level`
    #[arg(long)]
    log_level: Option<Level>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (mut config, source) = AppConfig::load_or_default(&args.config);
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }

    let level = match args.log_level {
        Some(level) => level,
        None => config.logging.level()?,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting graphical-perception v{}", env!("CARGO_PKG_VERSION"));
    source.log(&args.config);

    let data_dir = config.storage.data_dir.clone();
    let mut store = TrialStore::new(
        FileBackend::open(&data_dir)
            .with_context(|| format!("failed to open data directory {}", data_dir.display()))?,
    );

    if let Some(participant) = &args.export {
        return export(&store, participant.as_deref(), &data_dir);
    }
    if args.clear {
        let count = store.get_all().len();
        store.clear_all().context("failed to clear stored records")?;
        info!(records = count, "cleared stored records");
        return Ok(());
    }
    if let Some(dir) = &args.preview {
        return preview(&config, dir);
    }

    App::new(config, store, args.participant)?.run()
}

fn export(store: &dyn RecordStore, participant: Option<&str>, dir: &Path) -> Result<()> {
    match write_csv_file(store, participant, dir, OffsetDateTime::now_utc()) {
        Ok(path) => {
            println!("{}", path.display());
            Ok(())
        }
        Err(StoreError::NoData) => {
            warn!(participant = participant.unwrap_or("all"), "nothing to export");
            Ok(())
        }
        Err(e) => Err(e).context("CSV export failed"),
    }
}

/// One freshly generated trial per condition, saved as `<condition id>.png`.
fn preview(config: &AppConfig, dir: &Path) -> Result<()> {
    config.experiment.validate()?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut generator =
        RandomTrialGenerator::from_config(RngSource(rand::rng()), &config.experiment);
    let mut chart =
        BarChartRenderer::new(ChartLayout::default(), config.display.chart_scale, rand::rng())?;

    for condition in &config.experiment.conditions {
        let trial = generator.generate_trial_data(config.experiment.points_per_trial)?;
        chart.draw(condition.encoding, &trial)?;
        let path = dir.join(format!("{}.png", condition.id));
        chart
            .save_png(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            condition = %condition.id,
            values = ?trial.values(),
            true_percentage = trial.true_percentage(),
            path = %path.display(),
            "preview written"
        );
    }
    Ok(())
}
