use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use percex_experiment::ExperimentConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "DisplayConfig::default_fullscreen")]
    pub fullscreen: bool,
    /// Window size when not fullscreen
    #[serde(default = "DisplayConfig::default_window_width")]
    pub window_width: u32,
    #[serde(default = "DisplayConfig::default_window_height")]
    pub window_height: u32,
    /// Pixels per chart unit; the chart is 300 units square
    #[serde(default = "DisplayConfig::default_chart_scale")]
    pub chart_scale: f32,
}

impl DisplayConfig {
    fn default_fullscreen() -> bool {
        false
    }
    fn default_window_width() -> u32 {
        1024
    }
    fn default_window_height() -> u32 {
        768
    }
    fn default_chart_scale() -> f32 {
        2.0
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fullscreen: Self::default_fullscreen(),
            window_width: Self::default_window_width(),
            window_height: Self::default_window_height(),
            chart_scale: Self::default_chart_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Holds the record store and exported CSV files
    #[serde(default = "StorageConfig::default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn default_data_dir() -> PathBuf {
        PathBuf::from("data")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    pub fn level(&self) -> Result<Level> {
        Level::from_str(&self.level)
            .with_context(|| format!("invalid log level {:?} in config", self.level))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File,
    /// No file existed; a commented template was written
    WroteDefaults,
    /// The file could not be used
    Fallback(String),
}

impl ConfigSource {
    /// Reported after logging is up, since the level itself comes from the config.
    pub fn log(&self, path: &Path) {
        match self {
            ConfigSource::File => info!(path = %path.display(), "loaded config"),
            ConfigSource::WroteDefaults => {
                info!(path = %path.display(), "no config found; wrote defaults")
            }
            ConfigSource::Fallback(reason) => {
                warn!(path = %path.display(), %reason, "using default config")
            }
        }
    }
}

impl AppConfig {
    pub fn load_or_default(path: &Path) -> (Self, ConfigSource) {
        if path.exists() {
            return match fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => (cfg, ConfigSource::File),
                    Err(err) => (
                        Self::default(),
                        ConfigSource::Fallback(format!("failed to parse: {err}")),
                    ),
                },
                Err(err) => (
                    Self::default(),
                    ConfigSource::Fallback(format!("failed to read: {err}")),
                ),
            };
        }

        let default_cfg = Self::default();
        let source = match toml::to_string_pretty(&default_cfg) {
            Ok(text) => match fs::write(path, commented(&text)) {
                Ok(()) => ConfigSource::WroteDefaults,
                Err(err) => ConfigSource::Fallback(format!("failed to write defaults: {err}")),
            },
            Err(err) => ConfigSource::Fallback(format!("failed to serialize defaults: {err}")),
        };
        (default_cfg, source)
    }
}

/// Comments out every key and array-of-tables block, keeping plain `[section]` headers.
fn commented(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push('\n');
        } else if trimmed.starts_with('[') && !trimmed.starts_with("[[") && trimmed.ends_with(']')
        {
            out.push_str(line);
            out.push('\n');
        } else {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use percex_experiment::ValueRange;

    fn unique_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "percex_config_test_{}_{}",
            name,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        p
    }

    #[test]
    fn load_or_default_writes_commented_template() {
        let path = unique_path("defaults.toml");
        let _ = fs::remove_file(&path);

        let (cfg, source) = AppConfig::load_or_default(&path);
        assert_eq!(source, ConfigSource::WroteDefaults);
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.experiment.trials_per_condition, 20);
        assert_eq!(cfg.experiment.conditions.len(), 3);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[experiment]"));
        assert!(contents.contains("# points_per_trial = 5"));
        assert!(contents.contains("# level = \"info\""));
        assert!(contents.contains("\"bw\""));
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let t = line.trim();
            assert!(t.starts_with('#') || (t.starts_with('[') && !t.starts_with("[[")), "{line}");
        }

        // The template reads back as the defaults.
        let (again, source) = AppConfig::load_or_default(&path);
        assert_eq!(source, ConfigSource::File);
        assert_eq!(again, AppConfig::default());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_or_default_reads_existing() {
        let path = unique_path("custom.toml");
        let mut custom = AppConfig::default();
        custom.experiment.trials_per_condition = 4;
        custom.experiment.value_range = ValueRange { lower: 5, upper: 95 };
        custom.experiment.min_marked_gap = Some(3);
        custom.experiment.conditions.truncate(2);
        custom.display.fullscreen = true;
        custom.display.chart_scale = 1.5;
        custom.storage.data_dir = PathBuf::from("/tmp/percex");
        custom.logging.level = "debug".into();
        fs::write(&path, toml::to_string_pretty(&custom).unwrap()).unwrap();

        let (cfg, source) = AppConfig::load_or_default(&path);
        assert_eq!(source, ConfigSource::File);
        assert_eq!(cfg, custom);
        assert_eq!(cfg.logging.level().unwrap(), Level::DEBUG);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = unique_path("partial.toml");
        fs::write(
            &path,
            "[experiment]\ntrials_per_condition = 2\n\n[display]\nchart_scale = 3.0\n",
        )
        .unwrap();

        let (cfg, _) = AppConfig::load_or_default(&path);
        assert_eq!(cfg.experiment.trials_per_condition, 2);
        assert_eq!(cfg.experiment.points_per_trial, 5);
        assert_eq!(cfg.display.chart_scale, 3.0);
        assert_eq!(cfg.storage, StorageConfig::default());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unparseable_file_falls_back() {
        let path = unique_path("broken.toml");
        fs::write(&path, "[experiment\ntrials_per_condition = ").unwrap();

        let (cfg, source) = AppConfig::load_or_default(&path);
        assert_eq!(cfg, AppConfig::default());
        assert!(matches!(source, ConfigSource::Fallback(_)));
        // A broken file is left for the user to fix.
        assert!(path.exists());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn bad_log_level_is_an_error() {
        let logging = LoggingConfig {
            level: "loud".into(),
        };
        assert!(logging.level().is_err());
    }
}
