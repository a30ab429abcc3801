use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_LOTTERY: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub lottery: String,
    pub verbose: bool,
}

impl CliConfig {
    pub fn from_args(data_dir: Option<PathBuf>, lottery: Option<String>, verbose: bool) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: data_dir.unwrap_or(defaults.data_dir),
            lottery: lottery.unwrap_or(defaults.lottery),
            verbose,
        }
    }

    pub fn log_filter(&self) -> String {
        let level = if self.verbose { "debug" } else { "info" };
        format!("pick4={},pick4_lottery={},pick4_core={}", level, level, level)
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pick4"),
            lottery: DEFAULT_LOTTERY.to_string(),
            verbose: false,
        }
    }
}
