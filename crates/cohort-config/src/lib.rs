use std::fs;
use std::path::Path;

use cohort_core::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "cohort.toml";

/// One decay unit, in minutes.
pub const DEFAULT_TIME_STEP_MINUTES: f64 = 720.0;
/// Tie-strength increase per interaction.
pub const DEFAULT_JUMP_SIZE: f64 = 0.3;
/// Absent interaction, a tie fully decays after 17 days.
pub const DEFAULT_PERIOD_OF_TOTAL_DECAY_MINUTES: f64 = 17.0 * 24.0 * 60.0;
/// Weight below which an edge is dropped.
pub const DEFAULT_CUTOFF_THRESHOLD: f64 = 0.01;
pub const DEFAULT_DECAY: f64 = 0.5;
/// Window between a departure and a joining that still counts as one
/// reassignment, in days.
pub const DEFAULT_REASSIGNMENT_WINDOW_DAYS: i64 = 3;
/// Fallback sampling window when no event occurs, in minutes (3 days).
pub const DEFAULT_TIME_SLICE_MINUTES: f64 = 4320.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    #[default]
    Louvain,
    GreedyModularity,
}

impl DetectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Louvain => "louvain",
            Self::GreedyModularity => "greedy_modularity",
        }
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "louvain" => Ok(Self::Louvain),
            "greedy_modularity" => Ok(Self::GreedyModularity),
            other => Err(format!(
                "invalid detector '{other}', expected one of: louvain, greedy_modularity"
            )),
        }
    }
}

/// How to classify group merges and partitions that are not clean: `Strict`
/// drops them, `Lenient` still emits the group-level record while tolerating
/// stray members on the absorbing or remaining side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupEventPolicy {
    #[default]
    Strict,
    Lenient,
}

impl GroupEventPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl std::str::FromStr for GroupEventPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!(
                "invalid group event policy '{other}', expected one of: strict, lenient"
            )),
        }
    }
}

/// Parameters of the tie reinforcement/decay model. `scale` is the explicit
/// half-life in time steps; when absent it is derived from
/// `period_of_total_decay_minutes`, which is only defined for `decay == 0.5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieConfig {
    #[serde(default = "default_time_step")]
    pub time_step_minutes: f64,
    #[serde(default = "default_jump_size")]
    pub jump_size: f64,
    #[serde(default = "default_period_of_total_decay")]
    pub period_of_total_decay_minutes: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub offset_minutes: f64,
    #[serde(default = "default_decay")]
    pub decay: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl Default for TieConfig {
    fn default() -> Self {
        Self {
            time_step_minutes: DEFAULT_TIME_STEP_MINUTES,
            jump_size: DEFAULT_JUMP_SIZE,
            period_of_total_decay_minutes: DEFAULT_PERIOD_OF_TOTAL_DECAY_MINUTES,
            threshold: DEFAULT_CUTOFF_THRESHOLD,
            offset_minutes: 0.0,
            decay: DEFAULT_DECAY,
            scale: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub tie: TieConfig,
    #[serde(default = "default_time_slice")]
    pub time_slice_minutes: f64,
    /// Materialize a snapshot at every slice bound even without an event.
    #[serde(default)]
    pub emit_slice_snapshots: bool,
    #[serde(default = "default_reassignment_window")]
    pub reassignment_window_days: i64,
    #[serde(default)]
    pub detector: DetectorKind,
    #[serde(default)]
    pub group_event_policy: GroupEventPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tie: TieConfig::default(),
            time_slice_minutes: DEFAULT_TIME_SLICE_MINUTES,
            emit_slice_snapshots: false,
            reassignment_window_days: DEFAULT_REASSIGNMENT_WINDOW_DAYS,
            detector: DetectorKind::default(),
            group_event_policy: GroupEventPolicy::default(),
            begin: None,
            end: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

/// Load a run config from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_run_config(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(RunConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: RunConfig = toml::from_str(&raw)?;
    Ok(parsed)
}

/// Write `config` to `path` unless a file is already there, then return the
/// effective config.
pub fn ensure_run_config(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return load_run_config(path);
    }

    let config = RunConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;
    Ok(config)
}

/// Non-fatal sanity checks. Fatal parameter combinations (offset beyond the
/// decay period, non-0.5 decay without an explicit scale) are rejected when
/// the tie-strength model is constructed.
pub fn validate_config(config: &RunConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.tie.jump_size <= 0.0 || config.tie.jump_size > 1.0 {
        warnings.push(ConfigWarning {
            code: "tie.jump_size",
            message: format!(
                "jump size {} is outside (0, 1]; interactions will saturate or never register",
                config.tie.jump_size
            ),
        });
    }

    if config.tie.threshold <= 0.0 || config.tie.threshold >= 1.0 {
        warnings.push(ConfigWarning {
            code: "tie.threshold",
            message: format!(
                "cutoff threshold {} is outside (0, 1); edges will never or always expire",
                config.tie.threshold
            ),
        });
    }

    if config.tie.time_step_minutes <= 0.0 {
        warnings.push(ConfigWarning {
            code: "tie.time_step_minutes",
            message: format!(
                "time step of {} minutes is not positive",
                config.tie.time_step_minutes
            ),
        });
    }

    if config.time_slice_minutes < config.tie.time_step_minutes {
        warnings.push(ConfigWarning {
            code: "time_slice_minutes",
            message: format!(
                "time slice of {} minutes is shorter than one decay step of {} minutes",
                config.time_slice_minutes, config.tie.time_step_minutes
            ),
        });
    }

    if config.reassignment_window_days <= 0 {
        warnings.push(ConfigWarning {
            code: "reassignment_window_days",
            message: format!(
                "reassignment window of {} days disables departure/joining correlation",
                config.reassignment_window_days
            ),
        });
    }

    warnings
}

fn default_time_step() -> f64 {
    DEFAULT_TIME_STEP_MINUTES
}

fn default_jump_size() -> f64 {
    DEFAULT_JUMP_SIZE
}

fn default_period_of_total_decay() -> f64 {
    DEFAULT_PERIOD_OF_TOTAL_DECAY_MINUTES
}

fn default_threshold() -> f64 {
    DEFAULT_CUTOFF_THRESHOLD
}

fn default_decay() -> f64 {
    DEFAULT_DECAY
}

fn default_time_slice() -> f64 {
    DEFAULT_TIME_SLICE_MINUTES
}

fn default_reassignment_window() -> i64 {
    DEFAULT_REASSIGNMENT_WINDOW_DAYS
}
