use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SEED_DIR: &str = "seeds";
pub const DEFAULT_FILE_PATTERN: &str = "setup_*.sql";
pub const DEFAULT_PLACEHOLDER_SERVICE: &str = "picsum";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_DATABASE: &str = "db.sqlite3";

fn default_seed_dir() -> String {
    DEFAULT_SEED_DIR.to_string()
}

fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

fn default_atomic() -> bool {
    true
}

fn default_placeholder_service() -> String {
    DEFAULT_PLACEHOLDER_SERVICE.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct JsonError {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Project settings file (`seedkit.toml`).
#[derive(Debug, Deserialize)]
pub struct ProjectSettings {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub apps: Vec<AppEntry>,
    #[serde(default)]
    pub seedkit: Configuration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppEntry {
    pub name: String,
    pub path: String,
}

/// Run configuration, resolved once per process and read-only afterwards.
///
/// Keys accept both the snake_case spelling and the upper-case host setting
/// names (`SEED_DIR`, `FILE_PATTERN`, ...).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Configuration {
    #[serde(default = "default_seed_dir", alias = "SEED_DIR")]
    pub seed_dir: String,
    #[serde(default = "default_file_pattern", alias = "FILE_PATTERN")]
    pub file_pattern: String,
    #[serde(default = "default_atomic", alias = "ATOMIC")]
    pub atomic: bool,
    #[serde(default, alias = "EXCLUDE_APPS")]
    pub exclude_apps: Vec<String>,
    #[serde(default = "default_placeholder_service", alias = "PLACEHOLDER_SERVICE")]
    pub placeholder_service: String,
    #[serde(default = "default_log_level", alias = "LOG_LEVEL")]
    pub log_level: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            seed_dir: default_seed_dir(),
            file_pattern: default_file_pattern(),
            atomic: default_atomic(),
            exclude_apps: Vec::new(),
            placeholder_service: default_placeholder_service(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    pub name: String,
    pub root_path: PathBuf,
}

/// One discoverable seed file. `dotted_path` is unique within a run.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SeedModuleRef {
    pub application_name: String,
    pub dotted_path: String,
    pub file_path: PathBuf,
}

impl SeedModuleRef {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Seed files grouped by application in enumeration order, each group sorted
/// by file name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub entries: Vec<SeedModuleRef>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Application names in plan order, without repeats.
    pub fn applications(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for e in &self.entries {
            if out.last() != Some(&e.application_name.as_str()) {
                out.push(&e.application_name);
            }
        }
        out
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Executed,
    Failed,
    Skipped,
}

#[derive(Debug, Serialize, Clone)]
pub struct ExecutionOutcome {
    #[serde(flatten)]
    pub seed: SeedModuleRef,
    pub status: OutcomeStatus,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    List,
    DryRun,
    Apply,
}

#[derive(Debug, Serialize, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    pub atomic: bool,
    pub outcomes: Vec<ExecutionOutcome>,
    /// Units loaded only because a planned unit depends on them.
    pub dependencies: Vec<SeedModuleRef>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(
        mode: RunMode,
        atomic: bool,
        outcomes: Vec<ExecutionOutcome>,
        dependencies: Vec<SeedModuleRef>,
    ) -> Self {
        let count = |s: OutcomeStatus| outcomes.iter().filter(|o| o.status == s).count();
        let summary = RunSummary {
            total: outcomes.len(),
            executed: count(OutcomeStatus::Executed),
            failed: count(OutcomeStatus::Failed),
            skipped: count(OutcomeStatus::Skipped),
        };
        Self {
            mode,
            atomic,
            outcomes,
            dependencies,
            summary,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

#[derive(Serialize)]
pub struct AppSummary {
    pub name: String,
    pub root_path: PathBuf,
    pub seed_dir: PathBuf,
    pub seed_files: usize,
}
