use crate::domain::errors::SeedError;
use crate::domain::models::{ApplicationDescriptor, Configuration, ProjectSettings};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

pub const ENV_SEEDKIT_SETTINGS: &str = "SEEDKIT_SETTINGS";
pub const DEFAULT_SETTINGS_FILE: &str = "seedkit.toml";

const PLACEHOLDER_SERVICES: &[&str] = &["picsum", "placehold"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Settings after path resolution and validation.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub project_root: PathBuf,
    pub database: PathBuf,
    pub registry: Vec<ApplicationDescriptor>,
    pub config: Configuration,
}

/// `--settings` wins, then `SEEDKIT_SETTINGS`, then `./seedkit.toml`.
pub fn settings_path(explicit: Option<&str>) -> Result<PathBuf, SeedError> {
    if let Some(p) = explicit {
        return Ok(PathBuf::from(p));
    }
    match std::env::var(ENV_SEEDKIT_SETTINGS) {
        Ok(raw) if !raw.trim().is_empty() => Ok(PathBuf::from(raw.trim())),
        Ok(_) | Err(std::env::VarError::NotPresent) => Ok(PathBuf::from(DEFAULT_SETTINGS_FILE)),
        Err(_) => Err(SeedError::configuration(format!(
            "{ENV_SEEDKIT_SETTINGS} contained invalid UTF-8"
        ))),
    }
}

pub fn load_settings(path: &Path) -> Result<ResolvedSettings, SeedError> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        SeedError::configuration(format!(
            "failed to read settings from {}: {err}",
            path.display()
        ))
    })?;
    let settings: ProjectSettings = toml::from_str(&raw).map_err(|err| {
        SeedError::configuration(format!(
            "failed to parse settings from {}: {err}",
            path.display()
        ))
    })?;
    let project_root = project_root_of(path)?;
    resolve(settings, project_root)
}

fn project_root_of(settings_file: &Path) -> Result<PathBuf, SeedError> {
    let parent = settings_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parent.canonicalize().map_err(|err| {
        SeedError::configuration(format!(
            "failed to resolve project root {}: {err}",
            parent.display()
        ))
    })
}

pub fn resolve(
    settings: ProjectSettings,
    project_root: PathBuf,
) -> Result<ResolvedSettings, SeedError> {
    validate_configuration(&settings.seedkit)?;

    let mut seen = HashSet::new();
    let mut registry = Vec::with_capacity(settings.apps.len());
    for app in settings.apps {
        if !is_valid_app_name(&app.name) {
            return Err(SeedError::configuration(format!(
                "invalid application name: {:?}",
                app.name
            )));
        }
        if !seen.insert(app.name.clone()) {
            return Err(SeedError::configuration(format!(
                "duplicate application name: {}",
                app.name
            )));
        }
        if app.path.trim().is_empty() {
            return Err(SeedError::configuration(format!(
                "application {} has an empty path",
                app.name
            )));
        }
        registry.push(ApplicationDescriptor {
            name: app.name,
            root_path: project_root.join(app.path.trim()),
        });
    }

    if settings.database.trim().is_empty() {
        return Err(SeedError::configuration("database path must not be empty"));
    }
    let database = project_root.join(settings.database.trim());

    Ok(ResolvedSettings {
        project_root,
        database,
        registry,
        config: settings.seedkit,
    })
}

pub fn validate_configuration(config: &Configuration) -> Result<(), SeedError> {
    let mut components = Path::new(&config.seed_dir).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal {
        return Err(SeedError::configuration(format!(
            "seed_dir must be a single directory name, got {:?}",
            config.seed_dir
        )));
    }

    if config.file_pattern.trim().is_empty() {
        return Err(SeedError::configuration("file_pattern must not be empty"));
    }
    glob::Pattern::new(&config.file_pattern).map_err(|err| {
        SeedError::configuration(format!(
            "invalid file_pattern {:?}: {err}",
            config.file_pattern
        ))
    })?;

    for name in &config.exclude_apps {
        if !is_valid_app_name(name) {
            return Err(SeedError::configuration(format!(
                "invalid application name in exclude_apps: {name:?}"
            )));
        }
    }

    if !PLACEHOLDER_SERVICES.contains(&config.placeholder_service.as_str()) {
        return Err(SeedError::configuration(format!(
            "unknown placeholder_service {:?} (expected one of: {})",
            config.placeholder_service,
            PLACEHOLDER_SERVICES.join(", ")
        )));
    }

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        return Err(SeedError::configuration(format!(
            "unknown log_level {:?} (expected one of: {})",
            config.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    Ok(())
}

pub fn is_valid_app_name(name: &str) -> bool {
    static APP_NAME: OnceLock<Regex> = OnceLock::new();
    APP_NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("static regex"))
        .is_match(name)
}
