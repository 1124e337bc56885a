use crate::domain::models::{ApplicationDescriptor, Configuration};
use crate::services::config::ResolvedSettings;
use crate::services::discovery::summarize_apps;
use crate::services::output::{print_one, print_out};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ConfigView<'a> {
    settings_file: PathBuf,
    project_root: &'a Path,
    database: &'a Path,
    apps: &'a [ApplicationDescriptor],
    seedkit: &'a Configuration,
}

pub fn handle_apps(json: bool, settings: &ResolvedSettings) -> anyhow::Result<()> {
    let apps = summarize_apps(&settings.project_root, &settings.registry, &settings.config)?;
    if !json && apps.is_empty() {
        println!("No applications with a {} directory", settings.config.seed_dir);
        return Ok(());
    }
    print_out(json, &apps, |a| {
        format!("{}\t{}\t{} seed file(s)", a.name, a.seed_dir.display(), a.seed_files)
    })
}

pub fn handle_config(json: bool, settings_file: &Path, settings: &ResolvedSettings) -> anyhow::Result<()> {
    let view = ConfigView {
        settings_file: settings_file.to_path_buf(),
        project_root: &settings.project_root,
        database: &settings.database,
        apps: &settings.registry,
        seedkit: &settings.config,
    };
    print_one(json, view, |v| {
        let apps: Vec<&str> = v.apps.iter().map(|a| a.name.as_str()).collect();
        [
            format!("settings: {}", v.settings_file.display()),
            format!("project_root: {}", v.project_root.display()),
            format!("database: {}", v.database.display()),
            format!("apps: {}", apps.join(", ")),
            format!("seed_dir: {}", v.seedkit.seed_dir),
            format!("file_pattern: {}", v.seedkit.file_pattern),
            format!("atomic: {}", v.seedkit.atomic),
            format!("exclude_apps: {}", v.seedkit.exclude_apps.join(", ")),
            format!("placeholder_service: {}", v.seedkit.placeholder_service),
            format!("log_level: {}", v.seedkit.log_level),
        ]
        .join("\n")
    })
}
