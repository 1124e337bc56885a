use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod cli;
mod commands;
mod domain;
mod services;

use cli::{Cli, Commands};
use domain::errors::SeedError;
use services::config::{load_settings, settings_path, ResolvedSettings};
use services::output::print_error_json;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = settings_path(cli.settings.as_deref())
        .and_then(|path| load_settings(&path).map(|settings| (path, settings)));

    init_tracing(
        &loaded
            .as_ref()
            .map(|(_, s)| s.config.log_level.to_ascii_lowercase())
            .unwrap_or_else(|_| domain::models::DEFAULT_LOG_LEVEL.to_string()),
    );

    let result = loaded
        .map_err(anyhow::Error::from)
        .and_then(|(path, settings)| dispatch(&cli, &path, settings));

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            report_error(cli.json, &err);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: &Cli, settings_file: &Path, mut settings: ResolvedSettings) -> anyhow::Result<bool> {
    if let Some(database) = &cli.database {
        settings.database = PathBuf::from(database);
    }
    tracing::debug!(
        project_root = %settings.project_root.display(),
        database = %settings.database.display(),
        apps = settings.registry.len(),
        "settings loaded"
    );

    match &cli.command {
        Commands::Seed(args) => commands::handle_seed(cli.json, &settings, args),
        Commands::Apps => commands::handle_apps(cli.json, &settings).map(|_| true),
        Commands::Config => commands::handle_config(cli.json, settings_file, &settings).map(|_| true),
    }
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_error(json: bool, err: &anyhow::Error) {
    let code = err
        .downcast_ref::<SeedError>()
        .map(SeedError::code)
        .unwrap_or("INTERNAL");
    let message = format!("{err:#}");
    if json && print_error_json(code, &message).is_ok() {
        return;
    }
    eprintln!("error: {message}");
}
