use crate::cli::SeedArgs;
use crate::domain::models::RunMode;
use crate::services::config::ResolvedSettings;
use crate::services::helpers::HelperOptions;
use crate::services::output::{
    print_report_json, render_listing, render_summary, ConsoleProgress,
};
use crate::services::runner::{RunObserver, Runner, Silent};
use crate::services::store::SeedStore;
use std::collections::HashSet;

/// Runs `seedkit seed`. Returns `false` when any seed unit failed.
pub fn handle_seed(json: bool, settings: &ResolvedSettings, args: &SeedArgs) -> anyhow::Result<bool> {
    let mode = if args.list {
        RunMode::List
    } else if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    };

    let mut settings = settings.clone();
    if args.no_atomic {
        settings.config.atomic = false;
    }
    let filter = apps_filter(&args.apps);

    let mut store = match mode {
        RunMode::Apply => Some(SeedStore::open(
            &settings.database,
            &HelperOptions {
                placeholder_service: settings.config.placeholder_service.clone(),
                log_to_stderr: json,
            },
        )?),
        RunMode::List | RunMode::DryRun => None,
    };

    let mut silent = Silent;
    let mut progress = ConsoleProgress::default();
    let observer: &mut dyn RunObserver = if json || mode != RunMode::Apply {
        &mut silent
    } else {
        &mut progress
    };
    let report = Runner::new(&settings).run(mode, filter.as_ref(), store.as_mut(), observer)?;

    if json {
        print_report_json(&report)?;
    } else if mode == RunMode::Apply {
        if !report.outcomes.is_empty() {
            println!("\n{}", render_summary(&report));
        }
    } else {
        for line in render_listing(&report) {
            println!("{line}");
        }
    }
    Ok(!report.has_failures())
}

/// Trimmed, non-empty application names; `None` when nothing remains.
pub fn apps_filter(raw: &[String]) -> Option<HashSet<String>> {
    let names: HashSet<String> = raw
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    (!names.is_empty()).then_some(names)
}
