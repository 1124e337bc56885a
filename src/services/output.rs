use crate::domain::models::{
    ErrorBody, ExecutionOutcome, ExecutionPlan, JsonError, JsonOut, OutcomeStatus, RunMode,
    RunReport, SeedModuleRef,
};
use crate::services::runner::RunObserver;
use serde::Serialize;
use std::io::Write;

pub fn print_out<T: Serialize>(
    json: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        for d in data {
            println!("{}", row(d));
        }
    }
    Ok(())
}

pub fn print_one<T: Serialize>(
    json: bool,
    data: T,
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        println!("{}", row(&data));
    }
    Ok(())
}

/// JSON envelope for a finished run; `ok` is false when any unit failed.
pub fn print_report_json(report: &RunReport) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonOut {
            ok: !report.has_failures(),
            data: report,
        })?
    );
    Ok(())
}

pub fn print_error_json(code: &str, message: &str) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonError {
            ok: false,
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        })?
    );
    Ok(())
}

/// Plain-text listing used by `--list` and `--dry-run`.
pub fn render_listing(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.outcomes.is_empty() {
        lines.push("No seed files found".to_string());
        return lines;
    }
    match report.mode {
        RunMode::DryRun => lines.push(format!(
            "Dry run - would execute {} file(s):",
            report.outcomes.len()
        )),
        _ => lines.push("Available seed files:".to_string()),
    }

    let mut current_app: Option<&str> = None;
    for o in &report.outcomes {
        if current_app != Some(o.seed.application_name.as_str()) {
            current_app = Some(o.seed.application_name.as_str());
            lines.push(format!("  {}:", o.seed.application_name));
        }
        match &o.error {
            Some(err) => lines.push(format!("    ✗ {}: {err}", o.seed.file_name())),
            None => lines.push(format!("    - {}", o.seed.file_name())),
        }
    }
    if !report.dependencies.is_empty() {
        lines.push("  dependencies:".to_string());
        for d in &report.dependencies {
            lines.push(format!("    - {}", d.dotted_path));
        }
    }
    lines
}

pub fn render_summary(report: &RunReport) -> String {
    if report.has_failures() {
        format!("Seeding failed with {} error(s)", report.summary.failed)
    } else {
        "Seeding complete!".to_string()
    }
}

/// Prints apply progress inline while units run.
#[derive(Default)]
pub struct ConsoleProgress {
    line_open: bool,
}

impl ConsoleProgress {
    fn close_line(&mut self) {
        if self.line_open {
            println!();
            self.line_open = false;
        }
    }
}

impl RunObserver for ConsoleProgress {
    fn plan_ready(&mut self, _mode: RunMode, plan: &ExecutionPlan) {
        if plan.is_empty() {
            println!("No seed files to run");
        } else {
            println!("Running {} seed file(s)...", plan.len());
        }
    }

    fn application_started(&mut self, name: &str) {
        self.close_line();
        println!("\n{name}:");
    }

    fn unit_started(&mut self, seed: &SeedModuleRef) {
        self.close_line();
        print!("  Importing {}...", seed.file_name());
        let _ = std::io::stdout().flush();
        self.line_open = true;
    }

    fn dependency_loaded(&mut self, seed: &SeedModuleRef) {
        self.close_line();
        println!("    loading dependency {}", seed.dotted_path);
    }

    fn unit_finished(&mut self, outcome: &ExecutionOutcome) {
        let label = match outcome.status {
            OutcomeStatus::Executed => "OK",
            OutcomeStatus::Failed => "FAILED",
            OutcomeStatus::Skipped => "SKIPPED",
        };
        if self.line_open {
            println!(" {label}");
        } else {
            println!("  {} {label}", outcome.seed.file_name());
        }
        self.line_open = false;
        if let Some(err) = &outcome.error {
            println!("    Error: {err}");
        }
    }
}
