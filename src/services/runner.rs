use crate::domain::errors::SeedError;
use crate::domain::models::{
    ExecutionOutcome, ExecutionPlan, OutcomeStatus, RunMode, RunReport, SeedModuleRef,
};
use crate::services::config::ResolvedSettings;
use crate::services::discovery::{build_catalog, build_plan, Catalog};
use crate::services::graph::{self, ResolvedUnits};
use crate::services::loader::{Loader, UnitState};
use crate::services::store::{PerUnitTransaction, SeedStore, SharedTransaction, ValidateOnly};
use std::collections::HashSet;
use std::sync::Arc;

/// Progress events emitted while a run walks its plan.
pub trait RunObserver {
    fn plan_ready(&mut self, _mode: RunMode, _plan: &ExecutionPlan) {}
    fn application_started(&mut self, _name: &str) {}
    fn unit_started(&mut self, _seed: &SeedModuleRef) {}
    fn dependency_loaded(&mut self, _seed: &SeedModuleRef) {}
    fn unit_finished(&mut self, _outcome: &ExecutionOutcome) {}
}

/// Observer that ignores every event.
pub struct Silent;

impl RunObserver for Silent {}

pub struct Runner<'a> {
    settings: &'a ResolvedSettings,
}

impl<'a> Runner<'a> {
    pub fn new(settings: &'a ResolvedSettings) -> Self {
        Self { settings }
    }

    pub fn plan(&self, apps_filter: Option<&HashSet<String>>) -> Result<ExecutionPlan, SeedError> {
        build_plan(
            &self.settings.project_root,
            &self.settings.registry,
            &self.settings.config,
            apps_filter,
        )
    }

    /// Plans and runs the seed units selected by `apps_filter`.
    ///
    /// Individual unit failures end up in the report. Only problems that
    /// stop the run as a whole are returned as errors: bad configuration,
    /// a dependency cycle, or the database refusing to begin or commit.
    /// `store` is only touched in [`RunMode::Apply`].
    pub fn run(
        &self,
        mode: RunMode,
        apps_filter: Option<&HashSet<String>>,
        store: Option<&mut SeedStore>,
        observer: &mut dyn RunObserver,
    ) -> Result<RunReport, SeedError> {
        let atomic = self.settings.config.atomic;
        let plan = self.plan(apps_filter)?;
        tracing::info!(
            ?mode,
            atomic,
            entries = plan.len(),
            apps = ?plan.applications(),
            "seed run planned"
        );
        observer.plan_ready(mode, &plan);

        let report = match mode {
            RunMode::List => {
                let outcomes = plan
                    .entries
                    .iter()
                    .map(|seed| outcome(seed, OutcomeStatus::Skipped, None))
                    .collect();
                RunReport::new(mode, atomic, outcomes, Vec::new())
            }
            RunMode::DryRun => {
                let (catalog, units) = self.resolve(&plan)?;
                let mut scope = ValidateOnly;
                let mut loader = Loader::new(&catalog, units, &mut scope);
                let outcomes = drive(&plan, &mut loader, observer, OutcomeStatus::Skipped, false);
                let deps = outside_plan(&plan, &loader);
                RunReport::new(mode, atomic, outcomes, deps)
            }
            RunMode::Apply => {
                let store = store.ok_or_else(|| {
                    SeedError::configuration("apply mode requires an open database")
                })?;
                let (outcomes, deps) = if atomic {
                    self.apply_atomic(&plan, store, observer)?
                } else {
                    self.apply_each(&plan, store, observer)?
                };
                RunReport::new(mode, atomic, outcomes, deps)
            }
        };

        tracing::info!(
            executed = report.summary.executed,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "seed run finished"
        );
        Ok(report)
    }

    fn resolve(&self, plan: &ExecutionPlan) -> Result<(Catalog, ResolvedUnits), SeedError> {
        let catalog = build_catalog(
            &self.settings.project_root,
            &self.settings.registry,
            &self.settings.config,
        )?;
        let units = graph::resolve(plan, &catalog)?;
        tracing::debug!(
            catalogued = catalog.len(),
            resolved = units.units.len(),
            unreadable = units.failures.len(),
            "seed units resolved"
        );
        Ok((catalog, units))
    }

    fn apply_atomic(
        &self,
        plan: &ExecutionPlan,
        store: &mut SeedStore,
        observer: &mut dyn RunObserver,
    ) -> Result<(Vec<ExecutionOutcome>, Vec<SeedModuleRef>), SeedError> {
        let (catalog, units) = self.resolve(plan)?;
        let tx = store.connection_mut().transaction()?;
        let (outcomes, deps) = {
            let mut scope = SharedTransaction::new(&tx);
            let mut loader = Loader::new(&catalog, units, &mut scope);
            let outcomes = drive(plan, &mut loader, observer, OutcomeStatus::Executed, true);
            (outcomes, outside_plan(plan, &loader))
        };

        if !outcomes.iter().any(|o| o.status == OutcomeStatus::Failed) {
            tx.commit()?;
        } else if tx.is_autocommit() {
            tracing::warn!("seed run failed after a unit ended the transaction");
        } else {
            tracing::warn!("seed run failed, rolling back");
            tx.rollback()?;
        }
        Ok((outcomes, deps))
    }

    fn apply_each(
        &self,
        plan: &ExecutionPlan,
        store: &mut SeedStore,
        observer: &mut dyn RunObserver,
    ) -> Result<(Vec<ExecutionOutcome>, Vec<SeedModuleRef>), SeedError> {
        let (catalog, units) = self.resolve(plan)?;
        let mut scope = PerUnitTransaction::new(store.connection_mut());
        let mut loader = Loader::new(&catalog, units, &mut scope);
        let outcomes = drive(plan, &mut loader, observer, OutcomeStatus::Executed, false);
        let deps = outside_plan(plan, &loader);
        Ok((outcomes, deps))
    }
}

fn outcome(seed: &SeedModuleRef, status: OutcomeStatus, error: Option<String>) -> ExecutionOutcome {
    ExecutionOutcome {
        seed: seed.clone(),
        status,
        error,
    }
}

/// Loads every plan entry in order. After the first failure with
/// `stop_on_failure`, the remaining entries are not loaded; they report
/// what already happened to them as a dependency, or `skipped`.
fn drive(
    plan: &ExecutionPlan,
    loader: &mut Loader<'_>,
    observer: &mut dyn RunObserver,
    ok: OutcomeStatus,
    stop_on_failure: bool,
) -> Vec<ExecutionOutcome> {
    let mut outcomes = Vec::with_capacity(plan.len());
    let mut current_app: Option<&str> = None;
    let mut aborted = false;

    for seed in &plan.entries {
        if current_app != Some(seed.application_name.as_str()) {
            current_app = Some(seed.application_name.as_str());
            observer.application_started(&seed.application_name);
        }
        let result = if aborted {
            match loader.registry().state(&seed.dotted_path) {
                Some(UnitState::Executed) => outcome(seed, ok, None),
                Some(UnitState::Failed(err)) => {
                    outcome(seed, OutcomeStatus::Failed, Some(render(Arc::clone(err))))
                }
                _ => outcome(seed, OutcomeStatus::Skipped, None),
            }
        } else {
            observer.unit_started(seed);
            match loader.load(&seed.dotted_path, observer) {
                Ok(()) => outcome(seed, ok, None),
                Err(err) => {
                    let detail = render(err);
                    tracing::warn!(dotted_path = %seed.dotted_path, error = %detail, "seed unit failed");
                    aborted = stop_on_failure;
                    outcome(seed, OutcomeStatus::Failed, Some(detail))
                }
            }
        };
        observer.unit_finished(&result);
        outcomes.push(result);
    }
    tracing::debug!(bodies_run = loader.registry().executed().len(), "plan walked");
    outcomes
}

/// `outer: inner: root`, as anyhow prints a chain with `{:#}`.
fn render(err: Arc<SeedError>) -> String {
    format!("{:#}", anyhow::Error::new(err))
}

fn outside_plan(plan: &ExecutionPlan, loader: &Loader<'_>) -> Vec<SeedModuleRef> {
    let planned: HashSet<&str> = plan.entries.iter().map(|e| e.dotted_path.as_str()).collect();
    loader
        .loaded_as_dependency()
        .iter()
        .filter(|seed| !planned.contains(seed.dotted_path.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ApplicationDescriptor, Configuration};
    use crate::services::helpers::HelperOptions;
    use std::fs;
    use tempfile::TempDir;

    const SCHEMA: &str = "
        CREATE TABLE users (username TEXT PRIMARY KEY);
        CREATE TABLE posts (slug TEXT PRIMARY KEY, author TEXT NOT NULL REFERENCES users(username));
        CREATE TABLE items (name TEXT PRIMARY KEY);
    ";

    struct Project {
        _tmp: TempDir,
        settings: ResolvedSettings,
    }

    impl Project {
        fn new(apps: &[&str]) -> Self {
            let tmp = TempDir::new().expect("temp dir");
            let root = tmp.path().canonicalize().expect("canonical root");
            let registry = apps
                .iter()
                .map(|name| ApplicationDescriptor {
                    name: name.to_string(),
                    root_path: root.join(name),
                })
                .collect();
            Self {
                _tmp: tmp,
                settings: ResolvedSettings {
                    database: root.join("db.sqlite3"),
                    project_root: root,
                    registry,
                    config: Configuration::default(),
                },
            }
        }

        fn seed(&self, app: &str, file: &str, sql: &str) {
            let dir = self.settings.project_root.join(app).join("seeds");
            fs::create_dir_all(&dir).expect("seed dir");
            fs::write(dir.join(file), sql).expect("seed file");
        }

        fn non_atomic(mut self) -> Self {
            self.settings.config.atomic = false;
            self
        }

        fn run(&self, mode: RunMode, filter: Option<&[&str]>, store: &mut SeedStore) -> RunReport {
            let filter: Option<HashSet<String>> =
                filter.map(|names| names.iter().map(|n| n.to_string()).collect());
            Runner::new(&self.settings)
                .run(mode, filter.as_ref(), Some(store), &mut Silent)
                .expect("run")
        }
    }

    fn store() -> SeedStore {
        let store = SeedStore::in_memory(&HelperOptions::default()).expect("store");
        store.connection().execute_batch(SCHEMA).expect("schema");
        store
    }

    fn count(store: &SeedStore, table: &str) -> i64 {
        store
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .expect("count")
    }

    fn statuses(report: &RunReport) -> Vec<(&str, OutcomeStatus)> {
        report
            .outcomes
            .iter()
            .map(|o| (o.seed.dotted_path.as_str(), o.status))
            .collect()
    }

    fn three_entries_second_broken(project: &Project) {
        project.seed("shop", "setup_a.sql", "INSERT INTO items VALUES ('a');");
        project.seed(
            "shop",
            "setup_b.sql",
            "INSERT INTO items VALUES ('b');\nINSERT INTO nowhere VALUES (1);",
        );
        project.seed("shop", "setup_c.sql", "INSERT INTO items VALUES ('c');");
    }

    #[test]
    fn atomic_failure_rolls_back_the_whole_run() {
        let project = Project::new(&["shop"]);
        three_entries_second_broken(&project);
        let mut store = store();

        let report = project.run(RunMode::Apply, None, &mut store);

        assert_eq!(
            statuses(&report),
            vec![
                ("shop.seeds.setup_a", OutcomeStatus::Executed),
                ("shop.seeds.setup_b", OutcomeStatus::Failed),
                ("shop.seeds.setup_c", OutcomeStatus::Skipped),
            ]
        );
        assert!(report.atomic);
        assert!(report.outcomes[1]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("no such table: nowhere"));
        assert_eq!(count(&store, "items"), 0);
    }

    #[test]
    fn entries_already_loaded_as_dependencies_keep_their_status_after_a_failure() {
        let project = Project::new(&["shop"]);
        project.seed("shop", "setup_a.sql", "INSERT INTO items VALUES ('a');");
        project.seed(
            "shop",
            "setup_b.sql",
            "-- depends: shop.seeds.setup_c\nINSERT INTO nowhere VALUES (1);",
        );
        project.seed("shop", "setup_c.sql", "INSERT INTO items VALUES ('c');");
        project.seed("shop", "setup_d.sql", "INSERT INTO items VALUES ('d');");
        let mut store = store();

        let report = project.run(RunMode::Apply, None, &mut store);

        assert_eq!(
            statuses(&report),
            vec![
                ("shop.seeds.setup_a", OutcomeStatus::Executed),
                ("shop.seeds.setup_b", OutcomeStatus::Failed),
                ("shop.seeds.setup_c", OutcomeStatus::Executed),
                ("shop.seeds.setup_d", OutcomeStatus::Skipped),
            ]
        );
        assert_eq!((report.summary.failed, report.summary.skipped), (1, 1));
        assert_eq!(count(&store, "items"), 0);
    }

    #[test]
    fn failed_dependency_later_in_the_plan_reports_its_own_error() {
        let project = Project::new(&["shop"]);
        project.seed(
            "shop",
            "setup_a.sql",
            "-- depends: shop.seeds.setup_b\nINSERT INTO items VALUES ('a');",
        );
        project.seed("shop", "setup_b.sql", "INSERT INTO nowhere VALUES (1);");
        project.seed("shop", "setup_c.sql", "INSERT INTO items VALUES ('c');");
        let mut store = store();

        let report = project.run(RunMode::Apply, None, &mut store);

        assert_eq!(
            statuses(&report),
            vec![
                ("shop.seeds.setup_a", OutcomeStatus::Failed),
                ("shop.seeds.setup_b", OutcomeStatus::Failed),
                ("shop.seeds.setup_c", OutcomeStatus::Skipped),
            ]
        );
        let own = report.outcomes[1].error.as_deref().unwrap_or_default();
        assert!(own.starts_with("failed to load seed module shop.seeds.setup_b: no such table: nowhere"), "{own}");
    }

    #[test]
    fn commit_inside_a_unit_leaves_nothing_committed() {
        let project = Project::new(&["shop"]);
        project.seed("shop", "setup_a.sql", "INSERT INTO items VALUES ('a');");
        project.seed("shop", "setup_b.sql", "INSERT INTO items VALUES ('b');\nCOMMIT;");
        project.seed("shop", "setup_c.sql", "INSERT INTO items VALUES ('c');");
        let mut store = store();

        let report = project.run(RunMode::Apply, None, &mut store);

        assert_eq!(
            statuses(&report),
            vec![
                ("shop.seeds.setup_a", OutcomeStatus::Executed),
                ("shop.seeds.setup_b", OutcomeStatus::Failed),
                ("shop.seeds.setup_c", OutcomeStatus::Skipped),
            ]
        );
        assert!(report.outcomes[1]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("transaction control statements are not allowed"));
        assert_eq!(count(&store, "items"), 0);
    }

    #[test]
    fn conflict_rollback_in_a_unit_still_yields_a_report() {
        let project = Project::new(&["shop"]);
        project.seed("shop", "setup_a.sql", "INSERT INTO items VALUES ('a');");
        project.seed("shop", "setup_b.sql", "INSERT OR ROLLBACK INTO items VALUES ('a');");
        project.seed("shop", "setup_c.sql", "INSERT INTO items VALUES ('c');");
        let mut store = store();

        let report = project.run(RunMode::Apply, None, &mut store);

        assert_eq!(
            statuses(&report),
            vec![
                ("shop.seeds.setup_a", OutcomeStatus::Executed),
                ("shop.seeds.setup_b", OutcomeStatus::Failed),
                ("shop.seeds.setup_c", OutcomeStatus::Skipped),
            ]
        );
        let error = report.outcomes[1].error.as_deref().unwrap_or_default();
        assert!(error.contains("seed unit ended the surrounding transaction"), "{error}");
        assert!(error.contains("UNIQUE constraint failed: items.name"), "{error}");
        assert_eq!(count(&store, "items"), 0);
        assert!(store.connection().is_autocommit());
    }

    #[test]
    fn non_atomic_failure_only_affects_its_own_unit() {
        let project = Project::new(&["shop"]).non_atomic();
        three_entries_second_broken(&project);
        let mut store = store();

        let report = project.run(RunMode::Apply, None, &mut store);

        assert_eq!(
            statuses(&report),
            vec![
                ("shop.seeds.setup_a", OutcomeStatus::Executed),
                ("shop.seeds.setup_b", OutcomeStatus::Failed),
                ("shop.seeds.setup_c", OutcomeStatus::Executed),
            ]
        );
        assert!(!report.atomic);
        let names: Vec<String> = store
            .connection()
            .prepare("SELECT name FROM items ORDER BY name")
            .expect("prepare")
            .query_map([], |r| r.get(0))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn second_apply_creates_no_new_rows() {
        let project = Project::new(&["accounts", "blog"]);
        project.seed(
            "accounts",
            "setup_users.sql",
            "INSERT OR IGNORE INTO users VALUES ('admin'), ('editor');",
        );
        project.seed(
            "blog",
            "setup_posts.sql",
            "-- depends: accounts.seeds.setup_users\nINSERT OR IGNORE INTO posts VALUES ('hello', 'admin');",
        );
        let mut store = store();

        let first = project.run(RunMode::Apply, None, &mut store);
        let rows = (count(&store, "users"), count(&store, "posts"));
        let second = project.run(RunMode::Apply, None, &mut store);

        assert_eq!(rows, (2, 1));
        assert_eq!((count(&store, "users"), count(&store, "posts")), rows);
        assert_eq!(first.summary.executed, 2);
        assert_eq!(second.summary.executed, 2);
        assert!(!second.has_failures());
    }

    #[test]
    fn list_and_dry_run_leave_the_database_untouched() {
        let project = Project::new(&["shop"]);
        project.seed("shop", "setup_a.sql", "INSERT INTO items VALUES ('a');");
        project.seed("shop", "setup_b.sql", "DROP TABLE items;");
        let mut store = store();

        let listed = project.run(RunMode::List, None, &mut store);
        let dry = project.run(RunMode::DryRun, None, &mut store);

        for report in [&listed, &dry] {
            assert_eq!(report.summary.total, 2);
            assert_eq!(report.summary.skipped, 2);
            assert!(!report.has_failures());
        }
        assert_eq!(count(&store, "items"), 0);
    }

    #[test]
    fn dry_run_reports_unresolvable_units_as_failed() {
        let project = Project::new(&["blog"]);
        project.seed("blog", "setup_a.sql", "-- depends: ghost.seeds.setup_x\nSELECT 1;");
        project.seed("blog", "setup_b.sql", "-- depends:\nSELECT 1;");
        project.seed("blog", "setup_c.sql", "SELECT 1;");
        let mut store = store();

        let report = project.run(RunMode::DryRun, None, &mut store);

        assert_eq!(
            statuses(&report),
            vec![
                ("blog.seeds.setup_a", OutcomeStatus::Failed),
                ("blog.seeds.setup_b", OutcomeStatus::Failed),
                ("blog.seeds.setup_c", OutcomeStatus::Skipped),
            ]
        );
        assert!(report.outcomes[1]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("line 1"));
    }

    #[test]
    fn apps_filter_restricts_plan_and_unknown_names_plan_nothing() {
        let project = Project::new(&["accounts", "blog"]);
        project.seed("accounts", "setup_users.sql", "INSERT OR IGNORE INTO users VALUES ('admin');");
        project.seed("blog", "setup_tags.sql", "SELECT 1;");
        let mut store = store();

        let only_blog = project.run(RunMode::List, Some(&["blog"]), &mut store);
        assert_eq!(statuses(&only_blog), vec![("blog.seeds.setup_tags", OutcomeStatus::Skipped)]);

        let ghost = project.run(RunMode::Apply, Some(&["ghost"]), &mut store);
        assert_eq!(ghost.summary.total, 0);
        assert_eq!(count(&store, "users"), 0);
    }

    #[test]
    fn filtered_out_dependency_still_runs_and_is_reported_separately() {
        let project = Project::new(&["accounts", "blog"]);
        project.seed("accounts", "setup_users.sql", "INSERT OR IGNORE INTO users VALUES ('admin');");
        project.seed(
            "blog",
            "setup_posts.sql",
            "-- depends: accounts.seeds.setup_users\nINSERT OR IGNORE INTO posts VALUES ('hello', 'admin');",
        );
        let mut store = store();

        let report = project.run(RunMode::Apply, Some(&["blog"]), &mut store);

        assert_eq!(statuses(&report), vec![("blog.seeds.setup_posts", OutcomeStatus::Executed)]);
        let deps: Vec<_> = report.dependencies.iter().map(|d| d.dotted_path.as_str()).collect();
        assert_eq!(deps, vec!["accounts.seeds.setup_users"]);
        assert_eq!(count(&store, "posts"), 1);
    }

    #[test]
    fn cycle_is_rejected_before_any_sql_runs() {
        let project = Project::new(&["shop"]);
        project.seed(
            "shop",
            "setup_a.sql",
            "-- depends: shop.seeds.setup_b\nINSERT INTO items VALUES ('a');",
        );
        project.seed(
            "shop",
            "setup_b.sql",
            "-- depends: shop.seeds.setup_a\nINSERT INTO items VALUES ('b');",
        );
        let mut store = store();

        let err = Runner::new(&project.settings)
            .run(RunMode::Apply, None, Some(&mut store), &mut Silent)
            .expect_err("cycle");
        match err {
            SeedError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec!["shop.seeds.setup_a", "shop.seeds.setup_b", "shop.seeds.setup_a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(count(&store, "items"), 0);
    }

    #[test]
    fn apply_without_a_store_is_a_configuration_error() {
        let project = Project::new(&["shop"]);
        let err = Runner::new(&project.settings)
            .run(RunMode::Apply, None, None, &mut Silent)
            .expect_err("no store");
        assert_eq!(err.code(), "CONFIGURATION");
    }

    #[test]
    fn planning_is_deterministic() {
        let project = Project::new(&["blog", "accounts"]);
        project.seed("accounts", "setup_users.sql", "SELECT 1;");
        project.seed("blog", "setup_z.sql", "SELECT 1;");
        project.seed("blog", "setup_a.sql", "SELECT 1;");
        let runner = Runner::new(&project.settings);

        let first = runner.plan(None).expect("plan");
        let second = runner.plan(None).expect("plan");
        assert_eq!(first, second);
        assert_eq!(first.applications(), vec!["blog", "accounts"]);
    }
}
