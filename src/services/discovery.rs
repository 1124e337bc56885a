use crate::domain::errors::SeedError;
use crate::domain::models::{
    AppSummary, ApplicationDescriptor, Configuration, ExecutionPlan, SeedModuleRef,
};
use crate::services::locator::locate;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// An application selected for seeding together with its seed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSeedDir {
    pub app: ApplicationDescriptor,
    pub seed_dir: PathBuf,
}

/// Every seed unit of every registered application, keyed by dotted path.
///
/// Dependencies resolve against this, not against the plan, so a unit can
/// depend on one from an application the run did not select.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    units: HashMap<String, SeedModuleRef>,
}

impl Catalog {
    pub fn get(&self, dotted_path: &str) -> Option<&SeedModuleRef> {
        self.units.get(dotted_path)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }
}

/// Registry order is preserved; it is the first sort key of the plan.
pub fn enumerate(
    registry: &[ApplicationDescriptor],
    seed_dir_name: &str,
    excluded: &HashSet<String>,
    allow: Option<&HashSet<String>>,
) -> Vec<AppSeedDir> {
    let allow = allow.filter(|a| !a.is_empty());
    registry
        .iter()
        .filter(|app| !excluded.contains(&app.name))
        .filter(|app| allow.map(|a| a.contains(&app.name)).unwrap_or(true))
        .filter_map(|app| {
            let seed_dir = app.root_path.join(seed_dir_name);
            seed_dir.is_dir().then(|| AppSeedDir {
                app: app.clone(),
                seed_dir,
            })
        })
        .collect()
}

pub fn compile_pattern(config: &Configuration) -> Result<glob::Pattern, SeedError> {
    glob::Pattern::new(&config.file_pattern).map_err(|err| {
        SeedError::configuration(format!(
            "invalid file_pattern {:?}: {err}",
            config.file_pattern
        ))
    })
}

pub fn build_plan(
    project_root: &Path,
    registry: &[ApplicationDescriptor],
    config: &Configuration,
    allow: Option<&HashSet<String>>,
) -> Result<ExecutionPlan, SeedError> {
    let pattern = compile_pattern(config)?;
    let excluded: HashSet<String> = config.exclude_apps.iter().cloned().collect();

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for dir in enumerate(registry, &config.seed_dir, &excluded, allow) {
        for seed in seed_refs(project_root, &dir, &pattern) {
            if seen.insert(seed.dotted_path.clone()) {
                entries.push(seed);
            } else {
                tracing::warn!(
                    dotted_path = %seed.dotted_path,
                    app = %dir.app.name,
                    "seed module already planned by another application"
                );
            }
        }
    }
    tracing::debug!(entries = entries.len(), "execution plan built");
    Ok(ExecutionPlan { entries })
}

pub fn build_catalog(
    project_root: &Path,
    registry: &[ApplicationDescriptor],
    config: &Configuration,
) -> Result<Catalog, SeedError> {
    let pattern = compile_pattern(config)?;
    let mut units = HashMap::new();
    for dir in enumerate(registry, &config.seed_dir, &HashSet::new(), None) {
        for seed in seed_refs(project_root, &dir, &pattern) {
            units.entry(seed.dotted_path.clone()).or_insert(seed);
        }
    }
    Ok(Catalog { units })
}

/// Applications with a seed directory, ignoring any `--apps` filter.
pub fn summarize_apps(
    project_root: &Path,
    registry: &[ApplicationDescriptor],
    config: &Configuration,
) -> Result<Vec<AppSummary>, SeedError> {
    let pattern = compile_pattern(config)?;
    let excluded: HashSet<String> = config.exclude_apps.iter().cloned().collect();
    Ok(enumerate(registry, &config.seed_dir, &excluded, None)
        .into_iter()
        .map(|dir| AppSummary {
            seed_files: seed_refs(project_root, &dir, &pattern).len(),
            name: dir.app.name,
            root_path: dir.app.root_path,
            seed_dir: dir.seed_dir,
        })
        .collect())
}

fn seed_refs(project_root: &Path, dir: &AppSeedDir, pattern: &glob::Pattern) -> Vec<SeedModuleRef> {
    let seed_dir = dir
        .seed_dir
        .canonicalize()
        .unwrap_or_else(|_| dir.seed_dir.clone());
    if !seed_dir.starts_with(project_root) {
        tracing::debug!(
            app = %dir.app.name,
            seed_dir = %seed_dir.display(),
            "skipping application outside the project root"
        );
        return Vec::new();
    }

    locate(&seed_dir, pattern)
        .into_iter()
        .filter_map(|file_path| {
            let dotted_path = dotted_path(&file_path, project_root)?;
            Some(SeedModuleRef {
                application_name: dir.app.name.clone(),
                dotted_path,
                file_path,
            })
        })
        .collect()
}

/// `<root>/accounts/seeds/setup_users.sql` -> `accounts.seeds.setup_users`.
pub fn dotted_path(file_path: &Path, project_root: &Path) -> Option<String> {
    let rel = file_path.strip_prefix(project_root).ok()?.with_extension("");
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("."))
}
