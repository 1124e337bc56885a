use crate::domain::errors::{ImportCause, SeedError};
use crate::domain::models::SeedModuleRef;
use crate::services::discovery::Catalog;
use crate::services::graph::ResolvedUnits;
use crate::services::runner::RunObserver;
use crate::services::store::ExecutionScope;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum UnitState {
    Loading,
    Executed,
    Failed(Arc<SeedError>),
}

/// Which units a run has already touched. Lives for exactly one run.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    states: HashMap<String, UnitState>,
    executed: Vec<String>,
}

impl ExecutionRegistry {
    pub fn state(&self, dotted_path: &str) -> Option<&UnitState> {
        self.states.get(dotted_path)
    }

    /// Dotted paths in the order their bodies ran.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    fn record(&mut self, dotted_path: &str, state: UnitState) {
        if matches!(state, UnitState::Executed) {
            self.executed.push(dotted_path.to_string());
        }
        self.states.insert(dotted_path.to_string(), state);
    }
}

/// Loads seed units dependencies-first, each at most once per run.
pub struct Loader<'a> {
    catalog: &'a Catalog,
    units: ResolvedUnits,
    scope: &'a mut dyn ExecutionScope,
    registry: ExecutionRegistry,
    via_dependency: Vec<SeedModuleRef>,
}

impl<'a> Loader<'a> {
    pub fn new(catalog: &'a Catalog, units: ResolvedUnits, scope: &'a mut dyn ExecutionScope) -> Self {
        Self {
            catalog,
            units,
            scope,
            registry: ExecutionRegistry::default(),
            via_dependency: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    /// Units first reached through a `depends` edge, in load order.
    pub fn loaded_as_dependency(&self) -> &[SeedModuleRef] {
        &self.via_dependency
    }

    /// Loads `dotted_path`, its dependencies first.
    ///
    /// A unit that already ran returns `Ok` without running again; one that
    /// already failed returns the same error again.
    pub fn load(
        &mut self,
        dotted_path: &str,
        observer: &mut dyn RunObserver,
    ) -> Result<(), Arc<SeedError>> {
        match self.registry.state(dotted_path) {
            Some(UnitState::Executed) => return Ok(()),
            Some(UnitState::Failed(err)) => return Err(Arc::clone(err)),
            Some(UnitState::Loading) => {
                return Err(Arc::new(SeedError::import(
                    dotted_path,
                    ImportCause::Reentrant(dotted_path.to_string()),
                )))
            }
            None => {}
        }

        self.registry.record(dotted_path, UnitState::Loading);
        match self.load_fresh(dotted_path, observer) {
            Ok(()) => {
                tracing::debug!(%dotted_path, "seed unit executed");
                self.registry.record(dotted_path, UnitState::Executed);
                Ok(())
            }
            Err(err) => {
                let err = Arc::new(err);
                tracing::debug!(%dotted_path, error = %err, "seed unit failed");
                self.registry.record(dotted_path, UnitState::Failed(Arc::clone(&err)));
                Err(err)
            }
        }
    }

    fn load_fresh(&mut self, dotted_path: &str, observer: &mut dyn RunObserver) -> Result<(), SeedError> {
        if let Some(cause) = self.units.failures.remove(dotted_path) {
            return Err(SeedError::import(dotted_path, cause));
        }
        let Some(unit) = self.units.units.remove(dotted_path) else {
            return Err(SeedError::import(
                dotted_path,
                ImportCause::UnknownModule(dotted_path.to_string()),
            ));
        };

        let catalog = self.catalog;
        for dep in &unit.depends {
            let Some(seed) = catalog.get(dep) else {
                return Err(SeedError::import(
                    dotted_path,
                    ImportCause::UnknownModule(dep.clone()),
                ));
            };
            if self.registry.state(dep).is_none() {
                observer.dependency_loaded(seed);
                self.via_dependency.push(seed.clone());
            }
            self.load(dep, observer).map_err(|source| {
                SeedError::import(
                    dotted_path,
                    ImportCause::DependencyFailed {
                        dotted_path: dep.clone(),
                        source,
                    },
                )
            })?;
        }

        self.scope
            .execute(&unit)
            .map_err(|cause| SeedError::import(dotted_path, cause))
    }
}
