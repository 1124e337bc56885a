use std::path::PathBuf;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum SeedError {
    #[error("seed directory unreadable: {}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load seed module {dotted_path}")]
    SeedImport {
        dotted_path: String,
        #[source]
        cause: ImportCause,
    },
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("cyclic seed dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

/// Underlying reason a seed unit could not be loaded.
#[derive(thiserror::Error, Debug)]
pub enum ImportCause {
    #[error("could not read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid directive on line {line}: {message}")]
    Directive { line: usize, message: String },
    #[error("no seed module named {0}")]
    UnknownModule(String),
    #[error("dependency {dotted_path} failed")]
    DependencyFailed {
        dotted_path: String,
        #[source]
        source: Arc<SeedError>,
    },
    #[error("seed module re-entered while loading: {0}")]
    Reentrant(String),
    #[error("transaction control statements are not allowed in seed files")]
    TransactionControl,
    #[error("seed unit ended the surrounding transaction")]
    TransactionEnded(#[source] rusqlite::Error),
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

impl SeedError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn import(dotted_path: impl Into<String>, cause: impl Into<ImportCause>) -> Self {
        Self::SeedImport {
            dotted_path: dotted_path.into(),
            cause: cause.into(),
        }
    }

    /// Stable machine-readable code used in `--json` error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery { .. } => "DISCOVERY",
            Self::SeedImport { .. } => "SEED_IMPORT",
            Self::Configuration(_) => "CONFIGURATION",
            Self::CyclicDependency { .. } => "CYCLIC_DEPENDENCY",
            Self::Persistence(_) => "PERSISTENCE",
        }
    }
}
