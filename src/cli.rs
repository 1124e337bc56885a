use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "seedkit", version, about = "Discover and run per-application seed files")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Project settings file (default: $SEEDKIT_SETTINGS or ./seedkit.toml)"
    )]
    pub settings: Option<String>,
    #[arg(long, global = true, help = "SQLite database path, overriding the settings file")]
    pub database: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run seed files, or list / validate them without touching the database.
    Seed(SeedArgs),
    /// Applications that have a seed directory.
    Apps,
    /// Resolved configuration.
    Config,
}

#[derive(Args, Debug, Default)]
pub struct SeedArgs {
    #[arg(long, conflicts_with = "dry_run", help = "List seed files without running them")]
    pub list: bool,
    #[arg(long, help = "Validate seed files and dependencies without running them")]
    pub dry_run: bool,
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "APP,...",
        help = "Only seed these applications"
    )]
    pub apps: Vec<String>,
    #[arg(long, help = "Commit each seed file on its own instead of one transaction")]
    pub no_atomic: bool,
}
