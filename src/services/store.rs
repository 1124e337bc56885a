use crate::domain::errors::{ImportCause, SeedError};
use crate::services::helpers::{register_sql_functions, HelperOptions};
use crate::services::unit::SeedUnit;
use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::{Batch, Connection};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// SQLite database the seed units run against.
pub struct SeedStore {
    conn: Connection,
}

impl SeedStore {
    pub fn open(path: &Path, helpers: &HelperOptions) -> Result<Self, SeedError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    SeedError::configuration(format!(
                        "failed to create database directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }
        Self::init(Connection::open(path)?, helpers)
    }

    #[cfg(test)]
    pub fn in_memory(helpers: &HelperOptions) -> Result<Self, SeedError> {
        Self::init(Connection::open_in_memory()?, helpers)
    }

    fn init(conn: Connection, helpers: &HelperOptions) -> Result<Self, SeedError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        register_sql_functions(&conn, helpers)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Where a loaded seed unit's SQL goes.
pub trait ExecutionScope {
    fn execute(&mut self, unit: &SeedUnit) -> Result<(), ImportCause>;
}

/// Runs every unit inside one transaction owned by the caller.
pub struct SharedTransaction<'a> {
    conn: &'a Connection,
}

impl<'a> SharedTransaction<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ExecutionScope for SharedTransaction<'_> {
    fn execute(&mut self, unit: &SeedUnit) -> Result<(), ImportCause> {
        run_guarded(self.conn, &unit.sql)
    }
}

/// Commits each unit on its own; a failing unit leaves nothing behind.
pub struct PerUnitTransaction<'a> {
    conn: &'a mut Connection,
}

impl<'a> PerUnitTransaction<'a> {
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }
}

impl ExecutionScope for PerUnitTransaction<'_> {
    fn execute(&mut self, unit: &SeedUnit) -> Result<(), ImportCause> {
        let tx = self.conn.transaction()?;
        run_guarded(&tx, &unit.sql)?;
        tx.commit()?;
        Ok(())
    }
}

/// Runs a unit's script inside a transaction the unit does not own.
///
/// `BEGIN`, `COMMIT`, `END` and `ROLLBACK` are refused when prepared, so
/// nothing a unit does can commit work early. A conflict clause such as
/// `INSERT OR ROLLBACK` can still end the transaction while failing; that
/// surfaces as [`ImportCause::TransactionEnded`].
fn run_guarded(conn: &Connection, sql: &str) -> Result<(), ImportCause> {
    let refused = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&refused);
    conn.authorizer(Some(move |ctx: AuthContext<'_>| match ctx.action {
        AuthAction::Transaction { .. } => {
            flag.store(true, Ordering::Relaxed);
            Authorization::Deny
        }
        _ => Authorization::Allow,
    }));
    let result = run_script(conn, sql);
    conn.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);

    match result {
        Err(_) if refused.load(Ordering::Relaxed) => Err(ImportCause::TransactionControl),
        Err(err) if conn.is_autocommit() => Err(ImportCause::TransactionEnded(err)),
        other => other.map_err(ImportCause::Sql),
    }
}

/// Runs every statement of a script, draining any rows a `SELECT` yields
/// so helper calls like `SELECT seedkit_log(..)` take effect.
fn run_script(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next()? {
        let mut rows = stmt.query([])?;
        while rows.next()?.is_some() {}
    }
    Ok(())
}

/// Resolves units without touching the database.
pub struct ValidateOnly;

impl ExecutionScope for ValidateOnly {
    fn execute(&mut self, _unit: &SeedUnit) -> Result<(), ImportCause> {
        Ok(())
    }
}
