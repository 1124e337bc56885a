#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use rusqlite::Connection;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SETTINGS: &str = r#"
database = "var/seed.db"

[[apps]]
name = "core"
path = "core"

[[apps]]
name = "accounts"
path = "accounts"

[[apps]]
name = "blog"
path = "blog"

[[apps]]
name = "legacy"
path = "legacy"

[seedkit]
EXCLUDE_APPS = ["legacy"]
placeholder_service = "picsum"
log_level = "warn"
"#;

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().canonicalize().expect("canonical project root");
        make_fixture_project(&root);
        Self { _tmp: tmp, root }
    }

    /// Command running from the project root, isolated from the caller's env.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("seedkit");
        cmd.current_dir(&self.root)
            .env_remove("SEEDKIT_SETTINGS")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    /// Like `run_json`, for invocations expected to exit non-zero.
    pub fn run_json_failure(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .args(args)
            .assert()
            .failure()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn write_seed(&self, app: &str, file: &str, sql: &str) {
        write_seed(&self.root, app, file, sql);
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("var/seed.db")
    }

    /// Row count, or 0 when the table (or the database) does not exist.
    pub fn count(&self, table: &str) -> i64 {
        if !self.db_path().exists() {
            return 0;
        }
        let conn = Connection::open(self.db_path()).expect("open seeded db");
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |r| r.get(0),
            )
            .expect("query schema");
        if exists == 0 {
            return 0;
        }
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .expect("count rows")
    }

    pub fn counter(&self, name: &str) -> i64 {
        let conn = Connection::open(self.db_path()).expect("open seeded db");
        conn.query_row("SELECT n FROM counters WHERE name = ?1", [name], |r| r.get(0))
            .expect("counter value")
    }
}

pub fn dotted_paths(outcomes: &Value) -> Vec<String> {
    outcomes
        .as_array()
        .expect("outcome array")
        .iter()
        .map(|o| o["dotted_path"].as_str().expect("dotted_path").to_string())
        .collect()
}

pub fn statuses(outcomes: &Value) -> Vec<(String, String)> {
    outcomes
        .as_array()
        .expect("outcome array")
        .iter()
        .map(|o| {
            (
                o["dotted_path"].as_str().expect("dotted_path").to_string(),
                o["status"].as_str().expect("status").to_string(),
            )
        })
        .collect()
}

fn write_seed(root: &Path, app: &str, file: &str, sql: &str) {
    let dir = root.join(app).join("seeds");
    fs::create_dir_all(&dir).expect("create seed dir");
    fs::write(dir.join(file), sql).expect("write seed file");
}

fn make_fixture_project(root: &Path) {
    fs::write(root.join("seedkit.toml"), SETTINGS).expect("write settings");

    write_seed(
        root,
        "core",
        "setup_schema.sql",
        "-- Tables shared by every application.
CREATE TABLE IF NOT EXISTS users (username TEXT PRIMARY KEY, slug TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS posts (
    slug TEXT PRIMARY KEY,
    author TEXT NOT NULL REFERENCES users(username),
    image TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS counters (name TEXT PRIMARY KEY, n INTEGER NOT NULL);
INSERT OR IGNORE INTO counters VALUES ('users_body', 0);
",
    );

    write_seed(
        root,
        "accounts",
        "setup_users.sql",
        "-- depends: core.seeds.setup_schema
UPDATE counters SET n = n + 1 WHERE name = 'users_body';
INSERT OR IGNORE INTO users VALUES ('admin', seedkit_slug('Admin Üser'));
INSERT OR IGNORE INTO users VALUES ('editor', seedkit_slug('Editor'));
SELECT seedkit_log('users ready', 'success');
",
    );

    write_seed(
        root,
        "blog",
        "setup_posts.sql",
        "-- depends: accounts.seeds.setup_users
INSERT OR IGNORE INTO posts VALUES ('hello-world', 'admin', seedkit_placeholder_image('hello-world'));
",
    );

    write_seed(
        root,
        "blog",
        "setup_tags.sql",
        "-- depends: accounts.seeds.setup_users, core.seeds.setup_schema
CREATE TABLE IF NOT EXISTS tags (name TEXT PRIMARY KEY, created_by TEXT REFERENCES users(username));
INSERT OR IGNORE INTO tags VALUES ('rust', 'editor');
",
    );

    write_seed(
        root,
        "legacy",
        "setup_old.sql",
        "INSERT INTO table_that_never_existed VALUES (1);\n",
    );

    fs::write(root.join("blog/seeds/notes.txt"), "not a seed").expect("write stray file");
}
