use crate::domain::errors::ImportCause;
use crate::domain::models::SeedModuleRef;
use regex::Regex;
use std::sync::OnceLock;

const DEPENDS_DIRECTIVE: &str = "depends:";

/// A seed file read from disk: its declared dependencies and SQL body.
#[derive(Debug, Clone)]
pub struct SeedUnit {
    pub seed: SeedModuleRef,
    pub depends: Vec<String>,
    pub sql: String,
}

pub fn read_unit(seed: &SeedModuleRef) -> Result<SeedUnit, ImportCause> {
    let sql = std::fs::read_to_string(&seed.file_path).map_err(|source| ImportCause::Read {
        path: seed.file_path.clone(),
        source,
    })?;
    let depends = parse_depends(&sql)?;
    Ok(SeedUnit {
        seed: seed.clone(),
        depends,
        sql,
    })
}

/// Collects `-- depends: a.seeds.x, b.seeds.y` lines from the file header.
///
/// The header ends at the first line that is neither blank nor a `--` comment.
pub fn parse_depends(source: &str) -> Result<Vec<String>, ImportCause> {
    let mut depends: Vec<String> = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(comment) = trimmed.strip_prefix("--") else {
            break;
        };
        let Some(value) = comment.trim().strip_prefix(DEPENDS_DIRECTIVE) else {
            continue;
        };

        let names: Vec<&str> = value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Err(ImportCause::Directive {
                line: idx + 1,
                message: "empty dependency list".to_string(),
            });
        }
        for name in names {
            if !is_dotted_path(name) {
                return Err(ImportCause::Directive {
                    line: idx + 1,
                    message: format!("malformed seed module name {name:?}"),
                });
            }
            if !depends.iter().any(|d| d == name) {
                depends.push(name.to_string());
            }
        }
    }
    Ok(depends)
}

fn is_dotted_path(name: &str) -> bool {
    static DOTTED: OnceLock<Regex> = OnceLock::new();
    DOTTED
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+(\.[A-Za-z0-9_\-]+)*$").expect("static regex"))
        .is_match(name)
}
