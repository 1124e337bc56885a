//! Small helpers for seed units, exposed to SQL as scalar functions.
//!
//! - `seedkit_log(message [, level])`
//! - `seedkit_slug(text)`
//! - `seedkit_hash_id(text)`
//! - `seedkit_placeholder_image(seed [, width [, height]])`

use md5::{Digest, Md5};
use regex::Regex;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Null, ValueRef};
use rusqlite::Connection;
use std::sync::OnceLock;

const DEFAULT_IMAGE_WIDTH: i64 = 800;
const DEFAULT_IMAGE_HEIGHT: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Unknown names fall back to `Info`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "warning" | "warn" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Info => "  ",
            Self::Success => "  ✓ ",
            Self::Warning => "  ⚠ ",
            Self::Error => "  ✗ ",
        }
    }
}

pub fn format_log_line(message: &str, level: LogLevel) -> String {
    format!("{}{}", level.prefix(), message)
}

pub fn log(message: &str, level: LogLevel) {
    println!("{}", format_log_line(message, level));
}

/// URL-safe lowercase slug; common European letters are transliterated.
pub fn make_slug(text: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let mut folded = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        match c {
            'ä' | 'å' | 'à' | 'á' | 'â' | 'ã' => folded.push('a'),
            'ö' | 'ó' | 'ô' | 'õ' | 'ø' => folded.push('o'),
            'ü' | 'ù' | 'ú' | 'û' => folded.push('u'),
            'é' | 'è' | 'ê' | 'ë' => folded.push('e'),
            'í' | 'î' | 'ï' => folded.push('i'),
            'ç' | 'ć' => folded.push('c'),
            'ñ' | 'ń' => folded.push('n'),
            'ż' | 'ź' => folded.push('z'),
            'ß' => folded.push_str("ss"),
            'æ' => folded.push_str("ae"),
            'ł' => folded.push('l'),
            'ś' => folded.push('s'),
            other => folded.push(other),
        }
    }
    let re = NON_ALNUM.get_or_init(|| Regex::new("[^a-z0-9]+").expect("static regex"));
    re.replace_all(&folded, "-").trim_matches('-').to_string()
}

/// Stable 32-character hex identifier (MD5) for a string.
pub fn make_hash_id(value: &str) -> String {
    hex::encode(Md5::digest(value.as_bytes()))
}

pub fn placeholder_image(seed: &str, width: i64, height: i64, service: &str) -> String {
    if service == "placehold" {
        return format!("https://placehold.co/{width}x{height}");
    }
    format!("https://picsum.photos/seed/{seed}/{width}/{height}")
}

#[derive(Debug, Clone)]
pub struct HelperOptions {
    pub placeholder_service: String,
    /// Send `seedkit_log` output to stderr, keeping stdout for JSON.
    pub log_to_stderr: bool,
}

impl Default for HelperOptions {
    fn default() -> Self {
        Self {
            placeholder_service: "picsum".to_string(),
            log_to_stderr: false,
        }
    }
}

pub fn register_sql_functions(conn: &Connection, opts: &HelperOptions) -> rusqlite::Result<()> {
    let deterministic = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    let to_stderr = opts.log_to_stderr;
    conn.create_scalar_function("seedkit_log", -1, FunctionFlags::SQLITE_UTF8, move |ctx| {
        let message = text_arg(ctx, 0)?;
        let level = if ctx.len() > 1 {
            LogLevel::parse(&text_arg(ctx, 1)?)
        } else {
            LogLevel::Info
        };
        tracing::debug!(%message, ?level, "seed unit log");
        if to_stderr {
            eprintln!("{}", format_log_line(&message, level));
        } else {
            log(&message, level);
        }
        Ok(Null)
    })?;

    conn.create_scalar_function("seedkit_slug", 1, deterministic, |ctx| {
        Ok(make_slug(&text_arg(ctx, 0)?))
    })?;

    conn.create_scalar_function("seedkit_hash_id", 1, deterministic, |ctx| {
        Ok(make_hash_id(&text_arg(ctx, 0)?))
    })?;

    let service = opts.placeholder_service.clone();
    conn.create_scalar_function("seedkit_placeholder_image", -1, deterministic, move |ctx| {
        if ctx.is_empty() || ctx.len() > 3 {
            return Err(rusqlite::Error::UserFunctionError(
                "seedkit_placeholder_image(seed [, width [, height]])".into(),
            ));
        }
        let seed = text_arg(ctx, 0)?;
        let width = if ctx.len() > 1 { ctx.get::<i64>(1)? } else { DEFAULT_IMAGE_WIDTH };
        let height = if ctx.len() > 2 { ctx.get::<i64>(2)? } else { DEFAULT_IMAGE_HEIGHT };
        Ok(placeholder_image(&seed, width, height, &service))
    })?;

    Ok(())
}

/// Text form of any SQL value, so `seedkit_slug(42)` works too.
fn text_arg(ctx: &Context<'_>, idx: usize) -> rusqlite::Result<String> {
    if idx >= ctx.len() {
        return Err(rusqlite::Error::InvalidParameterCount(idx + 1, ctx.len()));
    }
    Ok(match ctx.get_raw(idx) {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    })
}
