// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostics for a bad `ingatin.toml` or `INGATIN_*` variable.
//!
//! Each error names the dotted key (`supabase.anon_key`) and, where it
//! helps, the environment variable that sets the same key. Unknown keys
//! get the closest valid key as a hint.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "INGATIN_";

/// Minimum Jaro-Winkler score for a suggestion. Catches `anon_kye` -> `anon_key`
/// and `heartbeat_sec` -> `heartbeat_secs` without suggesting unrelated keys.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A problem with the dashboard configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key no section of `ingatin.toml` knows about.
    #[error("unknown key `{key}` {}", section_label(section.as_deref()))]
    #[diagnostic(
        code(ingatin::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// `None` for a stray top-level table.
        section: Option<String>,
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        valid_keys: String,
        #[label("not an Ingat-In setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not fit the key, from a file or the environment.
    #[error("`{key}` from {origin} has the wrong type: {detail}")]
    #[diagnostic(
        code(ingatin::config::invalid_type),
        help("expected {expected}; `{key}` can also be set with {}", env_var(key))
    )]
    InvalidType {
        /// Dotted path, e.g. `realtime.heartbeat_secs`.
        key: String,
        detail: String,
        expected: String,
        origin: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(ingatin::config::missing_key),
        help("add `{key}` to ingatin.toml or set {}", env_var(key))
    )]
    MissingKey { key: String },

    /// A value that parsed but makes no sense for the dashboard.
    #[error("invalid setting: {message}")]
    #[diagnostic(
        code(ingatin::config::validation),
        help("fix the value in ingatin.toml or its INGATIN_* override")
    )]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(ingatin::config::other))]
    Other(String),
}

/// The environment variable that overrides dotted `key`.
pub fn env_var(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "_").to_ascii_uppercase())
}

fn section_label(section: Option<&str>) -> String {
    match section {
        Some(section) => format!("in [{section}]"),
        None => "at the top level".to_string(),
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Accepted here: {valid_keys}"),
        None => format!("accepted here: {valid_keys}"),
    }
}

/// Where a figment error came from: the file path, or the provider name
/// (the environment, built-in defaults).
fn origin(error: &figment::error::Error) -> String {
    match &error.metadata {
        Some(metadata) => match &metadata.source {
            Some(figment::Source::File(path)) => path.display().to_string(),
            _ => metadata.name.to_string(),
        },
        None => "configuration".to_string(),
    }
}

fn dotted_path(error: &figment::error::Error) -> String {
    error.path.join(".")
}

/// Convert a `figment::Error` (which may carry several errors) into diagnostics.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let valid_keys: Vec<&str> = expected.to_vec();
                let suggestion = suggest_key(field, &valid_keys);
                let (span, src) = find_source_span(&error, field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    section: error.path.first().cloned(),
                    suggestion,
                    valid_keys: valid_keys.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => {
                let path = dotted_path(&error);
                ConfigError::MissingKey {
                    key: if path.is_empty() {
                        field.to_string()
                    } else {
                        format!("{path}.{field}")
                    },
                }
            }
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: dotted_path(&error),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
                origin: origin(&error),
            },
            _ => ConfigError::Other(format!("{error}")),
        })
        .collect()
}

/// Locate the offending key inside the TOML file the error came from.
fn find_source_span(
    error: &figment::error::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let source_path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline strings have no file metadata; fall back to the only source given.
    let source = match source_path {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };

    if let Some((path, content)) = source {
        let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
        if let Some(offset) = find_key_offset(content, &section, field) {
            let span = SourceSpan::new(offset.into(), field.len());
            let named = NamedSource::new(path, content.clone());
            return (Some(span), Some(named));
        }
    }

    (None, None)
}

/// Byte offset of `field` in TOML `content`, searching after the `[section]` header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
        None => 0,
    };

    let mut byte_offset = 0;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field)
            && (after.starts_with(' ') || after.starts_with('=') || after.starts_with('\t'))
        {
            let indent = line.len() - trimmed.len();
            return Some(search_start + byte_offset + indent);
        }
        byte_offset += line.len();
    }

    None
}

/// Best valid key above the similarity threshold, if any.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    eprintln!(
        "ingatin: {} configuration problem{} found",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
