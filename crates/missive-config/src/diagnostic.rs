// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors are turned into miette reports. Keys that came from a TOML
//! file point at the offending line; keys that came from the environment name
//! the `MISSIVE_*` variable so the operator knows what to unset.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::{env_var_for, ENV_PREFIX, SECTIONS};

/// Jaro-Winkler score a candidate needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key in a TOML file that no section accepts.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(missive::config::unknown_key),
        help("{}", unknown_key_help(key, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted path, e.g. `queue.max_attempt`, or the bare section name.
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a missive setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A `MISSIVE_*` variable that does not map onto any setting.
    #[error("unknown environment variable `{var}`")]
    #[diagnostic(
        code(missive::config::unknown_env),
        help("{}", unknown_env_help(suggestion.as_deref()))
    )]
    UnknownEnvVar {
        var: String,
        /// The variable the operator probably meant.
        suggestion: Option<String>,
    },

    /// A setting whose value does not have the expected shape.
    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(
        code(missive::config::invalid_value),
        help("{}", invalid_value_help(key, env_var.as_deref()))
    )]
    InvalidValue {
        key: String,
        detail: String,
        /// Set when the value came from the environment.
        env_var: Option<String>,
        #[label("{detail}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value deserialized fine but violates a semantic constraint.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(
        code(missive::config::validation),
        help("set `{key}` in the [{}] section of missive.toml or via {}", section_of(key), env_var_for(key))
    )]
    Validation {
        /// Dotted path of the offending key, e.g. `worker.pacing_min_secs`.
        key: String,
        message: String,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(missive::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Dotted key this error refers to, when known.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::UnknownKey { key, .. }
            | ConfigError::InvalidValue { key, .. }
            | ConfigError::Validation { key, .. } => Some(key),
            ConfigError::UnknownEnvVar { .. } | ConfigError::Other(_) => None,
        }
    }
}

fn section_of(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

fn unknown_key_help(key: &str, suggestion: Option<&str>, valid_keys: &str) -> String {
    let noun = if key.contains('.') { "keys" } else { "sections" };
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid {noun}: {valid_keys}"),
        None => format!("valid {noun}: {valid_keys}"),
    }
}

fn unknown_env_help(suggestion: Option<&str>) -> String {
    let form = format!("variables take the form {ENV_PREFIX}<SECTION>_<KEY>");
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {form}"),
        None => form,
    }
}

fn invalid_value_help(key: &str, env_var: Option<&str>) -> String {
    match env_var {
        Some(var) => format!("fix or unset `{var}`"),
        None => format!("fix `{key}` in missive.toml"),
    }
}

/// Convert a `figment::Error` into diagnostics, one per underlying error.
///
/// `toml_sources` holds `(path, content)` of every file that was merged so
/// file-originated errors can carry a span.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::Error, toml_sources: &[(String, String)]) -> ConfigError {
    let path: Vec<&str> = error.path.iter().map(String::as_str).collect();
    let from_env = is_env_origin(error);

    match &error.kind {
        Kind::UnknownField(field, expected) if from_env => {
            let section = parent_of(&path, field);
            let flat = join_path(section, field).replace('.', "_");
            ConfigError::UnknownEnvVar {
                var: format!("{ENV_PREFIX}{}", flat.to_ascii_uppercase()),
                suggestion: suggest_env_var(section, field, expected),
            }
        }
        Kind::UnknownField(field, expected) => {
            let section = parent_of(&path, field);
            let key = join_path(section, field);
            let origin = file_origin(error);
            let (span, src) = toml_sources
                .iter()
                .find(|(path, _)| Some(path.as_str()) == origin.as_deref())
                .and_then(|(path, content)| {
                    locate_key(content, section.first().copied(), field).map(|span| {
                        (Some(span), Some(NamedSource::new(path, content.clone())))
                    })
                })
                .unwrap_or((None, None));
            ConfigError::UnknownKey {
                key,
                suggestion: closest(field, expected.iter().copied()).map(str::to_string),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
            let key = path.join(".");
            let detail = format!("found {actual}, expected {expected}");
            if from_env {
                return ConfigError::InvalidValue {
                    env_var: Some(env_var_for(&key)),
                    key,
                    detail,
                    span: None,
                    src: None,
                };
            }
            let (span, src) = value_span(error, &path, toml_sources);
            ConfigError::InvalidValue {
                key,
                detail,
                env_var: None,
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// The section an unknown field sits in. Figment's error path may or may not
/// already end with the field itself.
fn parent_of<'a>(path: &'a [&'a str], field: &str) -> &'a [&'a str] {
    match path.split_last() {
        Some((last, parent)) if *last == field => parent,
        _ => path,
    }
}

fn join_path(section: &[&str], field: &str) -> String {
    section
        .iter()
        .copied()
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

fn is_env_origin(error: &figment::Error) -> bool {
    error
        .metadata
        .as_ref()
        .is_some_and(|m| m.name.contains("environment variable"))
}

fn file_origin(error: &figment::Error) -> Option<String> {
    match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => Some(path.display().to_string()),
        _ => None,
    }
}

/// Span of the key whose value failed to deserialize, e.g. `tick_interval_ms`
/// inside `[worker]`.
fn value_span(
    error: &figment::Error,
    path: &[&str],
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = file_origin(error);
    let (Some(field), Some(origin)) = (path.last(), origin) else {
        return (None, None);
    };
    let section = if path.len() > 1 { path.first().copied() } else { None };
    toml_sources
        .iter()
        .find(|(p, _)| *p == origin)
        .and_then(|(p, content)| {
            locate_key(content, section, field)
                .map(|span| (Some(span), Some(NamedSource::new(p, content.clone()))))
        })
        .unwrap_or((None, None))
}

/// Suggest the env var the operator likely meant.
///
/// Inside a known section the field is corrected against that section's keys.
/// At the top level the section prefix itself is wrong, so it is corrected
/// against the known sections and the rest of the name is kept.
fn suggest_env_var(section: &[&str], field: &str, expected: &[&str]) -> Option<String> {
    if !section.is_empty() {
        let key = closest(field, expected.iter().copied())?;
        return Some(env_var_for(&join_path(section, key)));
    }
    let (section, rest) = split_section_prefix(field)?;
    Some(env_var_for(&format!("{section}.{rest}")))
}

/// Find the section whose name best matches the leading `_`-separated words of
/// `flat`, returning it with the remainder.
fn split_section_prefix(flat: &str) -> Option<(&'static str, &str)> {
    SECTIONS
        .iter()
        .filter_map(|&section| {
            let words = section.split('_').count();
            let cut = flat
                .match_indices('_')
                .nth(words - 1)
                .map(|(i, _)| i)?;
            let score = strsim::jaro_winkler(&flat[..cut], section);
            (score > SUGGESTION_THRESHOLD).then_some((section, &flat[cut + 1..], score))
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(section, rest, _)| (section, rest))
}

/// The candidate most similar to `unknown`, if any clears the threshold.
pub fn closest<'a>(unknown: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .into_iter()
        .map(|c| (c, strsim::jaro_winkler(unknown, c)))
        .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Locate `key = …` inside `[section]` of a TOML document. With no section the
/// key is looked up before the first header, or as a `[key]` header itself.
pub fn locate_key(content: &str, section: Option<&str>, key: &str) -> Option<SourceSpan> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header.split(']').next().map(str::trim);
            if section.is_none() && name == Some(key) {
                return Some(SourceSpan::new((offset + indent + 1).into(), key.len()));
            }
            current = name;
        } else if current == section
            && trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        {
            return Some(SourceSpan::new((offset + indent).into(), key.len()));
        }
        offset += line.len();
    }
    None
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
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

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str, span: SourceSpan) -> &str {
        &content[span.offset()..span.offset() + span.len()]
    }

    #[test]
    fn closest_picks_best_candidate() {
        let keys = ["max_attempts", "backoff_secs", "retention_days"];
        assert_eq!(closest("max_attempt", keys), Some("max_attempts"));
        assert_eq!(closest("apikey", ["base_url", "api_key"]), Some("api_key"));
        assert_eq!(closest("zzzzzz", keys), None);
    }

    #[test]
    fn locate_key_tracks_current_section() {
        let content = "max_attempts = 1\n[queue]\nretention_days = 3\nmax_attempts = 4\n\n[worker]\nmax_attempts = 9\n";
        let span = locate_key(content, Some("queue"), "max_attempts").unwrap();
        assert_eq!(text(content, span), "max_attempts");
        assert_eq!(&content[span.offset()..span.offset() + 16], "max_attempts = 4");

        let top = locate_key(content, None, "max_attempts").unwrap();
        assert_eq!(top.offset(), 0);
    }

    #[test]
    fn locate_key_finds_unknown_section_header() {
        let content = "[daemon]\nlog_level = \"info\"\n\n[agent]\nname = \"x\"\n";
        let span = locate_key(content, None, "agent").unwrap();
        assert_eq!(text(content, span), "agent");
    }

    #[test]
    fn locate_key_ignores_prefix_matches_and_other_sections() {
        let content = "[queue]\nmax_attempts_total = 1\n[email]\nmax_attempt = 2\n";
        assert!(locate_key(content, Some("queue"), "max_attempt").is_none());
    }

    #[test]
    fn env_suggestions_fix_key_or_section() {
        assert_eq!(
            suggest_env_var(&["queue"], "max_attempt", &["max_attempts", "backoff_secs"]),
            Some("MISSIVE_QUEUE_MAX_ATTEMPTS".to_string())
        );
        assert_eq!(
            suggest_env_var(&[], "qeue_max_attempts", SECTIONS),
            Some("MISSIVE_QUEUE_MAX_ATTEMPTS".to_string())
        );
        assert_eq!(
            suggest_env_var(&[], "rate_limt_retention_secs", SECTIONS),
            Some("MISSIVE_RATE_LIMIT_RETENTION_SECS".to_string())
        );
        assert_eq!(suggest_env_var(&[], "nonsense", SECTIONS), None);
    }

    #[test]
    fn parent_drops_trailing_field() {
        assert_eq!(parent_of(&["queue", "max_attempt"], "max_attempt"), &["queue"]);
        assert_eq!(parent_of(&["queue"], "max_attempt"), &["queue"]);
        assert!(parent_of(&["agent"], "agent").is_empty());
    }

    #[test]
    fn help_distinguishes_sections_from_keys() {
        assert!(unknown_key_help("agent", None, "queue").starts_with("valid sections"));
        assert!(unknown_key_help("queue.x", Some("y"), "y").contains("Valid keys"));
    }
}
