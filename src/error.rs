//! Diagnostic error types reported through miette.
//!
//! Configuration errors are fatal for the whole invocation. Precondition and
//! launch errors are scoped to a single server; the CLI logs them and moves on
//! to the next target.

// False positive: fields are used in #[error] format strings and miette derive macros
#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading and validating the configuration file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("configuration file not found at {}", path.display())]
    #[diagnostic(
        code(servman::config::not_found),
        help("create a config.toml with a [servers] section, or point SERVMAN_CONFIG at one")
    )]
    NotFound { path: PathBuf },

    #[error("failed to read configuration file: {}", path.display())]
    #[diagnostic(code(servman::config::read_error))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ConfigParseError),

    #[error("[servers] section missing or invalid in {}", path.display())]
    #[diagnostic(
        code(servman::config::missing_servers),
        help("define each server in a [servers.<name>] table")
    )]
    MissingServers { path: PathBuf },

    #[error("no server definitions found in {}", path.display())]
    #[diagnostic(code(servman::config::no_servers))]
    NoServers { path: PathBuf },

    #[error("server '{server}' entry must be a table")]
    #[diagnostic(code(servman::config::not_a_table))]
    NotATable { server: String },

    #[error("server '{server}' missing required fields: {}", fields.join(", "))]
    #[diagnostic(
        code(servman::config::missing_fields),
        help("every server needs directory, command, executable, log_file, pid_file and ports")
    )]
    MissingFields { server: String, fields: Vec<String> },

    #[error("server '{server}' field '{field}' is invalid: {reason}")]
    #[diagnostic(code(servman::config::invalid_field))]
    InvalidField {
        server: String,
        field: String,
        reason: String,
    },

    #[error("server '{server}' command cannot be empty")]
    #[diagnostic(code(servman::config::empty_command))]
    EmptyCommand { server: String },

    #[error("invalid setting '{key}': {reason}")]
    #[diagnostic(
        code(servman::config::invalid_setting),
        help("durations are written like \"2s\", \"500ms\" or \"1m\"")
    )]
    InvalidSetting { key: String, reason: String },
}

/// Error for TOML syntax failures with source code highlighting.
#[derive(Debug, Error, Diagnostic)]
#[error("failed to parse configuration")]
#[diagnostic(code(servman::config::parse_error))]
pub struct ConfigParseError {
    #[source_code]
    pub src: NamedSource<String>,

    #[label("{message}")]
    pub span: SourceSpan,

    pub message: String,

    #[help]
    pub help: Option<String>,
}

impl ConfigParseError {
    pub fn from_toml_error(path: &std::path::Path, contents: String, err: toml::de::Error) -> Self {
        let message = err.message().to_string();
        let span = err
            .span()
            .map(|r| SourceSpan::from(r.start..r.end))
            .unwrap_or_else(|| SourceSpan::from(0..0));

        Self {
            src: NamedSource::new(path.display().to_string(), contents),
            span,
            message,
            help: Some("check TOML syntax at https://toml.io".to_string()),
        }
    }
}

/// Per-server checks that run before anything is spawned.
#[derive(Debug, Error, Diagnostic)]
pub enum PreconditionError {
    #[error("[{server}] directory '{}' not found", dir.display())]
    #[diagnostic(
        code(servman::start::directory_not_found),
        help("check the 'directory' entry for this server in config.toml")
    )]
    DirectoryNotFound { server: String, dir: PathBuf },

    #[error("[{server}] required executable '{executable}' is not on PATH")]
    #[diagnostic(
        code(servman::start::executable_not_found),
        help("install it or add its location to PATH")
    )]
    ExecutableNotFound { server: String, executable: String },
}

/// Failures while spawning a server process.
#[derive(Debug, Error, Diagnostic)]
pub enum LaunchError {
    #[error("[{server}] failed to spawn '{program}'")]
    #[diagnostic(code(servman::start::spawn_failed))]
    Spawn {
        server: String,
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("[{server}] process exited before its PID could be captured")]
    #[diagnostic(
        code(servman::start::no_pid),
        help("check the server log for startup errors")
    )]
    NoPid { server: String },

    #[error("[{server}] cannot open log file {}", path.display())]
    #[diagnostic(code(servman::start::log_file))]
    LogFile {
        server: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("[{server}] failed to record PID in {}", path.display())]
    #[diagnostic(code(servman::start::pid_file))]
    PidFile {
        server: String,
        path: PathBuf,
        #[help]
        details: Option<String>,
    },
}

/// Errors selecting which servers an action applies to.
#[derive(Debug, Error, Diagnostic)]
pub enum TargetError {
    #[error("unknown server '{name}'. Available: {}", available.join(", "))]
    #[diagnostic(code(servman::target::unknown))]
    UnknownServer {
        name: String,
        available: Vec<String>,
        #[help]
        suggestion: Option<String>,
    },
}

/// Find the most similar server name for suggestions.
pub fn find_similar_server<'a>(
    name: &str,
    available: impl Iterator<Item = &'a str>,
) -> Option<String> {
    use fuzzy_matcher::FuzzyMatcher;
    use fuzzy_matcher::skim::SkimMatcherV2;

    let matcher = SkimMatcherV2::default();
    available
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, name)
                .map(|score| (candidate, score))
        })
        .max_by_key(|(_, score)| *score)
        .filter(|(_, score)| *score > 0)
        .map(|(candidate, _)| format!("did you mean '{candidate}'?"))
}
