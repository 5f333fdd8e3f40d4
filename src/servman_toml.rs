//! Loading and validating config.toml.
//!
//! ```toml
//! [servers.backend]
//! directory = "backend"
//! command = "uvicorn app:main --port 8080"
//! executable = "uvicorn"
//! log_file = "logs/backend.log"
//! pid_file = "run/backend.pid"
//! ports = [8080]
//! ```
//!
//! Relative paths are resolved against the servman root. Any missing field or
//! wrongly typed value is a fatal error reported before a lifecycle action runs.

use crate::Result;
use crate::error::{ConfigError, ConfigParseError, TargetError, find_similar_server};
use crate::server::ServerDefinition;
use crate::settings::Settings;
use indexmap::IndexMap;
use std::path::{Component, Path, PathBuf};
use toml::{Table, Value};

/// Target name that selects every configured server.
pub const ALL_TARGETS: &str = "both";

const REQUIRED_FIELDS: [&str; 6] = [
    "directory",
    "command",
    "executable",
    "log_file",
    "pid_file",
    "ports",
];

/// The loaded configuration. Built once at startup and passed by reference
/// to every command; there is no global registry.
#[derive(Debug)]
pub struct ServmanToml {
    /// Servers in declaration order
    pub servers: IndexMap<String, ServerDefinition>,
    pub settings: Settings,
    pub path: PathBuf,
}

impl ServmanToml {
    pub fn read(path: &Path, root: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_str(&raw, path, root)?)
    }

    /// Parses config content without touching the filesystem. `path` is only
    /// used for error messages.
    pub fn parse_str(
        content: &str,
        path: &Path,
        root: &Path,
    ) -> std::result::Result<Self, ConfigError> {
        let doc: Table = toml::from_str(content)
            .map_err(|e| ConfigParseError::from_toml_error(path, content.to_string(), e))?;

        let settings = match doc.get("settings") {
            Some(value) => Settings::from_toml(value.clone())?,
            None => Settings::default(),
        };

        let Some(Value::Table(servers_section)) = doc.get("servers") else {
            return Err(ConfigError::MissingServers {
                path: path.to_path_buf(),
            });
        };

        let mut servers = IndexMap::new();
        for (key, entry) in servers_section {
            let Value::Table(entry) = entry else {
                return Err(ConfigError::NotATable {
                    server: key.clone(),
                });
            };
            let server = parse_server_entry(key, entry, root)?;
            servers.insert(key.clone(), server);
        }

        if servers.is_empty() {
            return Err(ConfigError::NoServers {
                path: path.to_path_buf(),
            });
        }
        trace!("loaded {} server(s) from {}", servers.len(), path.display());

        Ok(Self {
            servers,
            settings,
            path: path.to_path_buf(),
        })
    }

    /// Resolves a CLI target to the servers it names, in declaration order.
    pub fn resolve_targets(
        &self,
        target: &str,
    ) -> std::result::Result<Vec<&ServerDefinition>, TargetError> {
        if target == ALL_TARGETS {
            return Ok(self.servers.values().collect());
        }
        match self.servers.get(target) {
            Some(server) => Ok(vec![server]),
            None => Err(TargetError::UnknownServer {
                name: target.to_string(),
                available: self.servers.keys().cloned().collect(),
                suggestion: find_similar_server(target, self.servers.keys().map(String::as_str)),
            }),
        }
    }
}

fn parse_server_entry(
    key: &str,
    entry: &Table,
    root: &Path,
) -> std::result::Result<ServerDefinition, ConfigError> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| !entry.contains_key(**field))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingFields {
            server: key.to_string(),
            fields: missing,
        });
    }
    for extra in entry.keys().filter(|k| !REQUIRED_FIELDS.contains(&k.as_str())) {
        warn!("server '{key}': ignoring unknown field '{extra}'");
    }

    let executable = match &entry["executable"] {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        other => return Err(invalid(key, "executable", other, "a non-empty string")),
    };

    Ok(ServerDefinition {
        key: key.to_string(),
        directory: resolve_path(key, "directory", &entry["directory"], root)?,
        command: normalize_command(key, &entry["command"])?,
        executable,
        log_file: resolve_path(key, "log_file", &entry["log_file"], root)?,
        pid_file: resolve_path(key, "pid_file", &entry["pid_file"], root)?,
        ports: normalize_ports(key, &entry["ports"])?,
    })
}

fn invalid(server: &str, field: &str, value: &Value, expected: &str) -> ConfigError {
    ConfigError::InvalidField {
        server: server.to_string(),
        field: field.to_string(),
        reason: format!("expected {expected}, got {}", value.type_str()),
    }
}

fn resolve_path(
    server: &str,
    field: &str,
    value: &Value,
    root: &Path,
) -> std::result::Result<PathBuf, ConfigError> {
    let Value::String(raw) = value else {
        return Err(invalid(server, field, value, "a path string"));
    };
    if raw.is_empty() {
        return Err(invalid(server, field, value, "a non-empty path"));
    }
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        Ok(normalize(&candidate))
    } else {
        Ok(normalize(&root.join(candidate)))
    }
}

/// Lexically removes `.` and `..` components; the path does not need to exist.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn normalize_command(server: &str, value: &Value) -> std::result::Result<Vec<String>, ConfigError> {
    let parts = match value {
        Value::String(s) => shell_words::split(s).map_err(|e| ConfigError::InvalidField {
            server: server.to_string(),
            field: "command".to_string(),
            reason: e.to_string(),
        })?,
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(invalid(server, "command", other, "an array of strings")),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        other => {
            return Err(invalid(
                server,
                "command",
                other,
                "a string or an array of strings",
            ));
        }
    };
    if parts.is_empty() || parts[0].is_empty() {
        return Err(ConfigError::EmptyCommand {
            server: server.to_string(),
        });
    }
    Ok(parts)
}

fn normalize_ports(server: &str, value: &Value) -> std::result::Result<Vec<u16>, ConfigError> {
    let Value::Array(items) = value else {
        return Err(invalid(server, "ports", value, "an array of integers"));
    };
    if items.is_empty() {
        return Err(ConfigError::InvalidField {
            server: server.to_string(),
            field: "ports".to_string(),
            reason: "at least one port is required".to_string(),
        });
    }
    let mut ports = Vec::with_capacity(items.len());
    for item in items {
        let port = match item {
            Value::Integer(n) => u16::try_from(*n).ok().filter(|p| *p > 0),
            other => return Err(invalid(server, "ports", other, "integer port numbers")),
        };
        match port {
            Some(port) if !ports.contains(&port) => ports.push(port),
            Some(_) => {}
            None => {
                return Err(ConfigError::InvalidField {
                    server: server.to_string(),
                    field: "ports".to_string(),
                    reason: format!("{item} is not a valid port (1-65535)"),
                });
            }
        }
    }
    Ok(ports)
}
