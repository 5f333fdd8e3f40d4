use std::fmt::Display;
use std::path::PathBuf;

/// A fully resolved server entry from config.toml.
///
/// All paths are absolute by the time a `ServerDefinition` exists; nothing in
/// the lifecycle code resolves paths lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDefinition {
    pub key: String,
    pub directory: PathBuf,
    /// Program followed by its arguments. Never empty.
    pub command: Vec<String>,
    /// Name checked against PATH before spawning
    pub executable: String,
    pub log_file: PathBuf,
    pub pid_file: PathBuf,
    /// Ports the server is expected to listen on. Never empty.
    pub ports: Vec<u16>,
}

impl ServerDefinition {
    pub fn program(&self) -> &str {
        &self.command[0]
    }

    pub fn args(&self) -> &[String] {
        &self.command[1..]
    }

    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }

    pub fn display_ports(&self) -> String {
        self.ports.iter().map(u16::to_string).collect::<Vec<_>>().join(", ")
    }
}

impl Display for ServerDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_split() {
        let def = ServerDefinition {
            key: "backend".to_string(),
            directory: PathBuf::from("/srv/backend"),
            command: vec!["uvicorn".into(), "app:main".into(), "--port".into(), "8080".into()],
            executable: "uvicorn".to_string(),
            log_file: PathBuf::from("/srv/logs/backend.log"),
            pid_file: PathBuf::from("/srv/run/backend.pid"),
            ports: vec![8080, 8443],
        };
        assert_eq!(def.program(), "uvicorn");
        assert_eq!(def.args(), ["app:main", "--port", "8080"]);
        assert_eq!(def.display_command(), "uvicorn app:main --port 8080");
        assert_eq!(def.display_ports(), "8080, 8443");
        assert_eq!(def.to_string(), "backend");
    }
}
