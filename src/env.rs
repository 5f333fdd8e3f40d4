use once_cell::sync::Lazy;
pub use std::env::*;
use std::path::PathBuf;

pub static CWD: Lazy<PathBuf> = Lazy::new(|| current_dir().unwrap_or_else(|_| PathBuf::from(".")));

/// Directory that relative paths in the config file are resolved against.
pub static SERVMAN_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let root = var_path("SERVMAN_ROOT").unwrap_or_else(|| CWD.clone());
    if root.is_absolute() {
        root
    } else {
        CWD.join(root)
    }
});
pub static SERVMAN_CONFIG: Lazy<PathBuf> =
    Lazy::new(|| var_path("SERVMAN_CONFIG").unwrap_or_else(|| SERVMAN_ROOT.join("config.toml")));
pub static SERVMAN_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("SERVMAN_LOG").unwrap_or(log::LevelFilter::Info));
pub static SERVMAN_LOG_FILE: Lazy<Option<PathBuf>> = Lazy::new(|| var_path("SERVMAN_LOG_FILE"));
pub static SERVMAN_LOG_FILE_LEVEL: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("SERVMAN_LOG_FILE_LEVEL").unwrap_or(*SERVMAN_LOG));

fn var_path(name: &str) -> Option<PathBuf> {
    var(name).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}
