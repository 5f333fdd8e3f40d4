use crate::env;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

struct Logger {
    level: LevelFilter,
    term_level: LevelFilter,
    file_level: LevelFilter,
    log_file: Option<Mutex<File>>,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if record.level() <= self.file_level
            && let Some(log_file) = &self.log_file
        {
            let mut log_file = log_file.lock().unwrap_or_else(|e| e.into_inner());
            let out = format!(
                "{} {} {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                self.styled_level(record.level(), false),
                record.args()
            );
            let _ = writeln!(log_file, "{}", console::strip_ansi_codes(&out));
        }
        if record.level() <= self.term_level {
            let out = self.render(record);
            if !out.is_empty() {
                eprintln!("{out}");
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: Lazy<Logger> = Lazy::new(Logger::init);

impl Logger {
    fn init() -> Self {
        let term_level = *env::SERVMAN_LOG;
        let file_level = *env::SERVMAN_LOG_FILE_LEVEL;

        let mut logger = Logger {
            level: std::cmp::max(term_level, file_level),
            term_level,
            file_level,
            log_file: None,
        };

        if let Some(path) = &*env::SERVMAN_LOG_FILE {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => logger.log_file = Some(Mutex::new(f)),
                Err(e) => eprintln!("servman: could not open log file {}: {e}", path.display()),
            }
        }

        logger
    }

    fn render(&self, record: &Record) -> String {
        match record.level() {
            Level::Info => record.args().to_string(),
            level => format!("{} {}", self.styled_level(level, true), record.args()),
        }
    }

    fn styled_level(&self, level: Level, color: bool) -> String {
        let s = format!("{:<5}", level.to_string().to_uppercase());
        if !color {
            return s;
        }
        let style = console::Style::new().for_stderr();
        match level {
            Level::Error => style.red().bold().apply_to(s).to_string(),
            Level::Warn => style.yellow().bold().apply_to(s).to_string(),
            Level::Info => style.cyan().apply_to(s).to_string(),
            Level::Debug => style.magenta().apply_to(s).to_string(),
            Level::Trace => style.dim().apply_to(s).to_string(),
        }
    }
}

pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if let Err(err) = log::set_logger(&*LOGGER).map(|()| log::set_max_level(LOGGER.level)) {
            eprintln!("servman: could not initialize logger: {err}");
        }
    });
}
