use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

pub const DEFAULT_LOG_DIR: &str = ".nudge/logs";

#[derive(Clone, Debug)]
pub struct LogSettings {
    /// File stem of the log file, e.g. `nudge-hub` writes `nudge-hub.log`.
    pub name: String,
    pub log_dir: String,
    pub debug: bool,
    pub stdout: bool,
}

/// Keeps the log file handle alive for the lifetime of the process.
pub struct LogGuard {
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl LogGuard {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

/// Installs the global subscriber. Returns `None` when a subscriber was
/// already set (tests, embedding).
pub fn init_logging(settings: &LogSettings) -> Option<LogGuard> {
    let level = match std::env::var("NUDGE_LOG_LEVEL") {
        Ok(level) if !level.trim().is_empty() => level,
        _ if settings.debug => "debug".to_string(),
        _ => "info".to_string(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let guard = match open_log_file(&settings.log_dir, &settings.name) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            LogGuard { file: None }
        }
    };
    let file = guard.file.clone();
    let stdout = settings.stdout;
    let make_writer = BoxMakeWriter::new(move || MultiWriter::new(file.clone(), stdout));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

struct MultiWriter {
    stdout: bool,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl MultiWriter {
    fn new(file: Option<Arc<Mutex<std::fs::File>>>, stdout: bool) -> Self {
        Self { stdout, file }
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stdout {
            let _ = io::stdout().write_all(buf);
        }
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.stdout {
            let _ = io::stdout().flush();
        }
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let _ = file.flush();
        }
        Ok(())
    }
}

fn open_log_file(log_dir: &str, name: &str) -> io::Result<LogGuard> {
    if log_dir.trim().is_empty() {
        return Ok(LogGuard { file: None });
    }
    let dir = PathBuf::from(log_dir);
    if std::fs::create_dir_all(&dir).is_err() {
        return Ok(LogGuard { file: None });
    }
    let path = dir.join(format!("{}.log", sanitize_component(name)));
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Flag, then env var, then the default directory. An explicitly empty
/// env value disables the log file.
pub fn resolve_log_dir(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = std::env::var("NUDGE_LOG_DIR") {
        return value.trim().to_string();
    }
    DEFAULT_LOG_DIR.to_string()
}

pub fn env_true(key: &str) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("nudge-log-test-{name}-{nanos}"))
    }

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_component("nudge/hub:1"), "nudge_hub_1");
        assert_eq!(sanitize_component("nudge-agent_2"), "nudge-agent_2");
    }

    #[test]
    fn empty_log_dir_disables_file() {
        let guard = open_log_file("  ", "nudge-hub").expect("open");
        assert!(!guard.has_file());
    }

    #[test]
    fn multi_writer_appends_to_log_file() {
        let dir = temp_dir("append");
        let guard = open_log_file(dir.to_str().expect("utf8"), "nudge-hub").expect("open");
        assert!(guard.has_file());
        let mut writer = MultiWriter::new(guard.file.clone(), false);
        writer.write_all(b"first\n").expect("write");
        writer.write_all(b"second\n").expect("write");
        writer.flush().expect("flush");
        let contents = std::fs::read_to_string(dir.join("nudge-hub.log")).expect("read");
        assert_eq!(contents, "first\nsecond\n");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn explicit_log_dir_flag_wins() {
        assert_eq!(resolve_log_dir("/var/log/nudge"), "/var/log/nudge");
    }
}
