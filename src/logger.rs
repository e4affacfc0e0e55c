use std::fs::OpenOptions;
use std::io::{ self, Write };
use std::sync::Mutex;
use chrono::Utc;

// order of log (Debug < Info < Warning < Error)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    fn as_str(&self) -> &str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// File-backed leveled logger shared across worker threads via `Arc`.
pub struct Logger {
    file_path: String,
    file_mutex: Mutex<()>,
    min_level: LogLevel,
}

impl Logger {
    pub fn new_with_level(file_path: &str, min_level: LogLevel) -> Result<Self, io::Error> {
        // ensure file exists
        OpenOptions::new().create(true).append(true).open(file_path)?;
        Ok(Logger {
            file_path: file_path.to_string(),
            file_mutex: Mutex::new(()),
            min_level,
        })
    }

    pub fn log(&self, level: LogLevel, message: &str) -> Result<(), io::Error> {
        if level < self.min_level {
            return Ok(());
        }

        let _guard = self.file_mutex.lock().unwrap();

        let timestamp = Utc::now();
        let formatted_message = format!(
            "[{}] [{}] {}\n",
            timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            level.as_str(),
            message
        );

        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        file.write_all(formatted_message.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn log_fmt(&self, level: LogLevel, args: std::fmt::Arguments) -> Result<(), io::Error> {
        if level < self.min_level {
            return Ok(());
        }
        self.log(level, &format!("{}", args))
    }

    pub fn info(&self, message: &str) -> Result<(), io::Error> {
        self.log(LogLevel::Info, message)
    }
    pub fn warn(&self, message: &str) -> Result<(), io::Error> {
        self.log(LogLevel::Warning, message)
    }
    pub fn error(&self, message: &str) -> Result<(), io::Error> {
        self.log(LogLevel::Error, message)
    }
    pub fn debug(&self, message: &str) -> Result<(), io::Error> {
        self.log(LogLevel::Debug, message)
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

#[macro_export]
macro_rules! log_info {
    (
        $logger:expr,
        $($arg:tt)*
    ) => {
        $logger.log_fmt($crate::logger::LogLevel::Info, format_args!($($arg)*))
    };
}
#[macro_export]
macro_rules! log_warn {
    (
        $logger:expr,
        $($arg:tt)*
    ) => {
        $logger.log_fmt($crate::logger::LogLevel::Warning, format_args!($($arg)*))
    };
}
#[macro_export]
macro_rules! log_error {
    (
        $logger:expr,
        $($arg:tt)*
    ) => {
        $logger.log_fmt($crate::logger::LogLevel::Error, format_args!($($arg)*))
    };
}
#[macro_export]
macro_rules! log_debug {
    (
        $logger:expr,
        $($arg:tt)*
    ) => {
        $logger.log_fmt($crate::logger::LogLevel::Debug, format_args!($($arg)*))
    };
}
