//! Transient status-line notices

use chrono::{DateTime, Local, TimeDelta};

/// How long a notice stays on screen.
pub const NOTICE_TTL_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
    pub at: DateTime<Local>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Local::now(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}｜{}｜{}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.level.label(),
            self.message
        )
    }

    pub fn is_expired_at(&self, now: DateTime<Local>) -> bool {
        now - self.at >= TimeDelta::seconds(NOTICE_TTL_SECS)
    }
}
