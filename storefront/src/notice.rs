//! Success/error notifications for the presentation layer.

use serde::Serialize;
use std::fmt;

/// Notification severity (`type` on the wire)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    /// The operation succeeded
    Success,
    /// The operation failed
    Error,
}

/// `{type, message}` pair shown to the user after an operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity
    #[serde(rename = "type")]
    pub kind: NoticeKind,
    /// Text shown to the user
    pub message: String,
}

impl Notice {
    /// Success notice
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    /// Error notice
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    /// `success_message` on `Ok`, the error's display text on `Err`
    pub fn from_result<T, E: fmt::Display>(result: &Result<T, E>, success_message: &str) -> Self {
        match result {
            Ok(_) => Self::success(success_message),
            Err(error) => Self::error(error.to_string()),
        }
    }

    /// Whether this is an error notice
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.kind, NoticeKind::Error)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NoticeKind::Success => write!(f, "✓ {}", self.message),
            NoticeKind::Error => write!(f, "✗ {}", self.message),
        }
    }
}
