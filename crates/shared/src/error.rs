use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UPLOAD_FAILED: &str = "Ошибка загрузки файла";
pub const RECOGNIZE_FAILED: &str = "Ошибка распознавания";
pub const STATUS_FAILED: &str = "Ошибка получения статуса";
pub const UNSUPPORTED_FORMAT: &str = "Недопустимый формат файла";
pub const FILE_TOO_LARGE: &str = "Файл слишком большой";
pub const EMPTY_FILE: &str = "Файл не выбран";
pub const TASK_CANCELLED: &str = "task cancelled";
pub const UNKNOWN_SERVER_ERROR: &str = "unknown server error";
pub const MISSING_RESULT_FILE: &str = "task completed without a result file";

/// Which step of the job went wrong. Every kind surfaces the same way to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Upload,
    Recognize,
    StatusFetch,
    ServerReported,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("{0}")]
    Upload(String),
    #[error("{0}")]
    Recognize(String),
    #[error("{0}")]
    StatusFetch(String),
    #[error("{0}")]
    ServerReported(String),
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            FailureKind::Upload => Self::Upload(message),
            FailureKind::Recognize => Self::Recognize(message),
            FailureKind::StatusFetch => Self::StatusFetch(message),
            FailureKind::ServerReported => Self::ServerReported(message),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Upload(_) => FailureKind::Upload,
            Self::Recognize(_) => FailureKind::Recognize,
            Self::StatusFetch(_) => FailureKind::StatusFetch,
            Self::ServerReported(_) => FailureKind::ServerReported,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Upload(message)
            | Self::Recognize(message)
            | Self::StatusFetch(message)
            | Self::ServerReported(message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_verbatim_message() {
        let failure = TaskFailure::new(FailureKind::Upload, UPLOAD_FAILED);
        assert_eq!(failure.to_string(), UPLOAD_FAILED);
        assert_eq!(failure.kind(), FailureKind::Upload);
        assert_eq!(failure.message(), UPLOAD_FAILED);
    }
}
