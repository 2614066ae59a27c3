use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

/// Multipart field name carrying the audio file on `POST /upload`.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizeRequest {
    pub filename: String,
}

/// `POST /recognize` answers with a task to poll, or with the finished result
/// when the server recognized synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecognizeResponse {
    Queued { task_id: TaskId },
    Finished { result_file: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_file: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_files: Option<u32>,
}

impl StatusResponse {
    pub fn processing(progress: f64) -> Self {
        Self {
            status: TaskStatus::Processing,
            progress: Some(progress),
            result_file: None,
            error: None,
            current_file: None,
            total_files: None,
        }
    }

    pub fn completed(result_file: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Completed,
            progress: Some(100.0),
            result_file: Some(result_file.into()),
            error: None,
            current_file: None,
            total_files: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Error,
            progress: None,
            result_file: None,
            error: Some(error.into()),
            current_file: None,
            total_files: None,
        }
    }

    pub fn file_counter(&self) -> Option<(u32, u32)> {
        Some((self.current_file?, self.total_files?))
    }
}

/// Body the server attaches to rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
