use shared::{
    domain::{TaskId, UploadState},
    error::TaskFailure,
};

/// The one job the orchestrator tracks at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub file_name: String,
    pub server_filename: Option<String>,
    pub task_id: Option<TaskId>,
    pub result_file: Option<String>,
    pub state: UploadState,
    pub last_error: Option<TaskFailure>,
    /// Clamped to `[0, 100]` and never decreases within one task.
    pub progress: f64,
    pub file_counter: Option<(u32, u32)>,
}

impl UploadTask {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            server_filename: None,
            task_id: None,
            result_file: None,
            state: UploadState::Uploading,
            last_error: None,
            progress: 0.0,
            file_counter: None,
        }
    }

    /// Returns true when the stored progress moved forward.
    pub fn record_progress(&mut self, reported: f64) -> bool {
        if !reported.is_finite() {
            return false;
        }
        let clamped = reported.clamp(0.0, 100.0);
        if clamped <= self.progress {
            return false;
        }
        self.progress = clamped;
        true
    }

    pub fn complete(&mut self, result_file: String) {
        self.record_progress(100.0);
        self.result_file = Some(result_file);
        self.state = UploadState::Completed;
    }

    pub fn fail(&mut self, failure: TaskFailure) {
        self.last_error = Some(failure);
        self.state = UploadState::Failed;
    }
}
