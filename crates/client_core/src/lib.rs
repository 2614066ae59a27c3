//! Client side of the upload, recognize and poll workflow against a speech
//! recognition server.

pub mod api;
pub mod file;
pub mod orchestrator;
pub mod task;
pub mod view;

pub use api::{ApiError, HttpRecognitionApi, RecognitionApi};
pub use file::{SelectedFile, UploadPolicy};
pub use orchestrator::{
    DownloadedResult, OrchestratorConfig, OrchestratorError, OrchestratorEvent, UploadOrchestrator,
};
pub use task::UploadTask;
pub use view::{project, StepView, Tone, View};
