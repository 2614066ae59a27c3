use std::{sync::Arc, time::Duration};

use shared::{
    domain::{TaskId, UploadState},
    error::{
        FailureKind, TaskFailure, MISSING_RESULT_FILE, RECOGNIZE_FAILED, STATUS_FAILED,
        TASK_CANCELLED, UNKNOWN_SERVER_ERROR, UPLOAD_FAILED,
    },
    protocol::{RecognizeResponse, StatusResponse, TaskStatus},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    api::{ApiError, RecognitionApi},
    file::{SelectedFile, UploadPolicy},
    task::UploadTask,
    view::{project, View},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STALL_WARNING_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    pub stall_warning_after: Duration,
    pub upload_policy: UploadPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stall_warning_after: DEFAULT_STALL_WARNING_AFTER,
            upload_policy: UploadPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    ViewChanged(View),
    Finished(UploadTask),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no recognition result has been recorded")]
    NoResult,
    #[error("failed to fetch result: {0}")]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone)]
pub struct DownloadedResult {
    pub filename: String,
    pub url: Url,
    pub bytes: Vec<u8>,
}

/// Why a worker stopped before reaching a terminal state on its own.
enum Halt {
    Superseded,
    Failed(TaskFailure),
}

impl From<TaskFailure> for Halt {
    fn from(value: TaskFailure) -> Self {
        Self::Failed(value)
    }
}

struct Session {
    generation: u64,
    task: Option<UploadTask>,
    worker: Option<JoinHandle<()>>,
}

/// Drives one upload through recognize and status polling, and mirrors every
/// transition as a [`View`] on the event channel.
pub struct UploadOrchestrator {
    api: Arc<dyn RecognitionApi>,
    config: OrchestratorConfig,
    inner: Mutex<Session>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl UploadOrchestrator {
    pub fn new(api: Arc<dyn RecognitionApi>) -> Arc<Self> {
        Self::with_config(api, OrchestratorConfig::default())
    }

    pub fn with_config(api: Arc<dyn RecognitionApi>, config: OrchestratorConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            config,
            inner: Mutex::new(Session {
                generation: 0,
                task: None,
                worker: None,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Option<UploadTask> {
        self.inner.lock().await.task.clone()
    }

    pub async fn state(&self) -> UploadState {
        self.inner
            .lock()
            .await
            .task
            .as_ref()
            .map_or(UploadState::Idle, |task| task.state)
    }

    pub async fn view(&self) -> View {
        project(self.inner.lock().await.task.as_ref())
    }

    /// Abandons whatever task is live, including its poll timer, and starts a new one.
    pub async fn submit_file(self: &Arc<Self>, file: SelectedFile) {
        let mut session = self.inner.lock().await;
        if let Some(previous) = session.worker.take() {
            previous.abort();
            debug!(generation = session.generation, "abandoned previous task");
        }

        session.generation += 1;
        let generation = session.generation;
        session.task = Some(UploadTask::new(file.name()));
        info!(
            generation,
            filename = file.name(),
            size_bytes = file.len(),
            "upload started"
        );
        self.publish(&session);

        let orchestrator = Arc::clone(self);
        session.worker = Some(tokio::spawn(async move {
            orchestrator.run(generation, file).await;
        }));
    }

    pub async fn download_target(&self) -> Result<Url, OrchestratorError> {
        let filename = self.result_file().await?;
        Ok(self.api.download_url(&filename)?)
    }

    pub async fn download_result(&self) -> Result<DownloadedResult, OrchestratorError> {
        let filename = self.result_file().await?;
        let url = self.api.download_url(&filename)?;
        info!(%url, "downloading result");
        let bytes = self.api.download(&filename).await?;
        Ok(DownloadedResult {
            filename,
            url,
            bytes,
        })
    }

    async fn result_file(&self) -> Result<String, OrchestratorError> {
        let session = self.inner.lock().await;
        session
            .task
            .as_ref()
            .filter(|task| task.state == UploadState::Completed)
            .and_then(|task| task.result_file.clone())
            .ok_or(OrchestratorError::NoResult)
    }

    async fn run(self: Arc<Self>, generation: u64, file: SelectedFile) {
        match self.drive(generation, &file).await {
            Ok(()) => {}
            Err(Halt::Superseded) => {
                debug!(generation, "task superseded by a newer upload");
            }
            Err(Halt::Failed(failure)) => {
                warn!(
                    generation,
                    kind = ?failure.kind(),
                    error = %failure,
                    "task failed"
                );
                let _ = self.transition(generation, |task| task.fail(failure)).await;
            }
        }
    }

    async fn drive(&self, generation: u64, file: &SelectedFile) -> Result<(), Halt> {
        if let Err(message) = self.config.upload_policy.check(file) {
            return Err(TaskFailure::new(FailureKind::Upload, message).into());
        }
        let contents = file
            .contents()
            .await
            .map_err(|e| TaskFailure::new(FailureKind::Upload, format!("{e:#}")))?;

        let uploaded = self
            .api
            .upload(file, contents)
            .await
            .map_err(|e| step_failure(FailureKind::Upload, UPLOAD_FAILED, e))?;
        info!(generation, server_filename = %uploaded.filename, "upload finished");
        self.transition(generation, |task| {
            task.server_filename = Some(uploaded.filename.clone());
            task.state = UploadState::Recognizing;
        })
        .await?;

        let recognized = self
            .api
            .recognize(&uploaded.filename)
            .await
            .map_err(|e| step_failure(FailureKind::Recognize, RECOGNIZE_FAILED, e))?;
        match recognized {
            RecognizeResponse::Finished { result_file } => {
                info!(generation, %result_file, "recognition finished synchronously");
                self.transition(generation, |task| task.complete(result_file))
                    .await
            }
            RecognizeResponse::Queued { task_id } => {
                info!(generation, %task_id, "recognition queued");
                self.transition(generation, |task| {
                    task.task_id = Some(task_id.clone());
                    task.state = UploadState::Polling;
                })
                .await?;
                self.poll_status(generation, task_id).await
            }
        }
    }

    /// Runs until the server reports a terminal status or a fetch fails. The
    /// timer is dropped with this future, so aborting the worker cancels it.
    async fn poll_status(&self, generation: u64, task_id: TaskId) -> Result<(), Halt> {
        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stall = StallWatch::new(self.config.stall_warning_after, Instant::now());

        loop {
            ticker.tick().await;
            let status = self
                .api
                .status(&task_id)
                .await
                .map_err(|e| step_failure(FailureKind::StatusFetch, STATUS_FAILED, e))?;
            debug!(
                generation,
                %task_id,
                status = ?status.status,
                progress = ?status.progress,
                "status polled"
            );

            let advanced = self
                .transition(generation, |task| apply_status_counters(task, &status))
                .await?;
            if let Some(stalled_for) = stall.observe(advanced, Instant::now()) {
                warn!(
                    generation,
                    %task_id,
                    stalled_secs = stalled_for.as_secs(),
                    "progress has not changed"
                );
            }

            match status.status {
                TaskStatus::Processing => continue,
                TaskStatus::Completed => {
                    let Some(result_file) = status.result_file else {
                        return Err(
                            TaskFailure::new(FailureKind::ServerReported, MISSING_RESULT_FILE)
                                .into(),
                        );
                    };
                    info!(generation, %task_id, %result_file, "recognition completed");
                    return self
                        .transition(generation, |task| task.complete(result_file))
                        .await;
                }
                TaskStatus::Error => {
                    let message = status
                        .error
                        .unwrap_or_else(|| UNKNOWN_SERVER_ERROR.to_string());
                    return Err(TaskFailure::new(FailureKind::ServerReported, message).into());
                }
                TaskStatus::Cancelled => {
                    return Err(
                        TaskFailure::new(FailureKind::ServerReported, TASK_CANCELLED).into(),
                    );
                }
            }
        }
    }

    /// Applies `update` to the live task if `generation` still owns it, then
    /// republishes the view.
    async fn transition<R>(
        &self,
        generation: u64,
        update: impl FnOnce(&mut UploadTask) -> R,
    ) -> Result<R, Halt> {
        let mut session = self.inner.lock().await;
        if session.generation != generation {
            return Err(Halt::Superseded);
        }
        let Some(task) = session.task.as_mut() else {
            return Err(Halt::Superseded);
        };
        let outcome = update(task);
        let finished = task.state.is_terminal().then(|| task.clone());
        self.publish(&session);
        if let Some(task) = finished {
            let _ = self.events.send(OrchestratorEvent::Finished(task));
        }
        Ok(outcome)
    }

    fn publish(&self, session: &Session) {
        let _ = self
            .events
            .send(OrchestratorEvent::ViewChanged(project(session.task.as_ref())));
    }
}

fn step_failure(kind: FailureKind, status_message: &str, error: ApiError) -> TaskFailure {
    let message = match error {
        ApiError::Status { .. } => status_message.to_string(),
        other => other.to_string(),
    };
    TaskFailure::new(kind, message)
}

/// Returns true when the reported progress moved the task forward.
fn apply_status_counters(task: &mut UploadTask, status: &StatusResponse) -> bool {
    if let Some(counter) = status.file_counter() {
        task.file_counter = Some(counter);
    }
    status
        .progress
        .is_some_and(|progress| task.record_progress(progress))
}

/// Tracks how long polled progress has stood still. The clock starts when
/// polling starts, and each stall is reported once.
struct StallWatch {
    threshold: Duration,
    changed_at: Instant,
    reported: bool,
}

impl StallWatch {
    fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            changed_at: now,
            reported: false,
        }
    }

    fn observe(&mut self, advanced: bool, now: Instant) -> Option<Duration> {
        if advanced {
            self.changed_at = now;
            self.reported = false;
            return None;
        }
        let stalled_for = now.saturating_duration_since(self.changed_at);
        if self.reported || stalled_for < self.threshold {
            return None;
        }
        self.reported = true;
        Some(stalled_for)
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
