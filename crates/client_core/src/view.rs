//! Pure projection of the orchestrator state onto what the progress display shows.

use std::cmp::Ordering;

use shared::domain::{ProcessingStep, StepState, UploadState};

use crate::task::UploadTask;

pub const ERROR_LABEL: &str = "Error:";
const PERCENT_PER_STEP: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepView {
    pub step: ProcessingStep,
    pub state: StepState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub state: UploadState,
    pub drop_zone_visible: bool,
    pub progress_visible: bool,
    pub result_visible: bool,
    pub progress_percent: u8,
    pub status_text: String,
    pub tone: Tone,
    pub steps: [StepView; 4],
    pub download_target: Option<String>,
    pub file_counter: Option<(u32, u32)>,
}

pub fn project(task: Option<&UploadTask>) -> View {
    let Some(task) = task else {
        return View {
            state: UploadState::Idle,
            drop_zone_visible: true,
            progress_visible: false,
            result_visible: false,
            progress_percent: 0,
            status_text: String::new(),
            tone: Tone::Normal,
            steps: step_views(0.0),
            download_target: None,
            file_counter: None,
        };
    };

    let progress_percent = task.progress.clamp(0.0, 100.0).round() as u8;
    let (status_text, tone) = match (&task.state, &task.last_error) {
        (UploadState::Failed, Some(failure)) => {
            (format!("{ERROR_LABEL} {}", failure.message()), Tone::Error)
        }
        (UploadState::Failed, None) => (ERROR_LABEL.to_string(), Tone::Error),
        _ => (format!("Processed {progress_percent}%"), Tone::Normal),
    };
    let completed = task.state == UploadState::Completed;

    View {
        state: task.state,
        drop_zone_visible: task.state == UploadState::Idle,
        progress_visible: task.state.is_in_progress() || task.state == UploadState::Failed,
        result_visible: completed,
        progress_percent,
        status_text,
        tone,
        steps: step_views(task.progress),
        download_target: task.result_file.clone().filter(|_| completed),
        file_counter: task.file_counter,
    }
}

/// Index of the highlighted step; 4 means every step is complete.
pub fn current_step_index(progress: f64) -> usize {
    let buckets = (progress.clamp(0.0, 100.0) / PERCENT_PER_STEP).floor() as usize;
    buckets.min(ProcessingStep::ALL.len())
}

fn step_views(progress: f64) -> [StepView; 4] {
    let current = current_step_index(progress);
    std::array::from_fn(|index| StepView {
        step: ProcessingStep::ALL[index],
        state: match index.cmp(&current) {
            Ordering::Less => StepState::Complete,
            Ordering::Equal => StepState::Active,
            Ordering::Greater => StepState::Pending,
        },
    })
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
