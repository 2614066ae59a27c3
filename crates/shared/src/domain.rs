use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(TaskId);

/// Lifecycle of the single live upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Uploading,
    Recognizing,
    Polling,
    Completed,
    Failed,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Uploading | Self::Recognizing | Self::Polling)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStep {
    Convert,
    Split,
    Recognize,
    Complete,
}

impl ProcessingStep {
    pub const ALL: [ProcessingStep; 4] = [
        ProcessingStep::Convert,
        ProcessingStep::Split,
        ProcessingStep::Recognize,
        ProcessingStep::Complete,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Convert => "convert",
            Self::Split => "split",
            Self::Recognize => "recognize",
            Self::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Active,
    Complete,
}
