//! Task identity and status.

use pipeliner_core::ConfigOptionDict;
use pipeliner_dataset::VIAMEDataset;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

pub type TaskKey = String;

/// The lifecycle of one task (one dataset run through one compiled pipeline).
///
/// Only [`TaskStatus::Success`] survives a reload; any other status is reset
/// to [`TaskStatus::Initialized`] when the job state is loaded, since a
/// crash mid-task leaves no resumable progress.
///
/// Persisted as the same integer values as the source's `TaskStatus(Enum)`
/// (`INITIALIZED=-1, ERROR=0, SUCCESS=1, RUNNING=2, CANCELLED=3`), not as a
/// string, so `job_state.json` stays on the documented on-disk schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Initialized,
    Error,
    Success,
    Running,
    Cancelled,
}

impl TaskStatus {
    pub fn is_complete(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error | TaskStatus::Cancelled)
    }
}

impl From<TaskStatus> for i64 {
    fn from(status: TaskStatus) -> i64 {
        match status {
            TaskStatus::Initialized => -1,
            TaskStatus::Error => 0,
            TaskStatus::Success => 1,
            TaskStatus::Running => 2,
            TaskStatus::Cancelled => 3,
        }
    }
}

impl TryFrom<i64> for TaskStatus {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(TaskStatus::Initialized),
            0 => Ok(TaskStatus::Error),
            1 => Ok(TaskStatus::Success),
            2 => Ok(TaskStatus::Running),
            3 => Ok(TaskStatus::Cancelled),
            other => Err(other),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64((*self).into())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        TaskStatus::try_from(value).map_err(|v| serde::de::Error::custom(format!("invalid TaskStatus value: {v}")))
    }
}

/// Metadata for a single task, as persisted in `datasets_meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMeta {
    pub compiled_fp: String,
    pub dataset: VIAMEDataset,
    pub output_config: HashMap<String, ConfigOptionDict>,
}
