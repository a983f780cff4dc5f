//! The per-job task-status state machine, persisted to `job_state.json`.

use crate::error::StoreError;
use crate::json_store::JsonStore;
use crate::layout::job_state_json_path;
use crate::task::{TaskKey, TaskStatus};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStateData {
    pub tasks: Vec<TaskKey>,
    pub task_status: BTreeMap<TaskKey, TaskStatus>,
    pub task_outputs: BTreeMap<TaskKey, Vec<Utf8PathBuf>>,
    pub total_tasks: usize,
    pub initialized: bool,
}

pub struct JobState {
    store: JsonStore<JobStateData>,
}

impl JobState {
    /// Initialize a brand-new job's state. Fails if a state file already
    /// exists and is initialized, or if `task_keys` is empty.
    pub fn create(root: &Utf8Path, task_keys: Vec<TaskKey>) -> Result<Self, StoreError> {
        let path = job_state_json_path(root);
        if path.exists() {
            let existing: JobStateData = serde_json::from_str(
                &std::fs::read_to_string(&path).map_err(|e| StoreError::Io {
                    path: path.clone(),
                    source: e,
                })?,
            )
            .unwrap_or(JobStateData {
                tasks: vec![],
                task_status: BTreeMap::new(),
                task_outputs: BTreeMap::new(),
                total_tasks: 0,
                initialized: false,
            });
            if existing.initialized {
                return Err(StoreError::AlreadyInitialized(root.to_path_buf()));
            }
        }
        if task_keys.is_empty() {
            return Err(StoreError::NoTasks(root.to_path_buf()));
        }

        let mut tasks = task_keys;
        tasks.sort();
        let data = JobStateData {
            task_status: tasks.iter().cloned().map(|k| (k, TaskStatus::Initialized)).collect(),
            task_outputs: tasks.iter().cloned().map(|k| (k, Vec::new())).collect(),
            total_tasks: tasks.len(),
            tasks,
            initialized: true,
        };
        let store = JsonStore::create(path, data)?;
        Ok(Self { store })
    }

    /// Load an existing job's state. Any task not in [`TaskStatus::Success`]
    /// is reset to [`TaskStatus::Initialized`] (no task ever resumes RUNNING,
    /// ERROR, or CANCELLED).
    pub fn load(root: &Utf8Path) -> Result<Self, StoreError> {
        let path = job_state_json_path(root);
        if !path.exists() {
            return Err(StoreError::NotInitialized(root.to_path_buf()));
        }
        let mut store = JsonStore::<JobStateData>::load(path)?;
        if !store.data().initialized {
            return Err(StoreError::NotInitialized(root.to_path_buf()));
        }
        let to_reset: Vec<TaskKey> = store
            .data()
            .task_status
            .iter()
            .filter(|(_, s)| **s != TaskStatus::Success)
            .map(|(k, _)| k.clone())
            .collect();
        if !to_reset.is_empty() {
            store.update(|data| {
                for key in &to_reset {
                    data.task_status.insert(key.clone(), TaskStatus::Initialized);
                }
            })?;
        }
        Ok(Self { store })
    }

    pub fn tasks(&self) -> &[TaskKey] {
        &self.store.data().tasks
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<TaskKey> {
        self.tasks()
            .iter()
            .filter(|k| self.get_status(k) == Some(status))
            .cloned()
            .collect()
    }

    pub fn get_status(&self, task: &str) -> Option<TaskStatus> {
        self.store.data().task_status.get(task).copied()
    }

    pub fn set_task_status(&mut self, task: &str, status: TaskStatus) -> Result<(), StoreError> {
        let task = task.to_string();
        self.store.update(|data| {
            data.task_status.insert(task, status);
        })
    }

    pub fn set_task_outputs(&mut self, task: &str, outputs: Vec<Utf8PathBuf>) -> Result<(), StoreError> {
        let task = task.to_string();
        self.store.update(|data| {
            data.task_outputs.insert(task, outputs);
        })
    }

    pub fn get_task_outputs(&self, task: &str) -> Option<Vec<Utf8PathBuf>> {
        match self.store.data().task_outputs.get(task) {
            Some(outputs) if !outputs.is_empty() => Some(outputs.clone()),
            _ => None,
        }
    }

    pub fn is_task_complete(&self, task: &str) -> bool {
        self.get_status(task).is_some_and(TaskStatus::is_complete)
    }

    pub fn is_job_complete(&self) -> bool {
        self.tasks().iter().all(|t| self.is_task_complete(t))
    }

    /// The first, in sorted order, task that is not yet complete.
    pub fn current_task(&self) -> Option<TaskKey> {
        self.tasks().iter().find(|t| !self.is_task_complete(t)).cloned()
    }

    pub fn completed_tasks(&self) -> Vec<TaskKey> {
        self.tasks().iter().filter(|t| self.is_task_complete(t)).cloned().collect()
    }
}
