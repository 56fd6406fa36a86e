use serde::Serialize;

use crate::pipeline::SpectrogramInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

/// Where a finished image can be fetched, with its numeric summary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Artifact {
    pub url: String,
    pub filename: String,
    #[serde(flatten)]
    pub info: SpectrogramInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskResult {
    pub spectrogram_2d: Artifact,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub result: Option<TaskResult>,
}

impl TaskRecord {
    pub fn pending(task_id: String) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            progress: 0,
            message: "Task created".to_string(),
            result: None,
        }
    }

    /// Move forward to `status` at `progress`. Terminal records, backwards
    /// steps and shrinking progress are ignored; returns whether the record
    /// changed.
    pub fn advance(&mut self, status: TaskStatus, progress: u8, message: &str) -> bool {
        if self.status.is_terminal() || status < self.status || progress < self.progress {
            log::warn!(
                "Task {}: refusing transition {:?}({}) -> {:?}({})",
                self.task_id,
                self.status,
                self.progress,
                status,
                progress
            );
            return false;
        }
        self.status = status;
        self.progress = progress.min(100);
        self.message = message.to_string();
        true
    }

    pub fn complete(&mut self, result: TaskResult) -> bool {
        if !self.advance(TaskStatus::Completed, 100, "Processing complete") {
            return false;
        }
        self.result = Some(result);
        true
    }

    /// Enter `error`, keeping the progress reached so far.
    pub fn fail(&mut self, message: &str) -> bool {
        let progress = self.progress;
        self.advance(TaskStatus::Error, progress, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> TaskResult {
        TaskResult {
            spectrogram_2d: Artifact {
                url: "/outputs/a.jpg".into(),
                filename: "a.jpg".into(),
                info: SpectrogramInfo {
                    duration: 1.0,
                    sample_rate: 8000,
                    frequency_bins: 513,
                    time_frames: 20,
                },
            },
        }
    }

    #[test]
    fn forward_path_to_completion() {
        let mut r = TaskRecord::pending("t".into());
        assert!(r.advance(TaskStatus::Processing, 10, "a"));
        assert!(r.advance(TaskStatus::Processing, 50, "b"));
        assert!(r.result.is_none());
        assert!(r.complete(result()));
        assert_eq!(r.status, TaskStatus::Completed);
        assert_eq!(r.progress, 100);
        assert!(r.result.is_some());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut r = TaskRecord::pending("t".into());
        r.advance(TaskStatus::Processing, 50, "b");
        assert!(r.fail("boom"));
        assert_eq!(r.progress, 50);
        assert!(!r.advance(TaskStatus::Processing, 90, "again"));
        assert!(!r.complete(result()));
        assert_eq!(r.status, TaskStatus::Error);
        assert_eq!(r.message, "boom");
    }

    #[test]
    fn progress_never_shrinks() {
        let mut r = TaskRecord::pending("t".into());
        r.advance(TaskStatus::Processing, 50, "b");
        assert!(!r.advance(TaskStatus::Processing, 10, "a"));
        assert_eq!(r.progress, 50);
    }

    #[test]
    fn serialises_like_a_status_document() {
        let mut r = TaskRecord::pending("t".into());
        r.advance(TaskStatus::Processing, 10, "a");
        r.complete(result());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"]["spectrogram_2d"]["frequency_bins"], 513);
        assert_eq!(json["result"]["spectrogram_2d"]["url"], "/outputs/a.jpg");
    }
}
