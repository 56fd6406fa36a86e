//! Asynchronous submit/poll wrapper around the render pipeline.
//!
//! A task moves `pending → processing → completed | error` exactly once.
//! Whatever the outcome, the uploaded temp file is removed.

pub mod record;
pub mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

pub use record::{Artifact, TaskRecord, TaskResult, TaskStatus};
pub use registry::{TaskHandle, TaskRegistry};

use crate::error::{Result, SpectrogramError};
use crate::pipeline::Pipeline;
use crate::render::RenderProfile;
use crate::storage::{self, Storage};
use crate::validate::{validate_upload, RenderRequest};

pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    storage: Arc<Storage>,
    registry: Arc<TaskRegistry>,
    max_upload_mb: u64,
}

impl Orchestrator {
    pub fn new(pipeline: Arc<Pipeline>, storage: Arc<Storage>, max_upload_mb: u64) -> Self {
        Self {
            pipeline,
            storage,
            registry: Arc::new(TaskRegistry::new()),
            max_upload_mb,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Validate `source`, copy it into the upload directory and start a task
    /// on it. Invalid files are rejected here, before any task exists, as is
    /// a call made outside a tokio runtime.
    pub fn submit_file(&self, source: &Path, request: RenderRequest) -> Result<String> {
        let runtime = current_runtime()?;
        validate_upload(source, self.max_upload_mb)?;
        let task_id = new_task_id();
        let upload = self.storage.stage_upload(&task_id, source)?;
        let original_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(self.spawn(&runtime, task_id, upload, original_name, request))
    }

    /// Start a task on an upload already written to the upload directory.
    /// The orchestrator takes ownership of `upload` and deletes it when the
    /// task ends, or straight away if no tokio runtime is running.
    pub fn submit(
        &self,
        task_id: String,
        upload: PathBuf,
        original_name: String,
        request: RenderRequest,
    ) -> Result<String> {
        let runtime = match current_runtime() {
            Ok(runtime) => runtime,
            Err(e) => {
                remove_upload(&upload);
                return Err(e);
            }
        };
        Ok(self.spawn(&runtime, task_id, upload, original_name, request))
    }

    fn spawn(
        &self,
        runtime: &Handle,
        task_id: String,
        upload: PathBuf,
        original_name: String,
        request: RenderRequest,
    ) -> String {
        let handle = self.registry.insert(&task_id);
        log::info!("Task {} submitted ({})", task_id, original_name);

        let pipeline = Arc::clone(&self.pipeline);
        let storage = Arc::clone(&self.storage);
        let worker_handle = handle.clone();
        let worker_upload = upload.clone();
        let id = task_id.clone();

        let worker = runtime.spawn_blocking(move || {
            run_task(&worker_handle, &pipeline, &storage, &id, &worker_upload, &original_name, &request)
        });
        runtime.spawn(async move {
            if let Err(e) = worker.await {
                handle.fail(&format!("Error: worker stopped: {}", e));
                remove_upload(&upload);
            }
        });

        task_id
    }

    /// Retention sweep: old files in both storage directories, and the
    /// records of finished tasks of the same age. Returns the number of files
    /// removed.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let removed = self.storage.cleanup(max_age)?;
        let evicted = self.registry.evict_finished(max_age);
        if evicted > 0 {
            log::info!("Forgot {} finished tasks older than {:?}", evicted, max_age);
        }
        Ok(removed)
    }

    pub fn get_status(&self, task_id: &str) -> Result<TaskRecord> {
        self.registry.get(task_id)
    }
}

fn run_task(
    handle: &TaskHandle,
    pipeline: &Pipeline,
    storage: &Storage,
    task_id: &str,
    upload: &Path,
    original_name: &str,
    request: &RenderRequest,
) {
    handle.advance(TaskStatus::Processing, 10, "Processing audio");
    let file_name = storage::final_name(task_id, original_name);

    handle.advance(TaskStatus::Processing, 50, "Generating 2D spectrogram");
    let outcome = pipeline
        .generate_from_path(upload, request, &RenderProfile::final_render())
        .and_then(|image| {
            storage.write_output(&file_name, &image.bytes)?;
            Ok(image.info)
        });

    match outcome {
        Ok(info) => {
            handle.advance(TaskStatus::Processing, 90, "Cleaning up");
            remove_upload(upload);
            handle.complete(TaskResult {
                spectrogram_2d: Artifact {
                    url: storage.public_url(&file_name),
                    filename: file_name,
                    info,
                },
            });
        }
        Err(e) => {
            handle.fail(&format!("Error: {}", e));
            remove_upload(upload);
        }
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| SpectrogramError::Runtime(e.to_string()))
}

fn remove_upload(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Failed to remove upload {}: {}", path.display(), e);
    }
}
