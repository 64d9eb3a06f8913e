//! Orchestrator (§6): the external-facing facade — `submit_video`,
//! `submit_document`, `confirm_pre_analysis`, `subscribe`, `snapshot` — plus
//! the [`TaskExecutor`] that adapts [`Workflow::run`] to the worker pool's
//! dispatch contract, owns dedup against the hash registry and an in-flight
//! map, and enforces each task's per-task hard deadline (§4.I, §5).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::Config;
use crate::core::fs_util::task_dir_path;
use crate::core::parallel::pool::{PoolStats, TaskExecutor, TaskListEntry, WorkerPool};
use crate::core::postprocess::PostProcessorPipeline;
use crate::core::store::document_store::{
    document_source_identifier, infer_document_type, is_binary_document_type, normalize_video_source_identifier,
};
use crate::core::store::{doc_hash, DocumentStore, HashRegistry};
use crate::core::task_manager::{Subscription, TaskManager};
use crate::core::workflow::{PreparedSource, SourceProvider, Workflow, WorkflowDeps};
use crate::domain::model::{Mode, PreAnalysisResult, Priority, Task, TaskError, TaskKind, TaskState};
use crate::error::OrchestratorError;
use crate::services::llm::LlmClient;
use crate::Result;

/// Whether `submit_video`/`submit_document` enrolled a fresh task, found a
/// finished document already on disk, or found a matching task already
/// running (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Created,
    Exists,
    InProgress,
}

/// What `submit_video`/`submit_document` return (§6).
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub task_id: String,
    pub status: SubmitStatus,
    pub doc_hash: Option<String>,
    pub filename: Option<String>,
}

/// A fresh face pre-flight re-used every run; stateless beyond its [`WorkflowDeps`].
struct Executor {
    workflow: Arc<Workflow>,
    providers: HashMap<TaskKind, Arc<dyn SourceProvider>>,
    task_manager: Arc<TaskManager>,
    tasks_dir: PathBuf,
    task_timeout: Duration,
    in_flight: Arc<StdMutex<HashMap<(String, Mode), String>>>,
}

impl Executor {
    fn release_in_flight(&self, task: &Task) {
        let key = (task.source_identifier.clone(), task.mode);
        let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
        if in_flight.get(&key) == Some(&task.task_id) {
            in_flight.remove(&key);
        }
    }
}

#[async_trait]
impl TaskExecutor for Executor {
    async fn execute(&self, task: Task) {
        let _ = self.task_manager.mark_processing(&task.task_id);
        let created_at: chrono::DateTime<chrono::Utc> = task.created_at.into();
        let task_dir = task_dir_path(&self.tasks_dir, created_at, &task.task_id, task.kind);

        let provider = self.providers.get(&task.kind).cloned();
        let outcome = tokio::time::timeout(self.task_timeout, async {
            let provider = provider.ok_or_else(|| {
                OrchestratorError::config(format!("no source provider registered for {:?}", task.kind))
            })?;
            let source: PreparedSource = provider.fetch(&task).await?;
            self.workflow.run(&task, source, task_dir.clone()).await;
            Ok::<(), OrchestratorError>(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.task_manager.set_error(&task.task_id, to_task_error(&e)),
            Err(_) => {
                let timeout_err = OrchestratorError::timeout(task.task_id.clone(), self.task_timeout);
                self.task_manager.set_error(&task.task_id, to_task_error(&timeout_err));
            }
        }

        self.release_in_flight(&task);
    }
}

fn to_task_error(e: &OrchestratorError) -> TaskError {
    TaskError {
        kind: e.kind().to_string(),
        message: e.to_string(),
        suggestions: e.suggestions(),
    }
}

/// The generation orchestrator: wires a [`WorkerPool`] of [`Workflow`] runs
/// behind a dedup-aware submission facade (§6).
pub struct Orchestrator {
    task_manager: Arc<TaskManager>,
    hash_registry: Arc<StdMutex<HashRegistry>>,
    pool: WorkerPool,
    in_flight: Arc<StdMutex<HashMap<(String, Mode), String>>>,
    generation_config: crate::config::GenerationConfig,
}

impl Orchestrator {
    /// Assemble an orchestrator from its already-constructed collaborators
    /// (see [`crate::core::factory`] for the usual way to build these).
    pub fn new(
        config: Config,
        task_manager: Arc<TaskManager>,
        store: Arc<DocumentStore>,
        hash_registry: Arc<StdMutex<HashRegistry>>,
        llm: Arc<dyn LlmClient>,
        pipeline: Arc<PostProcessorPipeline>,
        providers: HashMap<TaskKind, Arc<dyn SourceProvider>>,
    ) -> Self {
        let tasks_dir = PathBuf::from(&config.storage.tasks_dir);
        let task_timeout = Duration::from_secs(config.parallel.task_timeout_secs);
        let n_workers = config.parallel.n_workers;
        let queue_max = config.parallel.queue_max;
        let generation_config = config.generation.clone();

        let workflow = Arc::new(Workflow::new(WorkflowDeps {
            llm,
            task_manager: Arc::clone(&task_manager),
            store,
            hash_registry: Arc::clone(&hash_registry),
            pipeline,
            config,
        }));
        let in_flight: Arc<StdMutex<HashMap<(String, Mode), String>>> = Arc::new(StdMutex::new(HashMap::new()));
        let executor = Arc::new(Executor {
            workflow,
            providers,
            task_manager: Arc::clone(&task_manager),
            tasks_dir,
            task_timeout,
            in_flight: Arc::clone(&in_flight),
        });
        let pool = WorkerPool::new(n_workers, queue_max, executor);

        Self {
            task_manager,
            hash_registry,
            pool,
            in_flight,
            generation_config,
        }
    }

    /// Submit a video URL for analysis (§6 `submit_video`).
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidInput`] if `url` is not a
    /// recognizable video URL, or [`OrchestratorError::QueueFull`] if the
    /// pool's queue is already saturated.
    pub fn submit_video(&self, url: &str, mode: Mode, priority: Priority, force: bool) -> Result<SubmitOutcome> {
        let source_identifier = normalize_video_source_identifier(url)?;
        self.submit(TaskKind::Video, url.to_string(), source_identifier, mode, priority, force)
    }

    /// Submit an already-extracted document's text for analysis (§6
    /// `submit_document`). `source_ref` is the local path the configured
    /// [`SourceProvider`] will read from; `content_bytes` is hashed to
    /// derive the document's `source_identifier`; `original_filename`'s
    /// extension determines the document type folded into that identifier
    /// and which of `max_text_file_size`/`max_binary_file_size` applies.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidInput`] if `content_bytes`
    /// exceeds the size cap for its inferred type, or
    /// [`OrchestratorError::QueueFull`] if the pool's queue is already
    /// saturated.
    pub fn submit_document(
        &self,
        source_ref: &str,
        content_bytes: &[u8],
        original_filename: &str,
        mode: Mode,
        priority: Priority,
        force: bool,
    ) -> Result<SubmitOutcome> {
        let doc_type = infer_document_type(original_filename);
        let limit = if is_binary_document_type(doc_type) {
            self.generation_config.max_binary_file_size
        } else {
            self.generation_config.max_text_file_size
        };
        if content_bytes.len() as u64 > limit {
            return Err(OrchestratorError::invalid_input(format!(
                "document '{original_filename}' is {} bytes, exceeding the {limit}-byte cap for '{doc_type}' uploads",
                content_bytes.len()
            )));
        }

        let source_identifier = document_source_identifier(doc_type, content_bytes);
        self.submit(TaskKind::Document, source_ref.to_string(), source_identifier, mode, priority, force)
    }

    /// Shared by `submit_video`/`submit_document`. `force=true` bypasses
    /// both the on-disk and in-flight dedup checks (§3 invariant 6, §6).
    fn submit(
        &self,
        kind: TaskKind,
        source_ref: String,
        source_identifier: String,
        mode: Mode,
        priority: Priority,
        force: bool,
    ) -> Result<SubmitOutcome> {
        let hash = doc_hash(&source_identifier);
        if !force {
            let registry = self.hash_registry.lock().expect("hash registry lock poisoned");
            if let Some(filename) = registry.get_default(&hash) {
                return Ok(SubmitOutcome {
                    task_id: String::new(),
                    status: SubmitStatus::Exists,
                    doc_hash: Some(hash),
                    filename: Some(filename.to_string()),
                });
            }
        }

        let key = (source_identifier.clone(), mode);
        if !force {
            let in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
            if let Some(task_id) = in_flight.get(&key) {
                return Ok(SubmitOutcome {
                    task_id: task_id.clone(),
                    status: SubmitStatus::InProgress,
                    doc_hash: None,
                    filename: None,
                });
            }
        }

        let task_id = Uuid::new_v4().to_string();
        let task = Task {
            task_id: task_id.clone(),
            kind,
            source_ref,
            source_identifier,
            mode,
            priority,
            created_at: SystemTime::now(),
        };

        self.task_manager.create(&task_id);
        self.in_flight.lock().expect("in-flight lock poisoned").insert(key.clone(), task_id.clone());
        if let Err(e) = self.pool.submit(task) {
            self.in_flight.lock().expect("in-flight lock poisoned").remove(&key);
            return Err(e);
        }

        Ok(SubmitOutcome {
            task_id,
            status: SubmitStatus::Created,
            doc_hash: None,
            filename: None,
        })
    }

    /// Resume a paused workflow past its confirmation gate (§6 `confirm`).
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidInput`] if `task_id` is unknown
    /// or not currently `awaiting_confirmation`.
    pub fn confirm_pre_analysis(&self, task_id: &str, overrides: Option<PreAnalysisResult>) -> Result<()> {
        self.task_manager.confirm(task_id, overrides)
    }

    /// Subscribe to a task's event stream, replaying missed history first (§6 `subscribe`).
    pub fn subscribe(&self, task_id: &str) -> Option<Subscription> {
        self.task_manager.subscribe(task_id)
    }

    /// A one-shot, lock-consistent snapshot of a task's state (§6 status queries).
    pub fn snapshot(&self, task_id: &str) -> Option<TaskState> {
        self.task_manager.snapshot(task_id)
    }

    /// Current queue depth and active-worker count.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Every task the pool currently holds, queued or active (§4.I `list`).
    pub fn list_tasks(&self) -> Vec<TaskListEntry> {
        self.pool.list()
    }
}
