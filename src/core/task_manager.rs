//! TaskManager (§4.H): the single authoritative `task_id -> TaskState` table,
//! grounded on `original_source/.../task_manager.py`'s synchronous
//! websocket-send-loop, re-expressed as a `tokio::sync::broadcast` channel
//! per task plus a replayed history buffer, mirroring subx-cli's
//! preference for explicit, dependency-injected state over module globals
//! (§9).

use crate::domain::model::{PreAnalysisResult, TaskError, TaskState, TaskStatus};
use crate::error::OrchestratorError;
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

/// One entry of the Progress API's event stream (§6).
#[derive(Debug, Clone)]
pub enum Event {
    /// A free-form human-readable log line.
    Log { message: String },
    /// Progress advanced (or was replayed at subscribe time).
    Progress { progress: u8, message: String },
    /// The workflow paused pending `confirm`, exposing its analysis profile.
    PreAnalysis {
        data: PreAnalysisResult,
        message: String,
    },
    /// Terminal: the task completed successfully.
    Result {
        title: String,
        filename: String,
        hash: String,
        message: String,
    },
    /// Terminal: the task failed.
    Error {
        error_type: String,
        message: String,
        suggestions: Vec<String>,
    },
}

impl Event {
    /// Whether this event kind is terminal, per §6.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Result { .. } | Event::Error { .. })
    }
}

struct TaskEntry {
    state: TaskState,
    sender: broadcast::Sender<Event>,
    confirm_notify: Arc<Notify>,
}

const BROADCAST_CAPACITY: usize = 256;

/// The authoritative in-memory table of [`TaskState`]s (§4.H).
///
/// A single `std::sync::Mutex` guards the whole table; every operation below
/// holds it only for the duration of a primitive read/mutate/publish, never
/// across an `.await`, so it is safe to share one `TaskManager` across every
/// concurrent workflow (§5's "single mutex... protects each TaskState for
/// writes").
pub struct TaskManager {
    tasks: Mutex<HashMap<String, TaskEntry>>,
    log_ring_capacity: usize,
}

impl TaskManager {
    /// Build a manager bounding each task's log ring to `log_ring_capacity`.
    pub fn new(log_ring_capacity: usize) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            log_ring_capacity,
        }
    }

    /// Enroll a freshly-submitted task: `status=queued, progress=0` (§4.H
    /// `create`). Must be called before the worker pool can pick it up.
    pub fn create(&self, task_id: &str) {
        let mut tasks = self.tasks.lock().expect("task manager lock poisoned");
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        tasks.insert(
            task_id.to_string(),
            TaskEntry {
                state: TaskState::new(task_id, self.log_ring_capacity),
                sender,
                confirm_notify: Arc::new(Notify::new()),
            },
        );
    }

    /// Transition `queued -> processing`, the one status flip this manager
    /// performs on the worker's behalf when it picks a task up (§3
    /// invariant 3; not itself a named §4.H operation, but required to keep
    /// the transition graph authoritative in one place).
    pub fn mark_processing(&self, task_id: &str) -> Result<()> {
        self.with_entry(task_id, |entry| {
            if !entry.state.status.can_transition_to(TaskStatus::Processing) {
                return Err(OrchestratorError::config(format!(
                    "task {task_id} cannot transition {:?} -> processing",
                    entry.state.status
                )));
            }
            entry.state.status = TaskStatus::Processing;
            Ok(())
        })
    }

    /// `update_progress` (§4.H): `progress = max(current, p)`, append `msg`
    /// to the log ring, publish a `progress` event.
    pub fn update_progress(&self, task_id: &str, progress: u8, message: impl Into<String>) {
        let message = message.into();
        let _ = self.with_entry(task_id, |entry| {
            entry.state.progress = entry.state.progress.max(progress);
            entry.state.push_log(message.clone());
            let _ = entry.sender.send(Event::Progress {
                progress: entry.state.progress,
                message,
            });
            Ok(())
        });
    }

    /// `send_log` (§4.H): append a log line and publish it.
    pub fn send_log(&self, task_id: &str, message: impl Into<String>) {
        let message = message.into();
        let _ = self.with_entry(task_id, |entry| {
            entry.state.push_log(message.clone());
            let _ = entry.sender.send(Event::Log { message });
            Ok(())
        });
    }

    /// `send_result` (§4.H): mark `completed`, store the result pointers,
    /// publish the terminal `result` event. `progress` is forced to 100 to
    /// preserve §3 invariant 5 ("progress reaches 100 iff completed").
    pub fn send_result(
        &self,
        task_id: &str,
        title: impl Into<String>,
        filename: impl Into<String>,
        doc_hash: impl Into<String>,
    ) {
        let title = title.into();
        let filename = filename.into();
        let doc_hash = doc_hash.into();
        let _ = self.with_entry(task_id, |entry| {
            entry.state.status = TaskStatus::Completed;
            entry.state.progress = 100;
            entry.state.doc_hash = Some(doc_hash.clone());
            entry.state.result_path = Some(filename.clone());
            entry.state.result = Some(crate::domain::model::TaskResult {
                title: title.clone(),
                filename: filename.clone(),
                doc_hash: doc_hash.clone(),
            });
            let message = format!("completed: {title}");
            let _ = entry.sender.send(Event::Result {
                title,
                filename,
                hash: doc_hash,
                message,
            });
            Ok(())
        });
    }

    /// `set_error` (§4.H): mark `failed` with a structured error, publish
    /// the terminal `error` event. Never leaves a task in `processing`.
    pub fn set_error(&self, task_id: &str, err: TaskError) {
        let _ = self.with_entry(task_id, |entry| {
            entry.state.status = TaskStatus::Failed;
            entry.state.error = Some(err.clone());
            let _ = entry.sender.send(Event::Error {
                error_type: err.kind,
                message: err.message,
                suggestions: err.suggestions,
            });
            Ok(())
        });
    }

    /// `pre_analysis_ready` (§4.H): pause at `awaiting_confirmation`, store
    /// the profile, publish a `pre_analysis` event.
    pub fn pre_analysis_ready(&self, task_id: &str, data: PreAnalysisResult) {
        let _ = self.with_entry(task_id, |entry| {
            entry.state.status = TaskStatus::AwaitingConfirmation;
            entry.state.pre_analysis_result = Some(data.clone());
            let _ = entry.sender.send(Event::PreAnalysis {
                data,
                message: "awaiting confirmation".to_string(),
            });
            Ok(())
        });
    }

    /// `confirm` (§4.H): if `awaiting_confirmation`, shallow-merge
    /// `overrides` over the stored profile, signal the workflow's waiter,
    /// and return to `processing`.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::InvalidInput`] if the task is not
    /// currently `awaiting_confirmation`.
    pub fn confirm(&self, task_id: &str, overrides: Option<PreAnalysisResult>) -> Result<()> {
        self.with_entry(task_id, |entry| {
            if entry.state.status != TaskStatus::AwaitingConfirmation {
                return Err(OrchestratorError::invalid_input(format!(
                    "task {task_id} is not awaiting confirmation"
                )));
            }
            if let Some(overrides) = overrides {
                let merged = entry.state.pre_analysis_result.get_or_insert_with(Default::default);
                for (k, v) in overrides {
                    merged.insert(k, v);
                }
            }
            entry.state.status = TaskStatus::Processing;
            // `notify_one` (not `notify_waiters`): it stores a permit when no
            // waiter is registered yet, so a `confirm()` that races in before
            // `wait_for_confirmation().await` is polled still wakes it
            // instead of being silently dropped.
            entry.confirm_notify.notify_one();
            Ok(())
        })
    }

    /// Await the `confirm()` signal for `task_id`. Returns immediately if
    /// no such task is enrolled (defensive: should not happen in practice).
    pub async fn wait_for_confirmation(&self, task_id: &str) {
        let notify = {
            let tasks = self.tasks.lock().expect("task manager lock poisoned");
            match tasks.get(task_id) {
                Some(entry) => Arc::clone(&entry.confirm_notify),
                None => return,
            }
        };
        notify.notified().await;
    }

    /// `subscribe` (§4.H): an async event stream replaying missed history
    /// (all log lines, current progress, and any terminal event) before
    /// handing the caller a live receiver for future events.
    pub fn subscribe(&self, task_id: &str) -> Option<Subscription> {
        let tasks = self.tasks.lock().expect("task manager lock poisoned");
        let entry = tasks.get(task_id)?;
        let mut history = Vec::with_capacity(entry.state.log_ring.len() + 2);
        for message in &entry.state.log_ring {
            history.push(Event::Log {
                message: message.clone(),
            });
        }
        history.push(Event::Progress {
            progress: entry.state.progress,
            message: String::new(),
        });
        if let Some(data) = &entry.state.pre_analysis_result {
            if entry.state.status == TaskStatus::AwaitingConfirmation {
                history.push(Event::PreAnalysis {
                    data: data.clone(),
                    message: "awaiting confirmation".to_string(),
                });
            }
        }
        if let Some(result) = &entry.state.result {
            history.push(Event::Result {
                title: result.title.clone(),
                filename: result.filename.clone(),
                hash: result.doc_hash.clone(),
                message: format!("completed: {}", result.title),
            });
        }
        if let Some(error) = &entry.state.error {
            history.push(Event::Error {
                error_type: error.kind.clone(),
                message: error.message.clone(),
                suggestions: error.suggestions.clone(),
            });
        }
        Some(Subscription {
            history: history.into(),
            receiver: entry.sender.subscribe(),
        })
    }

    /// `snapshot` (§4.H): a lock-consistent copy for one-shot REST-style
    /// status queries.
    pub fn snapshot(&self, task_id: &str) -> Option<TaskState> {
        let tasks = self.tasks.lock().expect("task manager lock poisoned");
        tasks.get(task_id).map(|entry| entry.state.clone())
    }

    fn with_entry<T>(&self, task_id: &str, f: impl FnOnce(&mut TaskEntry) -> Result<T>) -> Result<T> {
        let mut tasks = self.tasks.lock().expect("task manager lock poisoned");
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| OrchestratorError::invalid_input(format!("unknown task {task_id}")))?;
        f(entry)
    }
}

/// A subscriber's view of one task's event stream (§6 `subscribe`):
/// replayed history first, then live events as they are published.
pub struct Subscription {
    history: std::collections::VecDeque<Event>,
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Await the next event, draining replayed history before the live
    /// channel. Returns `None` once the task's sender has been dropped and
    /// history is exhausted (the manager itself is never dropped while the
    /// process runs, so in practice this only happens in tests).
    pub async fn recv(&mut self) -> Option<Event> {
        if let Some(event) = self.history.pop_front() {
            return Some(event);
        }
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_snapshot_reflects_queued_state() {
        let manager = TaskManager::new(10);
        manager.create("t1");
        let snapshot = manager.snapshot("t1").unwrap();
        assert_eq!(snapshot.status, TaskStatus::Queued);
        assert_eq!(snapshot.progress, 0);
    }

    #[test]
    fn progress_never_decreases() {
        let manager = TaskManager::new(10);
        manager.create("t1");
        manager.update_progress("t1", 50, "half way");
        manager.update_progress("t1", 30, "a stale update");
        assert_eq!(manager.snapshot("t1").unwrap().progress, 50);
    }

    #[test]
    fn send_result_marks_completed_and_forces_progress_100() {
        let manager = TaskManager::new(10);
        manager.create("t1");
        manager.update_progress("t1", 95, "almost done");
        manager.send_result("t1", "Title", "file_v1.md", "deadbeef");
        let snapshot = manager.snapshot("t1").unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.result.unwrap().doc_hash, "deadbeef");
    }

    #[test]
    fn set_error_marks_failed_with_structured_error() {
        let manager = TaskManager::new(10);
        manager.create("t1");
        manager.set_error(
            "t1",
            TaskError {
                kind: "timeout".into(),
                message: "took too long".into(),
                suggestions: vec!["retry".into()],
            },
        );
        let snapshot = manager.snapshot("t1").unwrap();
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(snapshot.error.unwrap().kind, "timeout");
    }

    #[test]
    fn confirm_rejects_when_not_awaiting_confirmation() {
        let manager = TaskManager::new(10);
        manager.create("t1");
        let result = manager.confirm("t1", None);
        assert!(result.is_err());
    }

    #[test]
    fn confirm_merges_overrides_and_returns_to_processing() {
        let manager = TaskManager::new(10);
        manager.create("t1");
        let mut data = serde_json::Map::new();
        data.insert("content_type".into(), serde_json::json!("tutorial"));
        manager.pre_analysis_ready("t1", data);

        let mut overrides = serde_json::Map::new();
        overrides.insert("content_type".into(), serde_json::json!("lecture"));
        manager.confirm("t1", Some(overrides)).unwrap();

        let snapshot = manager.snapshot("t1").unwrap();
        assert_eq!(snapshot.status, TaskStatus::Processing);
        assert_eq!(
            snapshot.pre_analysis_result.unwrap()["content_type"],
            serde_json::json!("lecture")
        );
    }

    #[tokio::test]
    async fn subscribe_replays_history_then_live_events() {
        let manager = TaskManager::new(10);
        manager.create("t1");
        manager.send_log("t1", "first line");
        manager.update_progress("t1", 10, "ten percent");

        let mut sub = manager.subscribe("t1").unwrap();
        assert!(matches!(sub.recv().await, Some(Event::Log { .. })));
        // second history entry is the replayed current-progress snapshot
        assert!(matches!(sub.recv().await, Some(Event::Progress { progress: 10, .. })));

        manager.send_log("t1", "a live line");
        match sub.recv().await {
            Some(Event::Log { message }) => assert_eq!(message, "a live line"),
            other => panic!("expected a live log event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_for_confirmation_unblocks_on_confirm() {
        let manager = Arc::new(TaskManager::new(10));
        manager.create("t1");
        manager.pre_analysis_ready("t1", serde_json::Map::new());

        let waiter_manager = Arc::clone(&manager);
        let waiter = tokio::spawn(async move {
            waiter_manager.wait_for_confirmation("t1").await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        manager.confirm("t1", None).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait_for_confirmation should unblock")
            .unwrap();
    }

    /// `confirm()` landing before `wait_for_confirmation()` is ever polled
    /// must still unblock it — `notify_one` stores the permit, unlike
    /// `notify_waiters` which only wakes already-registered waiters.
    #[tokio::test]
    async fn confirm_before_wait_is_polled_still_unblocks_it() {
        let manager = Arc::new(TaskManager::new(10));
        manager.create("t1");
        manager.pre_analysis_ready("t1", serde_json::Map::new());

        manager.confirm("t1", None).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), manager.wait_for_confirmation("t1"))
            .await
            .expect("wait_for_confirmation should return immediately via the stored permit");
    }
}
