//! WorkerPool (§4.I): a fixed set of workers draining a bounded priority
//! queue. Generalized from `TaskScheduler`'s semaphore-gated priority queue
//! (`core::parallel::scheduler::TaskScheduler`), but with a **non-blocking**
//! submission contract: `submit()` returns immediately with `Ok(())` or
//! [`OrchestratorError::QueueFull`] instead of awaiting the task's result.
//! See the design notes on why this diverges from the teacher's
//! submit-and-await model.

use super::queue::PriorityQueue;
use crate::domain::model::{Priority, Task, TaskKind};
use crate::error::OrchestratorError;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

/// Executes one task to completion. Implementations are expected to record
/// progress, logs, and the final outcome via a `TaskManager` themselves —
/// the pool only owns scheduling, never task semantics.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: Task);
}

/// A snapshot of the pool's current load.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub queued: usize,
    pub active: usize,
    pub n_workers: usize,
    pub queue_max: usize,
}

/// One row of a [`WorkerPool::list`] snapshot (§4.I `list`).
#[derive(Debug, Clone)]
pub struct TaskListEntry {
    pub task_id: String,
    pub kind: TaskKind,
    pub source_ref: String,
    pub priority: Priority,
    pub state: TaskListState,
}

/// Where a listed task currently sits in the pool, as distinct from the
/// task's own lifecycle status tracked by `TaskManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskListState {
    Queued,
    Active,
}

struct Shared {
    queue: Mutex<PriorityQueue>,
    notify: Notify,
    active: AtomicUsize,
    active_tasks: Mutex<HashMap<String, Task>>,
    queue_max: usize,
    n_workers: usize,
}

/// A bounded-concurrency, priority-scheduled worker pool.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Spawn `n_workers` background worker loops draining a queue bounded to
    /// `queue_max`, each dispatching through `executor`.
    pub fn new(n_workers: usize, queue_max: usize, executor: Arc<dyn TaskExecutor>) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(PriorityQueue::new(queue_max)),
            notify: Notify::new(),
            active: AtomicUsize::new(0),
            active_tasks: Mutex::new(HashMap::new()),
            queue_max,
            n_workers,
        });
        let semaphore = Arc::new(Semaphore::new(n_workers));

        for _ in 0..n_workers {
            let shared = Arc::clone(&shared);
            let semaphore = Arc::clone(&semaphore);
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                loop {
                    let task = loop {
                        if let Some(task) = shared.queue.lock().unwrap().pop() {
                            break task;
                        }
                        shared.notify.notified().await;
                    };
                    let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
                    shared.active.fetch_add(1, Ordering::SeqCst);
                    shared
                        .active_tasks
                        .lock()
                        .unwrap()
                        .insert(task.task_id.clone(), task.clone());
                    executor.execute(task.clone()).await;
                    shared.active_tasks.lock().unwrap().remove(&task.task_id);
                    shared.active.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                }
            });
        }

        Self { shared }
    }

    /// Enqueue `task`. Non-blocking: returns immediately.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::QueueFull`] if the queue is already at
    /// `queue_max` entries.
    pub fn submit(&self, task: Task) -> Result<()> {
        let pushed = self.shared.queue.lock().unwrap().push(task);
        if !pushed {
            return Err(OrchestratorError::QueueFull);
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// A snapshot of queue depth and active-worker count.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queued: self.shared.queue.lock().unwrap().len(),
            active: self.shared.active.load(Ordering::SeqCst),
            n_workers: self.shared.n_workers,
            queue_max: self.shared.queue_max,
        }
    }

    /// A snapshot listing every task the pool currently holds, queued or
    /// active, with its scheduling metadata (§4.I `list`).
    pub fn list(&self) -> Vec<TaskListEntry> {
        let mut entries: Vec<TaskListEntry> = self
            .shared
            .active_tasks
            .lock()
            .unwrap()
            .values()
            .map(|task| TaskListEntry {
                task_id: task.task_id.clone(),
                kind: task.kind,
                source_ref: task.source_ref.clone(),
                priority: task.priority,
                state: TaskListState::Active,
            })
            .collect();
        entries.extend(self.shared.queue.lock().unwrap().iter().map(|task| TaskListEntry {
            task_id: task.task_id.clone(),
            kind: task.kind,
            source_ref: task.source_ref.clone(),
            priority: task.priority,
            state: TaskListState::Queued,
        }));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Mode, Priority, TaskKind};
    use std::time::{Duration, SystemTime};
    use tokio::sync::Mutex as TokioMutex;
    use tokio::time::sleep;

    struct CountingExecutor {
        seen: TokioMutex<Vec<String>>,
        delay: Duration,
    }

    #[async_trait]
    impl TaskExecutor for CountingExecutor {
        async fn execute(&self, task: Task) {
            sleep(self.delay).await;
            self.seen.lock().await.push(task.task_id);
        }
    }

    fn task(id: &str, priority: Priority) -> Task {
        Task {
            task_id: id.to_string(),
            kind: TaskKind::Document,
            source_ref: "document://x".to_string(),
            source_identifier: "document://x".to_string(),
            mode: Mode::Deep,
            priority,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn submit_returns_immediately_and_task_eventually_runs() {
        let executor = Arc::new(CountingExecutor {
            seen: TokioMutex::new(Vec::new()),
            delay: Duration::from_millis(5),
        });
        let pool = WorkerPool::new(2, 8, executor.clone());
        pool.submit(task("t1", Priority::Normal)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(executor.seen.lock().await.as_slice(), &["t1".to_string()]);
    }

    #[tokio::test]
    async fn submit_rejects_when_queue_is_full() {
        let executor = Arc::new(CountingExecutor {
            seen: TokioMutex::new(Vec::new()),
            delay: Duration::from_millis(200),
        });
        // A single worker, busy immediately, with a queue of depth 1.
        let pool = WorkerPool::new(1, 1, executor);
        pool.submit(task("busy", Priority::Normal)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.submit(task("fills-queue", Priority::Normal)).unwrap();
        let result = pool.submit(task("overflow", Priority::Normal));
        assert!(matches!(result, Err(OrchestratorError::QueueFull)));
    }

    #[tokio::test]
    async fn list_reports_active_and_queued_tasks() {
        let executor = Arc::new(CountingExecutor {
            seen: TokioMutex::new(Vec::new()),
            delay: Duration::from_millis(100),
        });
        let pool = WorkerPool::new(1, 4, executor);
        pool.submit(task("a", Priority::Normal)).unwrap();
        pool.submit(task("b", Priority::Normal)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut listed = pool.list();
        listed.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].task_id, "a");
        assert_eq!(listed[0].state, TaskListState::Active);
        assert_eq!(listed[1].task_id, "b");
        assert_eq!(listed[1].state, TaskListState::Queued);
    }

    #[tokio::test]
    async fn stats_reports_queue_and_active_counts() {
        let executor = Arc::new(CountingExecutor {
            seen: TokioMutex::new(Vec::new()),
            delay: Duration::from_millis(100),
        });
        let pool = WorkerPool::new(1, 4, executor);
        pool.submit(task("a", Priority::Normal)).unwrap();
        pool.submit(task("b", Priority::Normal)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stats = pool.stats();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.n_workers, 1);
        assert_eq!(stats.queue_max, 4);
    }
}
