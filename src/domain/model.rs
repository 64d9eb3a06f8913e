//! The entities of §3: Task, TaskState, OutlinePlan, ChapterPlan, Document
//! front matter.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::SystemTime;

/// What kind of source a task was submitted for, and which workflow handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// A video whose transcript has already been fetched.
    Video,
    /// An uploaded document whose text has already been extracted.
    Document,
    /// A re-run of a previously completed document, e.g. for an ultra upgrade.
    Reprocess,
}

/// Depth/length preset, per the glossary's Deep/Ultra entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Moderate chapter count and length.
    Deep,
    /// Higher chapter count and depth, capped at 20 chapters.
    Ultra,
}

/// Scheduling priority, ordered `Low < Normal < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Lowest scheduling priority.
    Low,
    /// Default scheduling priority.
    Normal,
    /// Elevated scheduling priority.
    High,
    /// Highest scheduling priority.
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// An immutable submission record, created once and never mutated (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque identifier, unique per submission.
    pub task_id: String,
    /// What kind of source this task processes.
    pub kind: TaskKind,
    /// The URL or local file path of the source.
    pub source_ref: String,
    /// Canonical identity of the source, derived once at submission time and
    /// carried immutably thereafter (§3): used for dedup, `doc_hash`, and
    /// the document's front matter.
    pub source_identifier: String,
    /// Depth/length preset.
    pub mode: Mode,
    /// Scheduling priority.
    pub priority: Priority,
    /// Wall-clock creation time.
    pub created_at: SystemTime,
}

/// Lifecycle status of a [`TaskState`], per the transition graph in §3
/// invariant 3: `queued -> processing -> (awaiting_confirmation ->
/// processing)* -> (completed | failed)`, monotonic and never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Enrolled but not yet picked up by a worker.
    Queued,
    /// A worker owns this task and is actively running its workflow.
    Processing,
    /// Paused pending an external `confirm` call.
    AwaitingConfirmation,
    /// Terminal: finished successfully.
    Completed,
    /// Terminal: finished with an error.
    Failed,
}

impl TaskStatus {
    /// Whether this status is terminal (`completed` or `failed`).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is an allowed transition under §3 invariant 3.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, AwaitingConfirmation)
                | (AwaitingConfirmation, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

/// A structured error record attached to a failed [`TaskState`] (§4.H, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    /// Taxonomy string, e.g. `"chapter_count_exceeded"`.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Actionable suggestions for the submitter.
    pub suggestions: Vec<String>,
}

/// The result of a completed task (§4.H `send_result`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The report's Chinese title.
    pub title: String,
    /// The on-disk filename under `documents/`.
    pub filename: String,
    /// The document's content hash.
    pub doc_hash: String,
}

/// The pre-analysis profile a confirmation-gated workflow exposes while
/// `status = awaiting_confirmation` (§4.F).
pub type PreAnalysisResult = serde_json::Map<String, serde_json::Value>;

/// Authoritative per-task state, mutated only by the owning worker and the
/// `TaskManager` (§3, §4.H). Readers take snapshots via [`TaskState::clone`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    /// The task this state belongs to.
    pub task_id: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Completion percentage in `[0, 100]`, non-decreasing within a run.
    pub progress: u8,
    /// Bounded, ordered ring of human-readable log lines.
    pub log_ring: VecDeque<String>,
    /// Set once assembly has written the final report.
    pub result_path: Option<String>,
    /// Set once the document's content hash is known.
    pub doc_hash: Option<String>,
    /// Set when `status = failed`.
    pub error: Option<TaskError>,
    /// Set when `status = completed`.
    pub result: Option<TaskResult>,
    /// Set while `status = awaiting_confirmation`.
    pub pre_analysis_result: Option<PreAnalysisResult>,
    /// The capacity log_ring is bounded to; oldest lines are dropped first.
    pub log_ring_capacity: usize,
}

impl TaskState {
    /// Create the initial state for a freshly-enrolled task (`queued`, `progress=0`).
    pub fn new(task_id: impl Into<String>, log_ring_capacity: usize) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Queued,
            progress: 0,
            log_ring: VecDeque::new(),
            result_path: None,
            doc_hash: None,
            error: None,
            result: None,
            pre_analysis_result: None,
            log_ring_capacity,
        }
    }

    /// Append a log line, dropping the oldest if over capacity (§4.H).
    pub fn push_log(&mut self, message: impl Into<String>) {
        if self.log_ring.len() >= self.log_ring_capacity {
            self.log_ring.pop_front();
        }
        self.log_ring.push_back(message.into());
    }
}

/// A chapter's structured plan, produced by the OutlineParser (§4.D) from a
/// chapter's JSON metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChapterPlan {
    /// 1-based chapter index.
    pub index: u32,
    /// Chapter title.
    pub title: String,
    /// Subsection guidance: `(subtitle, key_points)` pairs.
    pub subsections: Vec<Subsection>,
    /// Content that must appear in this chapter.
    pub must_include: Vec<String>,
    /// Content that must not appear (to avoid cross-chapter overlap).
    pub must_exclude: Vec<String>,
    /// A suggested opening hook line.
    pub opening_hook: Option<String>,
    /// A suggested closing transition line.
    pub closing_transition: Option<String>,
    /// Link text for the previous chapter, if any.
    pub prev_chapter_link: Option<String>,
    /// Link text for the next chapter, if any.
    pub next_chapter_link: Option<String>,
    /// Free-form rationale for this chapter's scope.
    pub rationale: Option<String>,
    /// Free-form content guidance passed verbatim into the chapter prompt.
    pub content_guidance: Option<String>,
}

/// A subsection within a [`ChapterPlan`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Subsection {
    /// Subsection heading.
    pub subtitle: String,
    /// Bullet points the chapter should cover under this subsection.
    pub key_points: Vec<String>,
}

/// The parsed plan for an entire report, produced by OutlineParser (§4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlinePlan {
    /// Chinese title.
    pub title_cn: String,
    /// English title, if the model provided one.
    pub title_en: Option<String>,
    /// Introduction paragraph, if present.
    pub introduction: Option<String>,
    /// Best-effort content-type classification and rationale, if the outline
    /// declared one (§4.D `extract_content_type_info`).
    pub content_type: Option<String>,
    /// Per-chapter plans, in outline order.
    pub chapters: Vec<ChapterPlan>,
    /// A rough total-word estimate, if the model provided one.
    pub total_estimated_words: Option<u32>,
}

impl OutlinePlan {
    /// Number of chapters in this plan.
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }
}

/// Front matter for a finalized on-disk document (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFrontMatter {
    /// Chinese title.
    pub title_cn: String,
    /// English title, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_en: Option<String>,
    /// Upload date, free-form per the original source.
    pub upload_date: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// Number of chapter sections in the body.
    pub chapter_count: u32,
    /// Version number for this `doc_hash`, starting at 1.
    pub version: u32,
    /// 8-hex-char content hash.
    pub hash: String,
    /// Present for video-sourced documents; mutually exclusive with `content_identifier`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Present for document-sourced documents; mutually exclusive with `video_url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_identifier: Option<String>,
    /// Set when this document was generated in `ultra` mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ultra_deep: Option<bool>,
    /// The version this document was upgraded from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u32>,
}

impl DocumentFrontMatter {
    /// The `source_identifier` this document was generated from (§3): the
    /// one of `video_url`/`content_identifier` that is set.
    pub fn source_identifier(&self) -> Option<&str> {
        self.video_url
            .as_deref()
            .or(self.content_identifier.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_ring_drops_oldest_past_capacity() {
        let mut state = TaskState::new("t1", 2);
        state.push_log("a");
        state.push_log("b");
        state.push_log("c");
        assert_eq!(state.log_ring.len(), 2);
        assert_eq!(state.log_ring.front().unwrap(), "b");
    }

    #[test]
    fn status_transitions_follow_the_allowed_graph() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::AwaitingConfirmation));
        assert!(TaskStatus::AwaitingConfirmation.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Processing));
        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn source_identifier_picks_whichever_is_set() {
        let fm = DocumentFrontMatter {
            title_cn: "t".into(),
            title_en: None,
            upload_date: "2026-01-01".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            chapter_count: 1,
            version: 1,
            hash: "abcd1234".into(),
            video_url: None,
            content_identifier: Some("document://abc".into()),
            is_ultra_deep: None,
            base_version: None,
        };
        assert_eq!(fm.source_identifier(), Some("document://abc"));
    }
}
