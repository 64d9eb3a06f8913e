//! PostProcessorPipeline (§4.G): registered plug-ins run after assembly,
//! grounded on `original_source/.../post_processors/pipeline.py`'s
//! `PostProcessorPipeline` (priority-ordered register/run, sync
//! awaits-and-replaces, fire-and-forget spawns and never fails the
//! pipeline), re-expressed as `#[async_trait]` trait objects with
//! `tokio::spawn` for the fire-and-forget path — the same dispatch idiom
//! subx-cli's worker pool uses for background execution.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::Result;

/// Whether a [`PostProcessor`] is awaited inline or dispatched in the
/// background (§4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Async {
    /// Awaited; its outcome can replace the rolling content.
    Sync,
    /// Spawned in the background; the pipeline never waits for it.
    FireAndForget,
}

/// Immutable task facts plus a shared mutable scratch map, carried to every
/// processor (§4.G `PostProcessorContext`).
#[derive(Clone)]
pub struct PostProcessorContext {
    /// The task this run belongs to.
    pub task_id: String,
    /// The document's content hash.
    pub doc_hash: String,
    /// The report's Chinese title.
    pub title: String,
    /// Number of chapters in the assembled report.
    pub chapter_count: u32,
    /// Whether this report was generated in `ultra` mode.
    pub is_ultra: bool,
    /// The source video URL, if this task was video-sourced.
    pub video_url: Option<String>,
    /// The task's scratch directory (`tasks/<day>/<slot>-<id>-<kind>/`).
    pub task_dir: PathBuf,
    /// Path to the finalized article on disk.
    pub article_path: PathBuf,
    /// Inter-processor scratch data, shared and mutable across the run.
    pub extra: Arc<AsyncMutex<Map<String, Value>>>,
}

/// What a processor's `process` call produced (§4.G).
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Replacement content, if this processor rewrites the rolling report.
    pub content: Option<String>,
    /// A short human-readable summary of what this processor did.
    pub message: String,
    /// Free-form descriptions of changes made, for the aggregate summary.
    pub changes: Vec<String>,
}

/// A plug-in run after assembly (§4.G).
#[async_trait]
pub trait PostProcessor: Send + Sync {
    /// Stable identifier, used in logs and the aggregate summary.
    fn name(&self) -> &str;

    /// Total execution order across all registered processors, ascending.
    fn priority(&self) -> i32;

    /// Whether this processor runs inline (awaited) or in the background.
    fn is_async(&self) -> Async;

    /// Whether this processor applies to `ctx`. Pure and synchronous.
    fn should_run(&self, ctx: &PostProcessorContext) -> bool;

    /// Run this processor. For `Async::Sync` processors, an `Err` is logged
    /// and, if [`PostProcessor::stop_on_error`] is set, aborts the pipeline.
    async fn process(&self, ctx: &PostProcessorContext) -> Result<ProcessOutcome>;

    /// Whether a sync processor's failure should abort the remaining
    /// pipeline (§4.G "if `stop_on_error` is set, pipeline aborts").
    fn stop_on_error(&self) -> bool {
        false
    }
}

/// The summary [`PostProcessorPipeline::run`] returns alongside the final
/// content.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    /// One line per processor that ran (sync) or was dispatched (fire-and-forget).
    pub messages: Vec<String>,
}

/// Sorts registered processors by priority ascending and runs them in order
/// after assembly (§4.G).
#[derive(Default)]
pub struct PostProcessorPipeline {
    processors: Vec<Arc<dyn PostProcessor>>,
}

impl PostProcessorPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor`, keeping the processor list sorted by priority
    /// ascending (§4.G "sorts processors by priority ascending at
    /// registration time").
    pub fn register(&mut self, processor: Arc<dyn PostProcessor>) {
        self.processors.push(processor);
        self.processors.sort_by_key(|p| p.priority());
    }

    /// Run every registered, applicable processor over `content`, returning
    /// the final content and an aggregate summary.
    pub async fn run(&self, content: String, ctx: &PostProcessorContext) -> (String, PipelineSummary) {
        let mut content = content;
        let mut summary = PipelineSummary::default();

        for processor in &self.processors {
            if !processor.should_run(ctx) {
                continue;
            }
            match processor.is_async() {
                Async::FireAndForget => {
                    let name = processor.name().to_string();
                    let spawned = Arc::clone(processor);
                    let spawned_ctx = ctx.clone();
                    let spawned_name = name.clone();
                    tokio::spawn(async move {
                        if let Err(e) = spawned.process(&spawned_ctx).await {
                            log::warn!("fire-and-forget post-processor {spawned_name} failed: {e}");
                        }
                    });
                    summary.messages.push(format!("{name}: dispatched in background"));
                }
                Async::Sync => match processor.process(ctx).await {
                    Ok(outcome) => {
                        if let Some(new_content) = outcome.content {
                            content = new_content;
                        }
                        summary.messages.push(outcome.message);
                    }
                    Err(e) => {
                        log::warn!("post-processor {} failed: {e}", processor.name());
                        if processor.stop_on_error() {
                            break;
                        }
                    }
                },
            }
        }

        (content, summary)
    }
}
