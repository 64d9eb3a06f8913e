//! Workflow (§4.F): drives one task through outline -> chapters ->
//! conclusion -> assembly -> post-processing. Grounded directly on
//! `original_source/.../domain/workflows/base.py`'s `AnalysisWorkflow.run()`
//! template method, but collapsed from its three concrete subclasses
//! (video/document/reprocess) into a single generic struct parameterized by
//! a [`SourceProvider`]: once a prepared source text is in hand, every stage
//! downstream of it is identical regardless of task kind (§9).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, GenerationMode};
use crate::core::postprocess::{PostProcessorContext, PostProcessorPipeline};
use crate::core::store::{DocumentStore, HashRegistry};
use crate::core::task_manager::TaskManager;
use crate::domain::assembler::{self, AssemblyInput};
use crate::domain::model::{DocumentFrontMatter, Mode, OutlinePlan, Task, TaskError, TaskKind};
use crate::domain::outline;
use crate::domain::prompts::{
    build_chapter_prompt, build_conclusion_prompt, build_outline_prompt, normalize_chapter_heading,
    SequentialContext,
};
use crate::error::OrchestratorError;
use crate::services::llm::{GenerateOptions, LlmClient, ThinkingLevel};
use crate::Result;

/// Source text and identity handed to a [`Workflow`] run; the boundary the
/// excluded source-acquisition subsystem (video transcript fetch, document
/// text extraction) feeds across (§1, §9).
#[derive(Debug, Clone)]
pub struct PreparedSource {
    /// Already-extracted plain text to analyze.
    pub content: String,
    /// Canonical identity, matching `task.source_identifier`.
    pub source_identifier: String,
    /// Present for video-sourced tasks; mutually exclusive with `content_identifier`.
    pub video_url: Option<String>,
    /// Present for document-sourced tasks; mutually exclusive with `video_url`.
    pub content_identifier: Option<String>,
    /// Free-form upload date recorded in the document's front matter.
    pub upload_date: String,
}

/// Acquires a task's prepared source text. A real deployment's transport
/// layer owns the concrete implementations (video transcript fetch,
/// document parsing); this crate depends only on the trait, since actual
/// source acquisition is excluded from its scope (§1).
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self, task: &Task) -> Result<PreparedSource>;
}

/// Reads a local plain-text or Markdown file as already-prepared source
/// text, for [`TaskKind::Document`] tasks. PDF/Office extraction itself
/// stays out of scope (§1) — the file at `task.source_ref` is assumed
/// already extracted to text.
pub struct LocalDocumentSourceProvider;

#[async_trait]
impl SourceProvider for LocalDocumentSourceProvider {
    async fn fetch(&self, task: &Task) -> Result<PreparedSource> {
        let content = tokio::fs::read_to_string(&task.source_ref).await.map_err(|e| {
            OrchestratorError::source_unavailable(format!("failed to read {}: {e}", task.source_ref))
        })?;
        if content.trim().is_empty() {
            return Err(OrchestratorError::source_unavailable("document has no extractable text"));
        }
        Ok(PreparedSource {
            content,
            source_identifier: task.source_identifier.clone(),
            video_url: None,
            content_identifier: Some(task.source_identifier.clone()),
            upload_date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        })
    }
}

/// Everything [`Workflow::run`] needs besides the task and its prepared source.
pub struct WorkflowDeps {
    pub llm: Arc<dyn LlmClient>,
    pub task_manager: Arc<TaskManager>,
    pub store: Arc<DocumentStore>,
    pub hash_registry: Arc<StdMutex<HashRegistry>>,
    pub pipeline: Arc<PostProcessorPipeline>,
    pub config: Config,
}

struct WorkflowOutcome {
    title: String,
    filename: String,
    doc_hash: String,
}

/// Drives one task through all five stages. [`Workflow::run`] never returns
/// an error to its caller: every failure is converted to a structured
/// [`TaskError`] and published via [`TaskManager::set_error`], so a task
/// never sits stuck in `processing` (§4.F).
pub struct Workflow {
    deps: WorkflowDeps,
}

impl Workflow {
    pub fn new(deps: WorkflowDeps) -> Self {
        Self { deps }
    }

    /// Run `task` to completion, reporting progress/logs/result through the
    /// shared [`TaskManager`]. `task_dir` is the scratch directory stage
    /// intermediates (`outline.md`, `chapter_N.md`, `conclusion.md`,
    /// `final_report.md`) are written under (§6).
    pub async fn run(&self, task: &Task, source: PreparedSource, task_dir: PathBuf) {
        let task_id = task.task_id.clone();
        match self.run_inner(task, &source, &task_dir).await {
            Ok(outcome) => {
                self.deps
                    .task_manager
                    .send_result(&task_id, outcome.title, outcome.filename, outcome.doc_hash);
            }
            Err(e) => {
                let err = TaskError {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                    suggestions: e.suggestions(),
                };
                log::warn!("task {task_id} failed: {}", err.message);
                self.deps.task_manager.set_error(&task_id, err);
            }
        }
    }

    async fn run_inner(&self, task: &Task, source: &PreparedSource, task_dir: &Path) -> Result<WorkflowOutcome> {
        tokio::fs::create_dir_all(task_dir).await?;

        self.deps
            .task_manager
            .update_progress(&task.task_id, 5, "正在启动深度分析流程...");

        let mut outline_raw = self.run_outline_stage(task, source).await?;
        let mut plan = outline::parse_outline(&outline_raw)?;

        if task.mode == Mode::Ultra && plan.chapter_count() > self.deps.config.generation.ultra_chapter_limit {
            self.deps.task_manager.send_log(
                &task.task_id,
                format!("章节数过多（{}章），正在重新分析内容结构...", plan.chapter_count()),
            );
            outline_raw = self.run_outline_stage(task, source).await?;
            plan = outline::parse_outline(&outline_raw)?;
            if plan.chapter_count() > self.deps.config.generation.ultra_chapter_limit {
                return Err(OrchestratorError::ChapterCountExceeded);
            }
        }

        tokio::fs::write(task_dir.join("outline.md"), &outline_raw).await?;
        self.deps.task_manager.update_progress(
            &task.task_id,
            25,
            format!("成功生成标题《{}》和 {} 个章节的分析框架", plan.title_cn, plan.chapter_count()),
        );

        if self.deps.config.generation.require_confirmation {
            self.deps
                .task_manager
                .pre_analysis_ready(&task.task_id, pre_analysis_profile(&plan));
            self.deps.task_manager.wait_for_confirmation(&task.task_id).await;
        }

        let chapters = self.run_chapters_stage(task, source, &plan, &outline_raw, task_dir).await?;

        let conclusion = self.run_conclusion_stage(task, source, &chapters, task_dir).await?;
        self.deps.task_manager.update_progress(&task.task_id, 90, "收尾内容生成完成");

        let (content, outcome) = self
            .run_assembly_stage(task, source, &plan, &chapters, &conclusion, task_dir)
            .await?;

        self.deps.task_manager.update_progress(&task.task_id, 95, "正在进行精加工...");
        self.run_postprocess_stage(task, &outcome, content, &plan, source, task_dir).await;

        self.deps.task_manager.update_progress(&task.task_id, 100, "分析完成！");
        Ok(outcome)
    }

    /// `LlmClient::generate` already retries transient failures internally
    /// against the provider's own `max_retries`/`retry_backoff_base`
    /// budget (§4.A) — this just awaits it rather than retrying again on
    /// top.
    async fn call_llm(&self, prompt: &str, opts: GenerateOptions) -> Result<String> {
        self.deps.llm.generate(prompt, &opts).await
    }

    async fn run_outline_stage(&self, task: &Task, source: &PreparedSource) -> Result<String> {
        let prompt = build_outline_prompt(&source.content, task.mode);
        self.call_llm(&prompt, GenerateOptions::default()).await
    }

    async fn run_chapters_stage(
        &self,
        task: &Task,
        source: &PreparedSource,
        plan: &OutlinePlan,
        outline_raw: &str,
        task_dir: &Path,
    ) -> Result<Vec<String>> {
        self.deps
            .task_manager
            .send_log(&task.task_id, format!("步骤 2/4: 正在生成 {} 个核心章节...", plan.chapter_count()));

        let chapters = match self.deps.config.generation.mode {
            GenerationMode::Concurrent => self.run_chapters_concurrent(task, source, plan, outline_raw).await?,
            GenerationMode::Sequential => self.run_chapters_sequential(task, source, plan, outline_raw).await?,
        };

        for (chapter, body) in plan.chapters.iter().zip(&chapters) {
            tokio::fs::write(task_dir.join(format!("chapter_{}.md", chapter.index)), body).await?;
        }

        self.deps.task_manager.update_progress(
            &task.task_id,
            75,
            format!("章节分析完成（{}/{}）", chapters.len(), plan.chapter_count()),
        );
        Ok(chapters)
    }

    async fn run_chapters_concurrent(
        &self,
        task: &Task,
        source: &PreparedSource,
        plan: &OutlinePlan,
        outline_raw: &str,
    ) -> Result<Vec<String>> {
        let stagger_unit = Duration::from_secs_f64(self.deps.config.generation.concurrent_delay_secs);
        let total = plan.chapter_count().max(1);

        let futures = plan.chapters.iter().enumerate().map(|(i, chapter)| {
            let stagger = stagger_unit * i as u32;
            async move {
                if !stagger.is_zero() {
                    tokio::time::sleep(stagger).await;
                }
                let prompt = build_chapter_prompt(&source.content, outline_raw, chapter, None);
                let raw = self
                    .call_llm(
                        &prompt,
                        GenerateOptions {
                            thinking: ThinkingLevel::Low,
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok::<String, OrchestratorError>(normalize_chapter_heading(&raw, chapter.index, &chapter.title))
            }
        });

        let results = futures::future::join_all(futures).await;
        let mut chapters = Vec::with_capacity(results.len());
        for (i, result) in results.into_iter().enumerate() {
            let body = result?;
            chapters.push(body);
            self.deps.task_manager.update_progress(
                &task.task_id,
                25 + (50 * (i + 1) / total) as u8,
                format!("章节 {} 生成完成", i + 1),
            );
        }
        Ok(chapters)
    }

    async fn run_chapters_sequential(
        &self,
        task: &Task,
        source: &PreparedSource,
        plan: &OutlinePlan,
        outline_raw: &str,
    ) -> Result<Vec<String>> {
        let total = plan.chapter_count().max(1);
        let mut chapters: Vec<String> = Vec::with_capacity(plan.chapter_count());
        let mut summaries: Vec<String> = Vec::new();

        for (i, chapter) in plan.chapters.iter().enumerate() {
            let prompt = {
                let sequential = chapters
                    .last()
                    .map(|prev: &String| SequentialContext {
                        previous_chapter: prev.as_str(),
                        previous_summaries: &summaries,
                    });
                build_chapter_prompt(&source.content, outline_raw, chapter, sequential)
            };
            let raw = self
                .call_llm(
                    &prompt,
                    GenerateOptions {
                        thinking: ThinkingLevel::Low,
                        ..Default::default()
                    },
                )
                .await?;
            let body = normalize_chapter_heading(&raw, chapter.index, &chapter.title);
            if let Some(prev) = chapters.last() {
                summaries.push(summarize_for_continuity(prev));
            }
            chapters.push(body);
            self.deps.task_manager.update_progress(
                &task.task_id,
                25 + (50 * (i + 1) / total) as u8,
                format!("章节 {} 生成完成", i + 1),
            );
        }
        Ok(chapters)
    }

    async fn run_conclusion_stage(
        &self,
        task: &Task,
        source: &PreparedSource,
        chapters: &[String],
        task_dir: &Path,
    ) -> Result<String> {
        self.deps.task_manager.send_log(&task.task_id, "步骤 3/4: 正在生成收尾内容...");
        let all_chapters = chapters.join("\n\n---\n\n");
        let prompt = build_conclusion_prompt(&source.content, &all_chapters);
        let raw = self.call_llm(&prompt, GenerateOptions::default()).await?;
        tokio::fs::write(task_dir.join("conclusion.md"), &raw).await?;
        Ok(raw)
    }

    async fn run_assembly_stage(
        &self,
        task: &Task,
        source: &PreparedSource,
        plan: &OutlinePlan,
        chapters: &[String],
        conclusion: &str,
        task_dir: &Path,
    ) -> Result<(String, WorkflowOutcome)> {
        self.deps.task_manager.send_log(&task.task_id, "步骤 4/4: 正在整合最终报告...");

        let version = self.deps.store.next_version(&source.source_identifier)?;
        let doc_hash = crate::core::store::doc_hash(&source.source_identifier);
        let front_matter = DocumentFrontMatter {
            title_cn: plan.title_cn.clone(),
            title_en: plan.title_en.clone(),
            upload_date: source.upload_date.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            chapter_count: chapters.len() as u32,
            version,
            hash: doc_hash.clone(),
            video_url: source.video_url.clone(),
            content_identifier: source.content_identifier.clone(),
            is_ultra_deep: (task.mode == Mode::Ultra).then_some(true),
            base_version: None,
        };

        let input = AssemblyInput {
            front_matter: &front_matter,
            introduction: plan.introduction.as_deref().unwrap_or_default(),
            chapters,
            conclusion,
        };
        let content = assembler::assemble(&input)?;
        tokio::fs::write(task_dir.join("final_report.md"), &content).await?;

        let filename = assembler::generate_filename(plan.title_en.as_deref(), &plan.title_cn, version);
        self.deps.store.write_atomic(&filename, &content).await?;

        let versions = self.deps.store.versions_for_source(&source.source_identifier)?;
        {
            let mut registry = self.deps.hash_registry.lock().expect("hash registry lock poisoned");
            registry.refresh(&source.source_identifier, &versions);
        }

        Ok((
            content,
            WorkflowOutcome {
                title: plan.title_cn.clone(),
                filename,
                doc_hash,
            },
        ))
    }

    async fn run_postprocess_stage(
        &self,
        task: &Task,
        outcome: &WorkflowOutcome,
        content: String,
        plan: &OutlinePlan,
        source: &PreparedSource,
        task_dir: &Path,
    ) {
        let ctx = PostProcessorContext {
            task_id: task.task_id.clone(),
            doc_hash: outcome.doc_hash.clone(),
            title: outcome.title.clone(),
            chapter_count: plan.chapter_count() as u32,
            is_ultra: task.mode == Mode::Ultra,
            video_url: source.video_url.clone(),
            task_dir: task_dir.to_path_buf(),
            article_path: self.deps.store.documents_dir().join(&outcome.filename),
            extra: Arc::new(tokio::sync::Mutex::new(serde_json::Map::new())),
        };
        let (_final_content, summary) = self.deps.pipeline.run(content, &ctx).await;
        for message in summary.messages {
            self.deps.task_manager.send_log(&task.task_id, message);
        }
    }
}

/// The pre-analysis profile exposed while a confirmation-gated workflow
/// pauses at `awaiting_confirmation` (§4.F's optional variant).
fn pre_analysis_profile(plan: &OutlinePlan) -> serde_json::Map<String, serde_json::Value> {
    let mut data = serde_json::Map::new();
    data.insert("title_cn".into(), serde_json::json!(plan.title_cn));
    data.insert("chapter_count".into(), serde_json::json!(plan.chapter_count()));
    if let Some(content_type) = &plan.content_type {
        data.insert("content_type".into(), serde_json::json!(content_type));
    }
    data
}

/// A short (roughly 500-character) prefix of a chapter's body, carried
/// forward as continuity context for sequential generation (§4.F stage 2).
fn summarize_for_continuity(chapter_body: &str) -> String {
    chapter_body.chars().take(500).collect()
}
