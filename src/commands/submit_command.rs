//! `submit` command implementation: builds an [`Orchestrator`] from the
//! injected configuration, submits one source, and streams its event
//! stream to the terminal (§6 Progress API), grounded on subx-cli's
//! `commands::sync_command`'s pattern of building a progress bar from a
//! streamed percentage.

use crate::cli::submit_args::{SubmitArgs, SubmitSource};
use crate::cli::ui;
use crate::config::ConfigService;
use crate::core::factory::ComponentFactory;
use crate::core::orchestrator::{Orchestrator, SubmitOutcome, SubmitStatus};
use crate::core::task_manager::Event;
use crate::error::OrchestratorError;
use crate::Result;

/// Execute the `submit` subcommand: wire an [`Orchestrator`], submit the
/// requested source, and stream progress to stdout until a terminal event
/// arrives.
///
/// # Errors
/// Returns an error if the orchestrator cannot be built, the source cannot
/// be read, or the submission itself is rejected (e.g. `queue_full`).
pub async fn execute(args: SubmitArgs, config_service: &dyn ConfigService) -> Result<()> {
    let factory = ComponentFactory::new(config_service)?;
    let orchestrator = factory.create_orchestrator()?;

    let outcome = match args.source {
        SubmitSource::Video(video) => {
            let mode = video.generation.mode.into();
            let priority = video.generation.priority.into();
            let force = video.generation.force;
            orchestrator.submit_video(&video.url, mode, priority, force)?
        }
        SubmitSource::Document(document) => {
            let bytes = std::fs::read(&document.path)?;
            let mode = document.generation.mode.into();
            let priority = document.generation.priority.into();
            let force = document.generation.force;
            let source_ref = document.path.to_string_lossy().to_string();
            let original_filename = document
                .path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| source_ref.clone());
            orchestrator.submit_document(&source_ref, &bytes, &original_filename, mode, priority, force)?
        }
    };

    report_and_stream(&orchestrator, outcome).await
}

async fn report_and_stream(orchestrator: &Orchestrator, outcome: SubmitOutcome) -> Result<()> {
    match outcome.status {
        SubmitStatus::Exists => {
            ui::print_success(&format!(
                "already generated: doc_hash={} filename={}",
                outcome.doc_hash.unwrap_or_default(),
                outcome.filename.unwrap_or_default(),
            ));
            return Ok(());
        }
        SubmitStatus::InProgress => {
            ui::print_warning(&format!(
                "already in flight as task {}; streaming its progress instead",
                outcome.task_id
            ));
        }
        SubmitStatus::Created => {
            ui::print_success(&format!("submitted as task {}", outcome.task_id));
        }
    }

    let mut subscription = orchestrator.subscribe(&outcome.task_id).ok_or_else(|| {
        OrchestratorError::invalid_input(format!("unknown task {}", outcome.task_id))
    })?;

    let progress_bar = ui::create_progress_bar();
    loop {
        match subscription.recv().await {
            Some(Event::Log { message }) => ui::print_log(&message),
            Some(Event::Progress { progress, message }) => {
                progress_bar.set_position(u64::from(progress));
                if !message.is_empty() {
                    ui::print_log(&message);
                }
            }
            Some(Event::PreAnalysis { message, .. }) => ui::print_warning(&message),
            Some(Event::Result {
                title,
                filename,
                hash,
                ..
            }) => {
                progress_bar.finish_and_clear();
                ui::print_success(&format!("done: {title} -> {filename} (hash={hash})"));
                return Ok(());
            }
            Some(Event::Error {
                error_type,
                message,
                suggestions,
            }) => {
                progress_bar.finish_and_clear();
                ui::print_error(&format!("{error_type}: {message}"));
                for suggestion in suggestions {
                    ui::print_warning(&suggestion);
                }
                return Err(OrchestratorError::config(message));
            }
            None => {
                progress_bar.finish_and_clear();
                return Err(OrchestratorError::config(
                    "event stream closed before a terminal event",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::submit_args::{DocumentArgs, GenerationArgs, ModeArg, PriorityArg};
    use crate::config::test_service::TestConfigService;
    use crate::config::Config;

    #[tokio::test]
    async fn execute_rejects_a_missing_document_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.llm.api_key = Some("test-key".to_string());
        config.storage.documents_dir = dir.path().join("documents").to_string_lossy().to_string();
        config.storage.tasks_dir = dir.path().join("tasks").to_string_lossy().to_string();
        let service = TestConfigService::new(config);

        let args = SubmitArgs {
            source: SubmitSource::Document(DocumentArgs {
                path: dir.path().join("missing.txt"),
                generation: GenerationArgs {
                    mode: ModeArg::Deep,
                    priority: PriorityArg::Normal,
                    force: false,
                },
            }),
        };

        let result = execute(args, &service).await;
        assert!(result.is_err());
    }
}
