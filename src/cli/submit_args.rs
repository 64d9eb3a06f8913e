//! Arguments for the `submit` subcommand.

use clap::{Args, Subcommand};

/// Submit a source artifact and watch it through to a finished report.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Which kind of source to submit.
    #[command(subcommand)]
    pub source: SubmitSource,
}

/// The source kinds the demo CLI can submit (§6 `submit_video`/`submit_document`).
#[derive(Subcommand, Debug)]
pub enum SubmitSource {
    /// Submit a video URL whose transcript has already been fetched.
    Video(VideoArgs),
    /// Submit a local text file as an already-extracted document.
    Document(DocumentArgs),
}

/// Shared generation options for either source kind.
#[derive(Args, Debug)]
pub struct GenerationArgs {
    /// Depth/length preset.
    #[arg(long, value_enum, default_value = "deep")]
    pub mode: ModeArg,

    /// Scheduling priority.
    #[arg(long, value_enum, default_value = "normal")]
    pub priority: PriorityArg,

    /// Bypass dedup against an existing document or in-flight task for the
    /// same source (§6 `force`).
    #[arg(long)]
    pub force: bool,
}

/// `submit video <url>`.
#[derive(Args, Debug)]
pub struct VideoArgs {
    /// The video URL to analyze.
    pub url: String,

    #[command(flatten)]
    pub generation: GenerationArgs,
}

/// `submit document <path>`.
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Path to a local text file to analyze.
    pub path: std::path::PathBuf,

    #[command(flatten)]
    pub generation: GenerationArgs,
}

/// CLI-facing mirror of [`crate::domain::model::Mode`].
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ModeArg {
    Deep,
    Ultra,
}

impl From<ModeArg> for crate::domain::model::Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Deep => crate::domain::model::Mode::Deep,
            ModeArg::Ultra => crate::domain::model::Mode::Ultra,
        }
    }
}

/// CLI-facing mirror of [`crate::domain::model::Priority`].
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PriorityArg {
    Low,
    Normal,
    High,
    Urgent,
}

impl From<PriorityArg> for crate::domain::model::Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => crate::domain::model::Priority::Low,
            PriorityArg::Normal => crate::domain::model::Priority::Normal,
            PriorityArg::High => crate::domain::model::Priority::High,
            PriorityArg::Urgent => crate::domain::model::Priority::Urgent,
        }
    }
}
