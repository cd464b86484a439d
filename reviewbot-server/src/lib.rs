pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod github;
pub mod oracle;
pub mod pipeline;
pub mod store;
pub mod webhook;

pub use error::PipelineError;
pub use pipeline::{AnalysisPipeline, PipelineOutcome, PullRequestEvent};

pub struct AppState {
    pub pipeline: AnalysisPipeline,
    pub webhook_secret: Option<String>,
}
