use geolens_core::BatchState;
use geolens_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown prompt template '{0}'")]
    TemplateNotFound(String),

    #[error("template '{template}' needs a value for '{variable}'")]
    MissingVariable { template: String, variable: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no available provider matches the project's model list")]
    NoModelsSelected,

    #[error("prompt battery is empty; every template failed to render")]
    NoPrompts,

    #[error("analysis produced no successful cells (batch {state}): {diagnostics}")]
    AnalysisFailed {
        state: BatchState,
        diagnostics: String,
    },

    #[error("failed to persist report: {0}")]
    Store(#[from] StoreError),
}
