//! The analysis pipeline: prompt battery, concurrent batch execution across
//! providers, structured extraction, and report assembly.

pub mod analysis;
pub mod batch;
pub mod context;
pub mod error;
pub mod extract;
pub mod schemas;
pub mod templates;

pub use analysis::{run_analysis, unified_kpi_results, AnalysisOutcome};
pub use batch::{BatchCell, BatchExecution, BatchOrchestrator, CellOutcome, FailureKind};
pub use context::BatchContext;
pub use error::{PipelineError, TemplateError};
pub use extract::{extract, normalize_for_brand, parse_judgment, Extraction, Repair};
pub use schemas::schema_for;
pub use templates::{build_prompt_battery, render, PromptInstance};
