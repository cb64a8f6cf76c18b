pub mod citation;
pub mod orchestrator;
pub mod prompt;
pub mod shell;

pub use citation::{CitationNormalizer, NO_SOURCE_CITATION};
pub use orchestrator::{QaOrchestrator, ERROR_ANSWER};
pub use prompt::NOT_FOUND_ANSWER;
pub use shell::{run_shell, Assistant};
