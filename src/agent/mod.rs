pub mod extract;
pub mod planner;
pub mod prompt;

pub use extract::{extract_json, extract_tool_calls, ExtractError};
pub use planner::{Exchange, Planner, PlannerConfig, TOOL_OUTPUT_MAX_CHARS};
pub use prompt::PromptBuilder;
