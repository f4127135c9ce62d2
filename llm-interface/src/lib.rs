pub mod gemini;
pub mod lm_studio;
pub mod validation;

pub use gemini::{parse_discovery_output, GeminiCli};
pub use lm_studio::{system_prompt_from_template, LmStudioClient};
pub use validation::validate_draft;

use engager_core::{CoreError, LlmError};
use std::path::Path;
use tracing::info;

/// Read a prompt template from disk, treating a missing or blank file as an error.
pub fn load_template(path: &Path) -> Result<String, CoreError> {
    let missing = || LlmError::MissingTemplate {
        path: path.display().to_string(),
    };

    let template = std::fs::read_to_string(path).map_err(|_| missing())?;
    if template.trim().is_empty() {
        return Err(missing().into());
    }

    info!("Loaded prompt template from {}", path.display());
    Ok(template)
}
