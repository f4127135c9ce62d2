use engager_core::LlmError;

pub const MIN_DRAFT_CHARS: usize = 50;
pub const MAX_DRAFT_CHARS: usize = 2000;

/// Template residue that local models tend to leave in a draft.
const PLACEHOLDER_MARKERS: [&str; 6] = ["[insert", "[your", "[company", "placeholder", "{{", "}}"];

/// Reject drafts that are too short, too long, or still contain template placeholders.
pub fn validate_draft(text: &str) -> Result<(), LlmError> {
    let length = text.chars().count();
    if length < MIN_DRAFT_CHARS {
        return Err(LlmError::DraftRejected {
            reason: format!("too short ({length} chars, minimum {MIN_DRAFT_CHARS})"),
        });
    }
    if length > MAX_DRAFT_CHARS {
        return Err(LlmError::DraftRejected {
            reason: format!("too long ({length} chars, maximum {MAX_DRAFT_CHARS})"),
        });
    }

    let lowered = text.to_lowercase();
    if let Some(marker) = PLACEHOLDER_MARKERS
        .iter()
        .find(|marker| lowered.contains(*marker))
    {
        return Err(LlmError::DraftRejected {
            reason: format!("contains placeholder text `{marker}`"),
        });
    }

    Ok(())
}
