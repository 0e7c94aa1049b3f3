//! One-shot resume instructions and the outcome of mount-time resumption.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::step::Step;
use crate::api::ApiError;
use crate::store::StoreError;

/// Directive telling the next controller mount which step to jump to.
///
/// Persisted under [`crate::store::RESUME_KEY`] either as a bare step name
/// or as this object in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeInstruction {
    pub step: String,
    #[serde(default)]
    pub mark_eligibility_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
}

/// Errors decoding a persisted resume instruction
#[derive(Error, Debug)]
pub enum ResumeDecodeError {
    #[error("resume instruction is empty")]
    Empty,

    #[error("resume instruction is malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("resume instruction names unknown step '{0}'")]
    UnknownStep(String),
}

impl ResumeInstruction {
    pub fn new(step: Step) -> Self {
        Self {
            step: step.as_str().to_string(),
            mark_eligibility_done: false,
            case_id: None,
        }
    }

    pub fn with_eligibility_done(mut self, done: bool) -> Self {
        self.mark_eligibility_done = done;
        self
    }

    pub fn with_case_id(mut self, case_id: Option<String>) -> Self {
        self.case_id = case_id;
        self
    }

    /// Decode a stored value: a JSON object, a JSON string, or a bare name
    pub fn decode(raw: &str) -> Result<Self, ResumeDecodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ResumeDecodeError::Empty);
        }

        if trimmed.starts_with('{') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        if trimmed.starts_with('"') {
            let step: String = serde_json::from_str(trimmed)?;
            return Ok(Self::bare(step));
        }
        Ok(Self::bare(trimmed.to_string()))
    }

    /// Encode in the structured form
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and bools cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| self.step.clone())
    }

    /// The canonical step this instruction points at
    pub fn target(&self) -> Result<Step, ResumeDecodeError> {
        Step::canonicalize(&self.step)
            .ok_or_else(|| ResumeDecodeError::UnknownStep(self.step.clone()))
    }

    fn bare(step: String) -> Self {
        Self {
            step,
            mark_eligibility_done: false,
            case_id: None,
        }
    }
}

/// Why mount-time resumption fell back to the landing step
#[derive(Error, Debug)]
pub enum ResumeFailure {
    #[error("could not read resume store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] ResumeDecodeError),

    #[error("could not load saved progress: {0}")]
    Backend(ApiError),

    #[error("saved progress names unknown step '{0}'")]
    UnknownSavedStep(String),
}

/// Where the controller's starting step came from
#[derive(Debug)]
pub enum ResumeOutcome {
    /// A persisted resume instruction was consumed
    Instruction {
        step: Step,
        eligibility_seeded: bool,
    },
    /// Saved onboarding progress was loaded from the backend
    SavedProgress { step: Step },
    /// Nothing to resume
    Fresh,
    /// Resume data existed but could not be used; the wizard starts fresh
    Fallback { reason: ResumeFailure },
}

impl ResumeOutcome {
    /// The step the outcome resumed to, if any
    pub fn resumed_step(&self) -> Option<Step> {
        match self {
            ResumeOutcome::Instruction { step, .. } | ResumeOutcome::SavedProgress { step } => {
                Some(*step)
            }
            ResumeOutcome::Fresh | ResumeOutcome::Fallback { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ResumeOutcome::Fallback { .. })
    }
}
