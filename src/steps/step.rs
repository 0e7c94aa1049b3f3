//! The onboarding step vocabulary and its fixed ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One named stage of the onboarding wizard.
///
/// Declaration order is the travel order; `index()` reads it from
/// [`Step::ALL`] rather than from the discriminant so the table stays the
/// single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Landing,
    Questionnaire,
    Upload,
    Processing,
    Eligibility,
    Signup,
    VerifyEmail,
    Voice,
    Esignature,
    Analysis,
    Payment,
    PostPayment,
    MedicalDocuments,
    CaseDocuments,
    Submission,
    Success,
}

impl Step {
    /// Every step, in travel order
    pub const ALL: [Step; 16] = [
        Step::Landing,
        Step::Questionnaire,
        Step::Upload,
        Step::Processing,
        Step::Eligibility,
        Step::Signup,
        Step::VerifyEmail,
        Step::Voice,
        Step::Esignature,
        Step::Analysis,
        Step::Payment,
        Step::PostPayment,
        Step::MedicalDocuments,
        Step::CaseDocuments,
        Step::Submission,
        Step::Success,
    ];

    /// Position of this step in [`Step::ALL`]
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    /// Wire name (kebab-case)
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Landing => "landing",
            Step::Questionnaire => "questionnaire",
            Step::Upload => "upload",
            Step::Processing => "processing",
            Step::Eligibility => "eligibility",
            Step::Signup => "signup",
            Step::VerifyEmail => "verify-email",
            Step::Voice => "voice",
            Step::Esignature => "esignature",
            Step::Analysis => "analysis",
            Step::Payment => "payment",
            Step::PostPayment => "post-payment",
            Step::MedicalDocuments => "medical-documents",
            Step::CaseDocuments => "case-documents",
            Step::Submission => "submission",
            Step::Success => "success",
        }
    }

    /// Account-creation steps a signed-in user never sees
    pub fn is_account_step(self) -> bool {
        matches!(self, Step::Signup | Step::VerifyEmail)
    }

    /// Replace account-creation steps with the first post-signup step
    /// when the user is already authenticated.
    pub fn for_session(self, authenticated: bool) -> Step {
        if authenticated && self.is_account_step() {
            Step::Voice
        } else {
            self
        }
    }

    /// Resolve a persisted step name, including legacy aliases.
    ///
    /// Persisted values outlive vocabulary changes, so this accepts older
    /// spellings and separators that [`FromStr`] rejects.
    pub fn canonicalize(raw: &str) -> Option<Step> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['_', ' '], "-");

        if let Ok(step) = normalized.parse() {
            return Some(step);
        }

        let step = match normalized.as_str() {
            "home" | "start" | "intro" => Step::Landing,
            "quiz" | "eligibility-quiz" | "questions" => Step::Questionnaire,
            "documents" | "document-upload" | "upload-documents" => Step::Upload,
            "analyzing" | "ocr" => Step::Processing,
            "eligibility-result" | "results" | "eligibility-check" => Step::Eligibility,
            "register" | "sign-up" | "account" | "create-account" => Step::Signup,
            "verify" | "email-verification" | "verifyemail" => Step::VerifyEmail,
            "interview" | "voice-interview" | "ai-interview" => Step::Voice,
            "sign" | "e-signature" | "docusign" | "signature" => Step::Esignature,
            "case-analysis" | "review" => Step::Analysis,
            "checkout" | "pay" => Step::Payment,
            "payment-complete" | "thank-you" | "postpayment" => Step::PostPayment,
            "medical-docs" | "medical-records" | "medical" => Step::MedicalDocuments,
            "case-docs" | "supporting-documents" => Step::CaseDocuments,
            "submit" | "final-submission" => Step::Submission,
            "done" | "complete" | "completed" => Step::Success,
            _ => return None,
        };
        Some(step)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for step names outside the current vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step '{0}'")]
pub struct UnknownStep(pub String);

impl FromStr for Step {
    type Err = UnknownStep;

    /// Strict parse of a current wire name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}
