//! Forward-only step controller for the onboarding wizard.
//!
//! All navigation rules live in [`transition`], a pure function over
//! [`WizardState`]. [`StepController`] wraps it with the side effects:
//! reading the session to decide authentication, consuming the resume
//! instruction on mount, and checkpointing forward progress.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::resume::{ResumeFailure, ResumeInstruction, ResumeOutcome};
use super::step::Step;
use crate::api::IntakeBackend;
use crate::config::WizardConfig;
use crate::store::{KeyValueStore, Session, RESUME_KEY};

/// Eligibility result shown by the eligibility screen and read downstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub score: u8,
    pub status: String,
}

impl EligibilityResult {
    pub const COMPLETED: &'static str = "Completed";

    /// Result seeded when a resume instruction marks eligibility as done
    pub fn completed() -> Self {
        Self {
            score: 100,
            status: Self::COMPLETED.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Self::COMPLETED
    }
}

/// Position of the wizard.
///
/// `min_allowed_index` is the highest index ever reached, so
/// `current_step.index() >= min_allowed_index` after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WizardState {
    pub current_step: Step,
    pub min_allowed_index: usize,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            current_step: Step::Landing,
            min_allowed_index: 0,
        }
    }
}

impl WizardState {
    /// State after resuming directly at `step`
    pub fn resumed_at(step: Step) -> Self {
        Self {
            current_step: step,
            min_allowed_index: step.index(),
        }
    }
}

/// Why a navigation request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The target is not part of the step vocabulary
    UnknownStep(String),
    /// The target lies before the furthest step already reached
    Backward { target: Step, min_allowed_index: usize },
}

/// What a navigation request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moved { from: Step, to: Step },
    /// An account step was requested by a signed-in user
    Redirected { requested: Step, to: Step },
    /// The target is the current step
    Unchanged,
    Rejected(Rejection),
}

impl Transition {
    /// Whether the current step changed
    pub fn changed_step(&self) -> bool {
        matches!(
            self,
            Transition::Moved { .. } | Transition::Redirected { .. }
        )
    }
}

/// Apply one navigation request to a state
pub fn transition(
    state: WizardState,
    target: Step,
    authenticated: bool,
) -> (WizardState, Transition) {
    if target.index() < state.min_allowed_index {
        return (
            state,
            Transition::Rejected(Rejection::Backward {
                target,
                min_allowed_index: state.min_allowed_index,
            }),
        );
    }

    let resolved = target.for_session(authenticated);
    let next = WizardState {
        current_step: resolved,
        min_allowed_index: state.min_allowed_index.max(resolved.index()),
    };

    let outcome = if resolved == state.current_step {
        Transition::Unchanged
    } else if resolved != target {
        Transition::Redirected {
            requested: target,
            to: resolved,
        }
    } else {
        Transition::Moved {
            from: state.current_step,
            to: resolved,
        }
    };

    (next, outcome)
}

/// Owns the wizard's position for one mount
pub struct StepController {
    store: Arc<dyn KeyValueStore>,
    state: WizardState,
    eligibility: Option<EligibilityResult>,
    answers: Option<serde_json::Value>,
    checkpoint_on_advance: bool,
}

impl StepController {
    /// Controller at the landing step, without consulting any resume data
    pub fn new(store: Arc<dyn KeyValueStore>, config: &WizardConfig) -> Self {
        Self {
            store,
            state: WizardState::default(),
            eligibility: None,
            answers: None,
            checkpoint_on_advance: config.checkpoint_on_advance,
        }
    }

    /// Create a controller and resume it from the store or the backend.
    ///
    /// Never fails: unusable resume data yields
    /// [`ResumeOutcome::Fallback`] with the controller left at landing.
    #[instrument(skip_all)]
    pub async fn mount(
        store: Arc<dyn KeyValueStore>,
        backend: &dyn IntakeBackend,
        config: &WizardConfig,
    ) -> (Self, ResumeOutcome) {
        let mut controller = Self::new(store, config);
        let outcome = controller.resume(backend).await;

        match &outcome {
            ResumeOutcome::Instruction {
                step,
                eligibility_seeded,
            } => info!(%step, eligibility_seeded, "Resumed from resume instruction"),
            ResumeOutcome::SavedProgress { step } => info!(%step, "Resumed from saved progress"),
            ResumeOutcome::Fresh => debug!("No saved progress, starting at landing"),
            ResumeOutcome::Fallback { reason } => {
                warn!(error = %reason, "Ignoring unusable resume data, starting at landing");
            }
        }

        (controller, outcome)
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn current_step(&self) -> Step {
        self.state.current_step
    }

    pub fn eligibility(&self) -> Option<&EligibilityResult> {
        self.eligibility.as_ref()
    }

    /// Answer sets restored from saved progress
    pub fn answers(&self) -> Option<&serde_json::Value> {
        self.answers.as_ref()
    }

    /// Record the eligibility screen's result
    pub fn record_eligibility(&mut self, result: EligibilityResult) {
        self.eligibility = Some(result);
    }

    /// Navigate by step name. Unknown names are rejected without effect.
    pub fn go_to_step(&mut self, target: &str) -> Transition {
        match target.parse::<Step>() {
            Ok(step) => self.go_to(step),
            Err(_) => {
                debug!(step = target, "Rejected navigation to unknown step");
                Transition::Rejected(Rejection::UnknownStep(target.to_string()))
            }
        }
    }

    /// Navigate to a step, honouring the forward-only rule
    pub fn go_to(&mut self, target: Step) -> Transition {
        let (next, outcome) = transition(self.state, target, self.is_authenticated());
        match &outcome {
            Transition::Rejected(rejection) => {
                debug!(?rejection, current = %self.state.current_step, "Rejected navigation");
            }
            Transition::Unchanged => {}
            Transition::Moved { from, to } => debug!(%from, %to, "Advanced wizard"),
            Transition::Redirected { requested, to } => {
                debug!(%requested, %to, "Skipped account step for signed-in user");
            }
        }

        self.state = next;
        if outcome.changed_step() {
            self.checkpoint();
        }
        outcome
    }

    fn is_authenticated(&self) -> bool {
        match Session::load(self.store.as_ref()) {
            Ok(session) => session.is_authenticated(),
            Err(e) => {
                warn!(error = %e, "Could not read session, treating user as signed out");
                false
            }
        }
    }

    async fn resume(&mut self, backend: &dyn IntakeBackend) -> ResumeOutcome {
        match self.resume_from_instruction() {
            Ok(Some(outcome)) => return outcome,
            Ok(None) => {}
            Err(reason) => return ResumeOutcome::Fallback { reason },
        }

        let token = match Session::load(self.store.as_ref()) {
            Ok(session) => session.access_token,
            Err(e) => {
                return ResumeOutcome::Fallback {
                    reason: ResumeFailure::Store(e),
                }
            }
        };
        let Some(token) = token else {
            return ResumeOutcome::Fresh;
        };

        match self.resume_from_saved_progress(backend, &token).await {
            Ok(outcome) => outcome,
            Err(reason) => ResumeOutcome::Fallback { reason },
        }
    }

    /// Consume the resume instruction, if any. The instruction is deleted
    /// before decoding so a malformed one cannot be replayed.
    fn resume_from_instruction(&mut self) -> Result<Option<ResumeOutcome>, ResumeFailure> {
        let Some(raw) = self.store.take(RESUME_KEY)? else {
            return Ok(None);
        };

        let instruction = ResumeInstruction::decode(&raw)?;
        let step = instruction.target()?.for_session(self.is_authenticated());

        self.state = WizardState::resumed_at(step);
        if instruction.mark_eligibility_done {
            self.eligibility = Some(EligibilityResult::completed());
        }
        if let Some(case_id) = instruction.case_id.as_deref() {
            if let Err(e) = Session::set_case_id(self.store.as_ref(), case_id) {
                warn!(error = %e, case_id, "Could not store resumed case id");
            }
        }

        Ok(Some(ResumeOutcome::Instruction {
            step,
            eligibility_seeded: instruction.mark_eligibility_done,
        }))
    }

    async fn resume_from_saved_progress(
        &mut self,
        backend: &dyn IntakeBackend,
        token: &str,
    ) -> Result<ResumeOutcome, ResumeFailure> {
        let Some(progress) = backend
            .load_progress(token)
            .await
            .map_err(ResumeFailure::Backend)?
        else {
            return Ok(ResumeOutcome::Fresh);
        };

        let step = match progress.step.as_deref() {
            Some(raw) => Some(
                Step::canonicalize(raw)
                    .ok_or_else(|| ResumeFailure::UnknownSavedStep(raw.to_string()))?,
            ),
            None => None,
        };

        self.answers = progress.answers;
        if progress.eligibility.is_some() {
            self.eligibility = progress.eligibility;
        }

        Ok(match step {
            Some(step) => {
                // Signed in by construction: this path requires a token
                let step = step.for_session(true);
                self.state = WizardState::resumed_at(step);
                ResumeOutcome::SavedProgress { step }
            }
            None => ResumeOutcome::Fresh,
        })
    }

    /// Overwrite the resume slot with the step just reached
    fn checkpoint(&self) {
        if !self.checkpoint_on_advance {
            return;
        }

        let step = self.state.current_step;
        let result = match step {
            Step::Landing => return,
            // Finished wizards have nothing to resume
            Step::Success => self.store.remove(RESUME_KEY),
            _ => {
                let case_id = Session::load(self.store.as_ref())
                    .ok()
                    .and_then(|s| s.case_id);
                let instruction = ResumeInstruction::new(step)
                    .with_eligibility_done(
                        self.eligibility
                            .as_ref()
                            .is_some_and(EligibilityResult::is_completed),
                    )
                    .with_case_id(case_id);
                self.store.set(RESUME_KEY, &instruction.encode())
            }
        };

        if let Err(e) = result {
            warn!(error = %e, %step, "Could not checkpoint wizard progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockBackend, SavedProgress};
    use crate::store::{MemoryStore, ACCESS_TOKEN_KEY, CASE_ID_KEY};

    fn no_checkpoints() -> WizardConfig {
        WizardConfig {
            checkpoint_on_advance: false,
        }
    }

    fn signed_in_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_entries([(ACCESS_TOKEN_KEY, "tok")]))
    }

    #[test]
    fn test_transition_forward_raises_floor() {
        let (state, outcome) = transition(WizardState::default(), Step::Upload, false);
        assert_eq!(state.current_step, Step::Upload);
        assert_eq!(state.min_allowed_index, Step::Upload.index());
        assert_eq!(
            outcome,
            Transition::Moved {
                from: Step::Landing,
                to: Step::Upload
            }
        );
    }

    #[test]
    fn test_transition_backward_is_noop() {
        let start = WizardState::resumed_at(Step::Payment);
        let (state, outcome) = transition(start, Step::Questionnaire, false);
        assert_eq!(state, start);
        assert!(matches!(
            outcome,
            Transition::Rejected(Rejection::Backward { target: Step::Questionnaire, .. })
        ));
    }

    #[test]
    fn test_transition_skips_account_steps_when_signed_in() {
        for target in [Step::Signup, Step::VerifyEmail] {
            let (state, outcome) = transition(WizardState::default(), target, true);
            assert_eq!(state.current_step, Step::Voice);
            assert_eq!(state.min_allowed_index, Step::Voice.index());
            assert_eq!(
                outcome,
                Transition::Redirected {
                    requested: target,
                    to: Step::Voice
                }
            );
        }
    }

    #[test]
    fn test_transition_same_step_is_unchanged() {
        let start = WizardState::resumed_at(Step::Voice);
        let (state, outcome) = transition(start, Step::Voice, false);
        assert_eq!(state, start);
        assert_eq!(outcome, Transition::Unchanged);
    }

    #[test]
    fn test_index_never_decreases_over_any_sequence() {
        // Deterministic pseudo-random walk over the vocabulary
        let mut state = WizardState::default();
        let mut seed: usize = 7;
        let mut last = state.current_step.index();
        for _ in 0..500 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345) % 65_536;
            let target = Step::ALL[seed % Step::ALL.len()];
            let (next, _) = transition(state, target, seed % 3 == 0);
            assert!(next.current_step.index() >= last);
            assert!(next.current_step.index() >= next.min_allowed_index);
            last = next.current_step.index();
            state = next;
        }
    }

    #[test]
    fn test_go_to_step_rejects_unknown_names() {
        let store = Arc::new(MemoryStore::new());
        let mut controller = StepController::new(store, &no_checkpoints());
        let before = controller.state();

        let outcome = controller.go_to_step("checkout");
        assert_eq!(
            outcome,
            Transition::Rejected(Rejection::UnknownStep("checkout".to_string()))
        );
        assert_eq!(controller.state(), before);
    }

    #[test]
    fn test_go_to_step_reads_fresh_session() {
        let store = Arc::new(MemoryStore::new());
        let mut controller = StepController::new(store.clone(), &no_checkpoints());

        controller.go_to_step("eligibility");
        // Token appears mid-wizard
        Session::login(store.as_ref(), "tok", None, None).unwrap();
        controller.go_to_step("signup");
        assert_eq!(controller.current_step(), Step::Voice);
    }

    #[test]
    fn test_checkpoint_written_on_advance() {
        let store = Arc::new(MemoryStore::with_entries([(CASE_ID_KEY, "case-3")]));
        let mut controller = StepController::new(store.clone(), &WizardConfig::default());
        controller.record_eligibility(EligibilityResult::completed());

        controller.go_to(Step::Payment);
        let raw = store.get(RESUME_KEY).unwrap().unwrap();
        let instruction = ResumeInstruction::decode(&raw).unwrap();
        assert_eq!(instruction.target().unwrap(), Step::Payment);
        assert!(instruction.mark_eligibility_done);
        assert_eq!(instruction.case_id.as_deref(), Some("case-3"));
    }

    #[test]
    fn test_rejected_navigation_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut controller = StepController::new(store.clone(), &WizardConfig::default());
        controller.go_to(Step::Voice);
        store.remove(RESUME_KEY).unwrap();

        controller.go_to(Step::Upload);
        assert!(!store.contains(RESUME_KEY));
    }

    #[test]
    fn test_reaching_success_clears_resume_slot() {
        let store = Arc::new(MemoryStore::new());
        let mut controller = StepController::new(store.clone(), &WizardConfig::default());
        controller.go_to(Step::Submission);
        assert!(store.contains(RESUME_KEY));
        controller.go_to(Step::Success);
        assert!(!store.contains(RESUME_KEY));
    }

    #[tokio::test]
    async fn test_mount_consumes_instruction() {
        let store = Arc::new(MemoryStore::with_entries([(
            RESUME_KEY,
            r#"{"step":"payment","markEligibilityDone":true}"#,
        )]));
        let backend = MockBackend::new();

        let (controller, outcome) =
            StepController::mount(store.clone(), &backend, &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Payment);
        assert_eq!(controller.state().min_allowed_index, Step::Payment.index());
        assert_eq!(controller.eligibility().map(|e| e.score), Some(100));
        assert!(matches!(
            outcome,
            ResumeOutcome::Instruction {
                step: Step::Payment,
                eligibility_seeded: true
            }
        ));
        assert!(!store.contains(RESUME_KEY));
        assert_eq!(backend.call_count("load_progress"), 0);

        // Second mount finds nothing
        let (controller, outcome) =
            StepController::mount(store, &backend, &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Landing);
        assert!(matches!(outcome, ResumeOutcome::Fresh));
    }

    #[tokio::test]
    async fn test_mount_instruction_skips_account_step_when_signed_in() {
        let store = signed_in_store();
        store.set(RESUME_KEY, "verify_email").unwrap();

        let (controller, _) =
            StepController::mount(store, &MockBackend::new(), &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Voice);
    }

    #[tokio::test]
    async fn test_mount_instruction_stores_case_id() {
        let store = Arc::new(MemoryStore::with_entries([(
            RESUME_KEY,
            r#"{"step":"case-documents","caseId":"case-77"}"#,
        )]));
        let (controller, _) =
            StepController::mount(store.clone(), &MockBackend::new(), &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::CaseDocuments);
        assert_eq!(store.get(CASE_ID_KEY).unwrap().as_deref(), Some("case-77"));
    }

    #[tokio::test]
    async fn test_mount_malformed_instruction_falls_back_and_is_deleted() {
        let store = signed_in_store();
        store.set(RESUME_KEY, "{\"step\":").unwrap();
        let backend = MockBackend::with_progress(SavedProgress {
            step: Some("payment".to_string()),
            ..SavedProgress::default()
        });

        let (controller, outcome) =
            StepController::mount(store.clone(), &backend, &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Landing);
        assert!(outcome.is_fallback());
        assert!(!store.contains(RESUME_KEY));
        // Decode failure stops resumption before the backend is asked
        assert_eq!(backend.call_count("load_progress"), 0);
    }

    #[tokio::test]
    async fn test_mount_loads_saved_progress_when_signed_in() {
        let store = signed_in_store();
        let backend = MockBackend::with_progress(SavedProgress {
            step: Some("sign-up".to_string()),
            answers: Some(serde_json::json!({"questionnaire": {"served": true}})),
            eligibility: None,
        });

        let (controller, outcome) = StepController::mount(store, &backend, &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Voice);
        assert!(matches!(
            outcome,
            ResumeOutcome::SavedProgress { step: Step::Voice }
        ));
        assert!(controller.answers().is_some());
        assert_eq!(backend.calls()[0].token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_mount_backend_failure_falls_back() {
        let backend = MockBackend::failing(ApiError::network("onboarding/progress", "refused"));
        let (controller, outcome) =
            StepController::mount(signed_in_store(), &backend, &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Landing);
        assert!(matches!(
            outcome,
            ResumeOutcome::Fallback {
                reason: ResumeFailure::Backend(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_mount_unknown_saved_step_falls_back() {
        let backend = MockBackend::with_progress(SavedProgress {
            step: Some("orbit".to_string()),
            ..SavedProgress::default()
        });
        let (controller, outcome) =
            StepController::mount(signed_in_store(), &backend, &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Landing);
        assert!(matches!(
            outcome,
            ResumeOutcome::Fallback {
                reason: ResumeFailure::UnknownSavedStep(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_mount_anonymous_skips_backend() {
        let backend = MockBackend::new();
        let (controller, outcome) =
            StepController::mount(Arc::new(MemoryStore::new()), &backend, &no_checkpoints()).await;
        assert_eq!(controller.current_step(), Step::Landing);
        assert!(matches!(outcome, ResumeOutcome::Fresh));
        assert!(backend.calls().is_empty());
    }
}
