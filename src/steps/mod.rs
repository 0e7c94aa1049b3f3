//! Onboarding wizard navigation: the step vocabulary, the forward-only
//! controller and mount-time resumption.

pub mod controller;
pub mod resume;
pub mod step;

pub use controller::{
    transition, EligibilityResult, Rejection, StepController, Transition, WizardState,
};
pub use resume::{ResumeDecodeError, ResumeFailure, ResumeInstruction, ResumeOutcome};
pub use step::{Step, UnknownStep};
