//! Order admission: the duplicate-detection checks and the policy that
//! decides whether an incoming submission is accepted, needs caller
//! confirmation, or is blocked outright.

pub mod duplicate;
pub mod identity;
pub mod orchestrator;

pub use duplicate::{check_order, check_patient, check_provider, DuplicateCheckResult};
pub use orchestrator::{
    admit, AdmissionChecks, AdmissionError, AdmissionOutcome, AdmissionReceipt, BlockedCheck,
    OrderSubmission,
};
