//! Ordered policy evaluation and one-shot confirm-token lifecycle.
//!
//! # Policy check order
//!
//! [`PolicyEngine::check`] infers an environment and, for `ssh_exec`
//! calls only, an [`opsagent_classify::ActionClass`], then evaluates the
//! configured [`PolicyRule`]s in order. The first rule whose
//! [`PolicyCondition`] matches wins; a condition field left unset
//! matches any value. A call matching no rule is allowed at
//! `RiskLevel::Low`.
//!
//! `RequireConfirm` decisions mint a [`ConfirmToken`] good for
//! [`engine::TOKEN_TTL_SECONDS`] from mint, consumable exactly once.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod engine;
mod error;
mod types;

pub use engine::{validate_target_count_condition, PolicyEngine, TOKEN_TTL_SECONDS};
pub use error::{PolicyError, PolicyResult};
pub use types::{ConfirmToken, PolicyCondition, PolicyDecision, PolicyEffect, PolicyRule};
