//! Error types for stats-core.
//!
//! Only construction faults are errors. Expected outcomes of normal call
//! patterns (removing an id that is already gone, inserting under an invalid
//! scope, refreshing without a registry) are answered with `bool`, counts or
//! `Option` instead.
//!
//! A fault aborts the single operation that raised it and leaves all state as
//! it was before the call.

use crate::modifier::Operation;

/// Faults raised while building modifiers.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum StatsError {
    /// The amount is not usable for the requested operation.
    #[error("invalid {operation} modifier amount {amount}: {reason}")]
    InvalidModifierArgument {
        operation: Operation,
        amount: f32,
        reason: &'static str,
    },

    /// A multiplier convenience call was given a zero factor.
    #[error("multiplier factor must be non-zero")]
    ZeroMultiplier,
}

impl StatsError {
    pub(crate) const fn invalid(operation: Operation, amount: f32, reason: &'static str) -> Self {
        Self::InvalidModifierArgument {
            operation,
            amount,
            reason,
        }
    }

    /// Returns a static string identifier for this error variant.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidModifierArgument { .. } => "INVALID_MODIFIER_ARGUMENT",
            Self::ZeroMultiplier => "ZERO_MULTIPLIER",
        }
    }
}
