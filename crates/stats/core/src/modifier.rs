//! Immutable modifier records.
//!
//! A [`Modifier`] describes one operation applied to a running value. Its
//! [`ModifierId`] is assigned at construction from a process-wide counter, so
//! ids are unique for the lifetime of the process and never reused. The id is
//! both the only stable external handle to a modifier and the tie-break among
//! modifiers sharing the same `order`.

use core::cmp::Ordering;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tracing::warn;

use crate::config::is_degenerate_divisor;
use crate::error::StatsError;
use crate::tag::GameplayTag;

static NEXT_MODIFIER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique modifier identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ModifierId(u64);

impl ModifierId {
    /// The raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }

    fn next() -> Self {
        Self(NEXT_MODIFIER_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Guarantees every id allocated from now on is greater than `id`.
    ///
    /// Called by restore hooks after ids were loaded from persisted state.
    pub fn reserve_through(id: ModifierId) {
        NEXT_MODIFIER_ID.fetch_max(id.0.saturating_add(1), AtomicOrdering::Relaxed);
    }
}

impl fmt::Display for ModifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of supported operations.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Replaces the running value outright. Exclusive: when several overrides
    /// are present only the earliest in sequence order applies and every other
    /// modifier is ignored.
    Override,
}

/// One operation with a magnitude, an application order and a stable identity.
///
/// Modifiers are immutable; replace one by removing it and adding a new one.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Modifier {
    operation: Operation,
    amount: f32,
    order: i32,
    source: Option<GameplayTag>,
    id: ModifierId,
}

impl Modifier {
    /// Builds a modifier and assigns it a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidModifierArgument`] for a divide whose amount
    /// is within tolerance of zero, or for a non-finite amount.
    pub fn new(
        operation: Operation,
        amount: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<Self, StatsError> {
        if !amount.is_finite() {
            return Err(StatsError::invalid(operation, amount, "amount must be finite"));
        }
        if operation == Operation::Divide && is_degenerate_divisor(amount) {
            return Err(StatsError::invalid(operation, amount, "divisor is zero"));
        }
        Ok(Self {
            operation,
            amount,
            order,
            source,
            id: ModifierId::next(),
        })
    }

    /// Copies this modifier under a freshly allocated id.
    pub fn reissue(&self) -> Self {
        Self {
            id: ModifierId::next(),
            ..self.clone()
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    /// Tag used for bulk removal. Not consulted for applicability.
    pub fn source(&self) -> Option<&GameplayTag> {
        self.source.as_ref()
    }

    pub fn id(&self) -> ModifierId {
        self.id
    }

    /// True when the source tag is set and matches or descends from `tag`.
    pub fn has_source_within(&self, tag: &GameplayTag) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.matches_or_child_of(tag))
    }

    /// Application order: ascending `order`, then ascending id.
    pub fn application_cmp(&self, other: &Modifier) -> Ordering {
        (self.order, self.id).cmp(&(other.order, other.id))
    }

    /// Applies this modifier to `value`.
    ///
    /// Overrides return their amount. A divide by an effectively zero amount
    /// leaves `value` unchanged and logs a warning.
    pub fn apply(&self, value: f32) -> f32 {
        match self.operation {
            Operation::Add => value + self.amount,
            Operation::Subtract => value - self.amount,
            Operation::Multiply => value * self.amount,
            Operation::Divide => {
                if is_degenerate_divisor(self.amount) {
                    warn!(
                        target: "stats::modifier",
                        id = %self.id,
                        amount = self.amount,
                        "skipping divide by zero"
                    );
                    value
                } else {
                    value / self.amount
                }
            }
            Operation::Override => self.amount,
        }
    }
}

/// Folds `modifiers`, which must already be in application order, over `base`.
///
/// If any override is present the earliest one wins and nothing else applies.
/// The result is not clamped.
pub fn evaluate<'a, I>(base: f32, modifiers: I) -> f32
where
    I: IntoIterator<Item = &'a Modifier>,
    I::IntoIter: Clone,
{
    let modifiers = modifiers.into_iter();
    if let Some(winner) = modifiers
        .clone()
        .find(|m| m.operation == Operation::Override)
    {
        return winner.amount;
    }
    modifiers.fold(base, |acc, m| m.apply(acc))
}
