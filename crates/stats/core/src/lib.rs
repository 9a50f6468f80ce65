//! Modifier stacking and global modifier distribution for gameplay attributes.
//!
//! `stats-core` computes an effective value from a base value and an ordered
//! set of modifiers, and distributes tag-scoped global modifiers from a
//! [`ModifierRegistry`] to every [`TaggedAttribute`] whose tag falls within a
//! modifier's scope.
//!
//! # Layers
//!
//! ```text
//! [ GameplayTag ]        hierarchical identity / scope
//!      ↓
//! [ Modifier ]           immutable (operation, amount, order, source, id)
//!      ↓
//! [ ModifiableValue ]    base + ordered modifiers + clamp + cached result
//!      ↓
//! [ TaggedAttribute ] ◀── change notification ── [ ModifierRegistry ]
//! ```
//!
//! Everything is single-threaded and synchronous: mutations recompute
//! eagerly and notifications run inline before the mutating call returns.
pub mod attribute;
pub mod config;
pub mod error;
pub mod modifier;
pub mod observer;
pub mod registry;
pub mod rounding;
pub mod tag;
pub mod value;

pub use attribute::TaggedAttribute;
pub use config::StatsConfig;
pub use error::StatsError;
pub use modifier::{Modifier, ModifierId, Operation};
pub use observer::ListenerId;
pub use registry::{ModifierRegistry, ScopeChangeQueue};
pub use rounding::RoundingMode;
pub use tag::GameplayTag;
pub use value::{ModifiableInt, ModifiableValue};
