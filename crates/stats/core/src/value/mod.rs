//! Modifiable values - base value, clamp range and an ordered modifier stack.
//!
//! # Evaluation
//!
//! ```text
//! result = clamp(fold(base, modifiers in (order, id) order), min, max)
//! ```
//!
//! If any [`Operation::Override`] is present, the earliest one in sequence
//! order replaces the fold entirely.
//!
//! # Cache discipline
//!
//! Every mutating call recomputes eagerly and notifies listeners synchronously
//! when the effective value moved by more than [`StatsConfig::VALUE_EPSILON`].
//! The only way to observe a dirty value is between deserialization and
//! [`ModifiableValue::post_deserialize`]; reads in that window compute on the fly.

mod int;

pub use int::ModifiableInt;

use core::cell::RefCell;
use core::cmp::Ordering;
use std::rc::Rc;

use tracing::trace;

use crate::config::{StatsConfig, approx_eq};
use crate::error::StatsError;
use crate::modifier::{self, Modifier, ModifierId, Operation};
use crate::observer::{ListenerId, Listeners, deliver};
use crate::tag::GameplayTag;

type ValueListener = RefCell<dyn FnMut(f32)>;

/// A base value plus an ordered stack of modifiers, with a cached result.
///
/// The stored sequence is sorted by ascending `order`, then ascending id, at
/// all times. Insertion is an ordered insert, so iteration order is
/// application order.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifiableValue {
    base: f32,
    min: f32,
    max: f32,
    modifiers: Vec<Modifier>,
    #[cfg_attr(feature = "serde", serde(skip))]
    cached: f32,
    #[cfg_attr(feature = "serde", serde(skip, default = "restored_dirty"))]
    dirty: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    listeners: Listeners<ValueListener>,
}

#[cfg(feature = "serde")]
fn restored_dirty() -> bool {
    true
}

impl ModifiableValue {
    /// Creates a value with the default (unbounded) clamp range.
    pub fn new(base: f32) -> Self {
        Self::with_bounds(base, StatsConfig::DEFAULT_MIN, StatsConfig::DEFAULT_MAX)
    }

    /// Creates a value clamped to `[min, max]`. Reversed bounds are swapped.
    pub fn with_bounds(base: f32, min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            base,
            min,
            max,
            modifiers: Vec::new(),
            cached: clamp(base, min, max),
            dirty: false,
            listeners: Listeners::new(),
        }
    }

    // ===== reads =====

    /// The effective value, always within `[min, max]`.
    pub fn value(&self) -> f32 {
        if self.dirty { self.compute() } else { self.cached }
    }

    pub fn base(&self) -> f32 {
        self.base
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Modifiers in application order.
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn get(&self, id: ModifierId) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.id() == id)
    }

    pub fn contains(&self, id: ModifierId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ===== base and bounds =====

    pub fn set_base(&mut self, base: f32) {
        self.base = base;
        self.mark_dirty();
    }

    /// Sets the lower bound. Raises `max` to match if it would fall below.
    pub fn set_min(&mut self, min: f32) {
        if min.is_nan() {
            return;
        }
        self.min = min;
        if self.max < min {
            self.max = min;
        }
        self.mark_dirty();
    }

    /// Sets the upper bound. Lowers `min` to match if it would rise above.
    pub fn set_max(&mut self, max: f32) {
        if max.is_nan() {
            return;
        }
        self.max = max;
        if self.min > max {
            self.min = max;
        }
        self.mark_dirty();
    }

    // ===== modifiers =====

    /// Inserts `modifier` in application order and returns its id.
    ///
    /// A modifier whose id is already present (a clone of one already added)
    /// is reissued under a fresh id so ids stay unique within the sequence.
    pub fn add_modifier(&mut self, modifier: Modifier) -> ModifierId {
        let modifier = if self.contains(modifier.id()) {
            modifier.reissue()
        } else {
            modifier
        };
        let id = modifier.id();
        let index = self.insertion_index(&modifier);
        self.modifiers.insert(index, modifier);
        self.mark_dirty();
        id
    }

    /// Builds a modifier and inserts it.
    ///
    /// # Errors
    ///
    /// Fails without touching state when the modifier cannot be constructed.
    pub fn add(
        &mut self,
        operation: Operation,
        amount: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        let modifier = Modifier::new(operation, amount, order, source)?;
        Ok(self.add_modifier(modifier))
    }

    pub fn add_additive(
        &mut self,
        amount: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        self.add(Operation::Add, amount, order, source)
    }

    /// Adds a multiplier. A zero factor is rejected here even though a raw
    /// multiply modifier of zero is legal.
    pub fn add_multiplier(
        &mut self,
        factor: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        if factor == 0.0 {
            return Err(StatsError::ZeroMultiplier);
        }
        self.add(Operation::Multiply, factor, order, source)
    }

    pub fn add_override(
        &mut self,
        amount: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        self.add(Operation::Override, amount, order, source)
    }

    /// Would adding `candidate` keep the unclamped result within `[min, max]`?
    ///
    /// Pure simulation; neither the stored sequence nor the cache is touched.
    pub fn can_add_modifier(&self, candidate: &Modifier) -> bool {
        let index = self.insertion_index(candidate);
        let merged = self.modifiers[..index]
            .iter()
            .chain(core::iter::once(candidate))
            .chain(self.modifiers[index..].iter());
        let result = modifier::evaluate(self.base, merged);
        self.min <= result && result <= self.max
    }

    /// Removes the modifier with `id`. Returns false if it was not present.
    pub fn remove_modifier(&mut self, id: ModifierId) -> bool {
        match self.modifiers.iter().position(|m| m.id() == id) {
            Some(index) => {
                self.modifiers.remove(index);
                self.mark_dirty();
                true
            }
            None => false,
        }
    }

    /// Removes every modifier whose source tag matches or descends from `tag`.
    /// Recomputes once after the bulk removal.
    pub fn remove_modifiers_by_tag(&mut self, tag: &GameplayTag) -> usize {
        self.remove_where(|m| m.has_source_within(tag))
    }

    /// Removes every modifier whose id is in `ids`. Recomputes once.
    pub fn remove_modifiers_by_ids(&mut self, ids: &[ModifierId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        self.remove_where(|m| ids.contains(&m.id()))
    }

    /// Removes all modifiers.
    pub fn clear_modifiers(&mut self) -> usize {
        self.remove_where(|_| true)
    }

    /// Removes `remove` and inserts `insert` in application order, recomputing
    /// once for the whole batch. Returns the inserted ids in insertion order.
    pub(crate) fn splice(
        &mut self,
        remove: &[ModifierId],
        insert: Vec<Modifier>,
    ) -> Vec<ModifierId> {
        self.modifiers.retain(|m| !remove.contains(&m.id()));
        let mut inserted = Vec::with_capacity(insert.len());
        for modifier in insert {
            let index = self.insertion_index(&modifier);
            inserted.push(modifier.id());
            self.modifiers.insert(index, modifier);
        }
        self.mark_dirty();
        inserted
    }

    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&Modifier) -> bool) -> usize {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| !predicate(m));
        let removed = before - self.modifiers.len();
        if removed > 0 {
            self.mark_dirty();
        }
        removed
    }

    // ===== notification =====

    /// Registers a listener called with the new effective value whenever it
    /// changes. Listeners must not call back into the value that notifies them.
    pub fn subscribe(&mut self, listener: impl FnMut(f32) + 'static) -> ListenerId {
        self.listeners.insert(Rc::new(RefCell::new(listener)))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ===== persistence =====

    /// Restore hook for values loaded from persisted state.
    ///
    /// Reserves the loaded modifier ids so new ones cannot collide with them,
    /// restores application order, and recomputes the cache.
    pub fn post_deserialize(&mut self) {
        if let Some(highest) = self.modifiers.iter().map(Modifier::id).max() {
            ModifierId::reserve_through(highest);
        }
        self.modifiers.sort_by(Modifier::application_cmp);
        if self.min > self.max {
            core::mem::swap(&mut self.min, &mut self.max);
        }
        self.mark_dirty();
    }

    // ===== internals =====

    fn insertion_index(&self, modifier: &Modifier) -> usize {
        self.modifiers
            .partition_point(|existing| existing.application_cmp(modifier) == Ordering::Less)
    }

    fn compute(&self) -> f32 {
        clamp(modifier::evaluate(self.base, &self.modifiers), self.min, self.max)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.recalculate();
    }

    fn recalculate(&mut self) {
        let next = self.compute();
        let previous = core::mem::replace(&mut self.cached, next);
        self.dirty = false;
        // The cache always tracks state; the tolerance only gates notification.
        let changed = !approx_eq(next, previous);
        trace!(
            target: "stats::value",
            previous,
            next,
            changed,
            "recalculated"
        );
        if changed && !self.listeners.is_empty() {
            deliver("value", self.listeners.snapshot(), |listener| listener(next));
        }
    }
}

/// Clones everything except listeners.
impl Clone for ModifiableValue {
    fn clone(&self) -> Self {
        Self {
            base: self.base,
            min: self.min,
            max: self.max,
            modifiers: self.modifiers.clone(),
            cached: self.cached,
            dirty: self.dirty,
            listeners: Listeners::new(),
        }
    }
}

impl Default for ModifiableValue {
    fn default() -> Self {
        Self::new(0.0)
    }
}

fn clamp(value: f32, min: f32, max: f32) -> f32 {
    // NaN collapses to `min` instead of escaping the range.
    value.max(min).min(max)
}
