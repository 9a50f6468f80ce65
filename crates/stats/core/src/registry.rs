//! Global modifier registry.
//!
//! The registry maps a scope tag to the modifiers registered under exactly
//! that tag. Scopes are not expanded to descendants on insert; matching
//! happens at query time, where an attribute tag matches every scope it
//! equals or descends from.
//!
//! # Sharing
//!
//! The registry is an explicitly constructed context object. Hosts that want a
//! single shared registry create one, wrap it in an [`Rc`], and hand it to
//! every [`TaggedAttribute`](crate::TaggedAttribute). Mutating operations take
//! `&self` so observers can query the registry while it notifies them.
//!
//! # Notification contract
//!
//! Observers run synchronously, after the mutation is committed, on the
//! caller's stack. An observer may mutate the registry again; the nested
//! notification is delivered to every observer, including ones still running,
//! so observers are `Fn` and keep their own state behind cells. Chains of
//! observers that keep mutating each other's scopes are not guarded against.

use core::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::modifier::{self, Modifier, ModifierId};
use crate::observer::{ListenerId, Listeners};
use crate::rounding::RoundingMode;
use crate::tag::GameplayTag;

type RegistryListener = dyn Fn(&ModifierRegistry, &GameplayTag);

/// Scope-tag indexed table of global modifiers with change notification.
#[derive(Debug, Default)]
pub struct ModifierRegistry {
    scopes: RefCell<BTreeMap<GameplayTag, Vec<Modifier>>>,
    listeners: RefCell<Listeners<RegistryListener>>,
}

impl ModifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `modifier` under `scope` and notifies observers.
    ///
    /// Returns `None` without notifying when `scope` is invalid. A modifier
    /// whose id is already registered under `scope` is reissued under a fresh
    /// id; the returned id is the one to remove it with.
    pub fn add_modifier(&self, scope: &GameplayTag, modifier: Modifier) -> Option<ModifierId> {
        if !scope.is_valid() {
            debug!(
                target: "stats::registry",
                scope = %scope,
                "rejecting modifier under invalid scope"
            );
            return None;
        }

        let id = {
            let mut scopes = self.scopes.borrow_mut();
            let list = scopes.entry(scope.clone()).or_default();
            let modifier = if list.iter().any(|m| m.id() == modifier.id()) {
                modifier.reissue()
            } else {
                modifier
            };
            let id = modifier.id();
            list.push(modifier);
            id
        };

        debug!(target: "stats::registry", scope = %scope, id = %id, "modifier registered");
        self.notify(scope);
        Some(id)
    }

    /// Removes the modifier `id` registered under exactly `scope`.
    ///
    /// Returns false, without notifying, when no such modifier exists.
    pub fn remove_modifier(&self, scope: &GameplayTag, id: ModifierId) -> bool {
        {
            let mut scopes = self.scopes.borrow_mut();
            let Some(list) = scopes.get_mut(scope) else {
                return false;
            };
            let Some(index) = list.iter().position(|m| m.id() == id) else {
                return false;
            };
            list.remove(index);
            if list.is_empty() {
                scopes.remove(scope);
            }
        }

        debug!(target: "stats::registry", scope = %scope, id = %id, "modifier removed");
        self.notify(scope);
        true
    }

    /// Removes every modifier registered under exactly `scope`.
    pub fn remove_scope(&self, scope: &GameplayTag) -> usize {
        let removed = self
            .scopes
            .borrow_mut()
            .remove(scope)
            .map_or(0, |list| list.len());
        if removed > 0 {
            self.notify(scope);
        }
        removed
    }

    /// Every modifier whose scope `tag` equals or descends from.
    ///
    /// The result has no defined order; consumers sort by application order.
    pub fn matching_modifiers(&self, tag: &GameplayTag) -> Vec<Modifier> {
        if !tag.is_valid() {
            return Vec::new();
        }
        self.scopes
            .borrow()
            .iter()
            .filter(|(scope, _)| tag.matches_or_child_of(scope))
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }

    /// Modifiers registered under exactly `scope`.
    pub fn modifiers_in_scope(&self, scope: &GameplayTag) -> Vec<Modifier> {
        self.scopes
            .borrow()
            .get(scope)
            .cloned()
            .unwrap_or_default()
    }

    /// What `base` becomes after every modifier matching `tag`, unclamped.
    ///
    /// Matching modifiers are applied in (order, id) order, the same rule a
    /// live attribute uses, so equal-order ties resolve by creation order.
    /// Override exclusivity and the divide-by-zero skip apply as usual.
    pub fn evaluate_float(&self, tag: &GameplayTag, base: f32) -> f32 {
        let mut matching = self.matching_modifiers(tag);
        matching.sort_by(Modifier::application_cmp);
        modifier::evaluate(base, &matching)
    }

    /// Integer form of [`evaluate_float`](Self::evaluate_float).
    pub fn evaluate_int(&self, tag: &GameplayTag, base: i32, rounding: RoundingMode) -> i32 {
        rounding.apply(self.evaluate_float(tag, base as f32))
    }

    /// Scopes that currently hold at least one modifier, in tag order.
    pub fn scopes(&self) -> Vec<GameplayTag> {
        self.scopes.borrow().keys().cloned().collect()
    }

    /// Total number of registered modifiers.
    pub fn len(&self) -> usize {
        self.scopes.borrow().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.borrow().is_empty()
    }

    // ===== observers =====

    /// Registers an observer called with the registry and the scope that changed.
    pub fn subscribe(
        &self,
        listener: impl Fn(&ModifierRegistry, &GameplayTag) + 'static,
    ) -> ListenerId {
        self.listeners.borrow_mut().insert(Rc::new(listener))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.borrow_mut().remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn notify(&self, scope: &GameplayTag) {
        let entries = self.listeners.borrow().snapshot();
        for (_, listener) in entries {
            listener(self, scope);
        }
    }
}

/// Observer that records changed scopes for hosts that apply registry changes
/// once per tick instead of reacting inline.
#[derive(Clone, Debug, Default)]
pub struct ScopeChangeQueue {
    pending: Rc<RefCell<Vec<GameplayTag>>>,
}

impl ScopeChangeQueue {
    /// Creates a queue subscribed to `registry`.
    pub fn attach(registry: &ModifierRegistry) -> (Self, ListenerId) {
        let queue = Self::default();
        let pending = Rc::clone(&queue.pending);
        let id = registry.subscribe(move |_, scope| {
            let mut pending = pending.borrow_mut();
            if !pending.contains(scope) {
                pending.push(scope.clone());
            }
        });
        (queue, id)
    }

    /// Takes the changed scopes, each once, in the order first seen.
    pub fn drain(&self) -> Vec<GameplayTag> {
        core::mem::take(&mut *self.pending.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::Operation;

    fn tag(path: &str) -> GameplayTag {
        GameplayTag::new(path)
    }

    fn add(amount: f32, order: i32) -> Modifier {
        Modifier::new(Operation::Add, amount, order, None).unwrap()
    }

    #[test]
    fn invalid_scope_is_rejected_silently() {
        let registry = ModifierRegistry::new();
        let (queue, _) = ScopeChangeQueue::attach(&registry);
        assert_eq!(registry.add_modifier(&GameplayTag::none(), add(1.0, 0)), None);
        assert_eq!(registry.add_modifier(&tag("A..B"), add(1.0, 0)), None);
        assert!(registry.is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_scopes_are_dropped() {
        let registry = ModifierRegistry::new();
        let scope = tag("Combat");
        let id = registry.add_modifier(&scope, add(1.0, 0)).unwrap();
        assert_eq!(registry.scopes(), vec![scope.clone()]);
        assert!(registry.remove_modifier(&scope, id));
        assert!(registry.scopes().is_empty());
    }

    #[test]
    fn removal_requires_the_original_scope() {
        let registry = ModifierRegistry::new();
        let id = registry.add_modifier(&tag("Combat.Damage"), add(1.0, 0)).unwrap();
        assert!(!registry.remove_modifier(&tag("Combat"), id));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_modifier(&tag("Combat.Damage"), id));
    }

    #[test]
    fn notifies_on_change_only() {
        let registry = ModifierRegistry::new();
        let (queue, _) = ScopeChangeQueue::attach(&registry);
        let scope = tag("Combat");

        let id = registry.add_modifier(&scope, add(1.0, 0)).unwrap();
        assert_eq!(queue.drain(), vec![scope.clone()]);

        let never_added = add(2.0, 0).id();
        assert!(!registry.remove_modifier(&scope, never_added));
        assert!(queue.is_empty());

        assert!(registry.remove_modifier(&scope, id));
        assert_eq!(queue.drain(), vec![scope]);
    }

    #[test]
    fn queue_deduplicates_scopes() {
        let registry = ModifierRegistry::new();
        let (queue, id) = ScopeChangeQueue::attach(&registry);
        registry.add_modifier(&tag("A"), add(1.0, 0));
        registry.add_modifier(&tag("B"), add(1.0, 0));
        registry.add_modifier(&tag("A"), add(1.0, 0));
        assert_eq!(queue.drain(), vec![tag("A"), tag("B")]);

        assert!(registry.unsubscribe(id));
        registry.add_modifier(&tag("C"), add(1.0, 0));
        assert!(queue.is_empty());
    }

    #[test]
    fn matching_uses_scope_as_ceiling() {
        let registry = ModifierRegistry::new();
        registry.add_modifier(&tag("Combat.Damage"), add(1.0, 0));
        registry.add_modifier(&tag("Combat"), add(2.0, 0));
        registry.add_modifier(&tag("Movement"), add(4.0, 0));

        let amounts = |path: &str| -> f32 {
            registry
                .matching_modifiers(&tag(path))
                .iter()
                .map(Modifier::amount)
                .sum()
        };
        assert_eq!(amounts("Combat.Damage.Fire"), 3.0);
        assert_eq!(amounts("Combat"), 2.0);
        assert_eq!(amounts("Combat.Defense"), 2.0);
        assert_eq!(amounts("Movement.Speed"), 4.0);
        assert_eq!(amounts("Crafting"), 0.0);
        assert!(registry.matching_modifiers(&GameplayTag::none()).is_empty());
    }

    #[test]
    fn evaluate_applies_order_then_id() {
        let registry = ModifierRegistry::new();
        let scope = tag("Speed");
        let subtract = Modifier::new(Operation::Subtract, 2.0, 0, None).unwrap();
        let divide = Modifier::new(Operation::Divide, 2.0, 0, None).unwrap();
        let bonus = add(100.0, 5);
        // Registered in reverse so list order disagrees with creation order.
        registry.add_modifier(&scope, bonus);
        registry.add_modifier(&scope, divide);
        registry.add_modifier(&scope, subtract);

        assert_eq!(registry.evaluate_float(&tag("Speed.Walk"), 10.0), 104.0);
        assert_eq!(
            registry.evaluate_int(&tag("Speed"), 11, RoundingMode::Floor),
            104
        );
        assert_eq!(registry.evaluate_float(&tag("Other"), 10.0), 10.0);
    }

    #[test]
    fn remove_scope_clears_exact_scope_only() {
        let registry = ModifierRegistry::new();
        registry.add_modifier(&tag("A"), add(1.0, 0));
        registry.add_modifier(&tag("A"), add(1.0, 0));
        registry.add_modifier(&tag("A.B"), add(1.0, 0));
        assert_eq!(registry.remove_scope(&tag("A")), 2);
        assert_eq!(registry.scopes(), vec![tag("A.B")]);
        assert_eq!(registry.remove_scope(&tag("A")), 0);
    }

    #[test]
    fn observer_may_mutate_registry() {
        let registry = Rc::new(ModifierRegistry::new());
        let (queue, _) = ScopeChangeQueue::attach(&registry);
        registry.subscribe(|registry, scope| {
            if scope.as_str() == "Trigger" {
                registry.add_modifier(&GameplayTag::new("Echo"), add(1.0, 0));
            }
        });

        registry.add_modifier(&tag("Trigger"), add(1.0, 0));
        assert_eq!(registry.len(), 2);
        let mut changed = queue.drain();
        changed.sort();
        assert_eq!(changed, vec![tag("Echo"), tag("Trigger")]);
    }

    #[test]
    fn running_observer_sees_nested_changes() {
        let registry = ModifierRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        registry.subscribe(move |registry, scope| {
            log.borrow_mut().push(scope.clone());
            if scope.as_str() == "Outer" {
                registry.add_modifier(&GameplayTag::new("Inner"), add(1.0, 0));
            }
        });

        registry.add_modifier(&tag("Outer"), add(1.0, 0));
        assert_eq!(*seen.borrow(), vec![tag("Outer"), tag("Inner")]);
    }
}
