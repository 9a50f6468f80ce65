//! Tagged attributes - modifiable values that pull global modifiers.
//!
//! A [`TaggedAttribute`] is either *unregistered* or registered with exactly
//! one [`ModifierRegistry`]. While registered it observes the registry and,
//! whenever a scope its tag matches changes, discards every modifier it
//! previously injected and re-pulls the full matching set. Pulled modifiers
//! are reissued under fresh local ids; the attribute tracks those ids so it can
//! always tell injected modifiers apart from ones gameplay code added.
//!
//! ```text
//! Unregistered ──register(R)──▶ Registered(R) ──register(R')──▶ Registered(R')
//!       ▲                            │
//!       └────────deregister()────────┘
//! ```
//!
//! Invariant: every injected id is present in the owned value, and every
//! modifier pulled from the registry is in the injected set.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::StatsError;
use crate::modifier::{Modifier, ModifierId, Operation};
use crate::observer::ListenerId;
use crate::registry::ModifierRegistry;
use crate::tag::GameplayTag;
use crate::value::ModifiableValue;

#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct AttributeCore {
    tag: GameplayTag,
    value: ModifiableValue,
    #[cfg_attr(feature = "serde", serde(default))]
    injected: Vec<ModifierId>,
}

impl AttributeCore {
    /// Replaces the injected set with a fresh pull from `registry`.
    ///
    /// Without a registry, or with an invalid tag, this only removes what was
    /// injected before.
    fn refresh(&mut self, registry: Option<&ModifierRegistry>) {
        let stale = core::mem::take(&mut self.injected);
        let mut pulled = match registry {
            Some(registry) if self.tag.is_valid() => registry.matching_modifiers(&self.tag),
            _ => Vec::new(),
        };
        pulled.sort_by(Modifier::application_cmp);
        let fresh = pulled.iter().map(Modifier::reissue).collect();
        self.injected = self.value.splice(&stale, fresh);
        debug!(
            target: "stats::attribute",
            tag = %self.tag,
            removed = stale.len(),
            injected = self.injected.len(),
            value = self.value.value(),
            "refreshed global modifiers"
        );
    }

    fn clear_injected(&mut self) {
        let stale = core::mem::take(&mut self.injected);
        self.value.remove_modifiers_by_ids(&stale);
    }

    fn prune_injected(&mut self) {
        let value = &self.value;
        self.injected.retain(|id| value.contains(*id));
    }
}

/// Upper bound on back-to-back refreshes when registry changes keep arriving
/// while the attribute is already refreshing.
const MAX_REFRESH_PASSES: usize = 16;

/// Refreshes until no registry change arrived mid-refresh.
fn refresh_settled(
    core: &mut AttributeCore,
    registry: &ModifierRegistry,
    pending: &Cell<bool>,
) {
    for _ in 0..MAX_REFRESH_PASSES {
        pending.set(false);
        core.refresh(Some(registry));
        if !pending.get() {
            return;
        }
    }
    warn!(
        target: "stats::attribute",
        tag = %core.tag,
        passes = MAX_REFRESH_PASSES,
        "registry still changing after repeated refreshes"
    );
}

struct RegistryLink {
    registry: Rc<ModifierRegistry>,
    listener: ListenerId,
}

/// A [`ModifiableValue`] identified by a [`GameplayTag`] and fed by at most one
/// [`ModifierRegistry`].
///
/// A registry change that arrives while the attribute is busy (for example one
/// published by its own value listener) is deferred and applied as soon as the
/// busy call finishes.
pub struct TaggedAttribute {
    core: Rc<RefCell<AttributeCore>>,
    link: Option<RegistryLink>,
    pending: Rc<Cell<bool>>,
}

impl TaggedAttribute {
    pub fn new(tag: GameplayTag, base: f32) -> Self {
        Self::from_value(tag, ModifiableValue::new(base))
    }

    pub fn with_bounds(tag: GameplayTag, base: f32, min: f32, max: f32) -> Self {
        Self::from_value(tag, ModifiableValue::with_bounds(base, min, max))
    }

    /// Wraps an existing value. Its modifiers are treated as locally added.
    pub fn from_value(tag: GameplayTag, value: ModifiableValue) -> Self {
        Self::from_core(AttributeCore {
            tag,
            value,
            injected: Vec::new(),
        })
    }

    fn from_core(core: AttributeCore) -> Self {
        Self {
            core: Rc::new(RefCell::new(core)),
            link: None,
            pending: Rc::new(Cell::new(false)),
        }
    }

    // ===== registry coupling =====

    /// Couples this attribute to `registry`, replacing any previous coupling,
    /// and pulls every matching global modifier.
    pub fn register(&mut self, registry: &Rc<ModifierRegistry>) {
        self.deregister();

        let weak = Rc::downgrade(&self.core);
        let pending = Rc::clone(&self.pending);
        let listener = registry.subscribe(move |registry, scope| {
            let Some(core) = weak.upgrade() else {
                return;
            };
            let Ok(mut guard) = core.try_borrow_mut() else {
                debug!(
                    target: "stats::attribute",
                    scope = %scope,
                    "attribute busy, deferring refresh"
                );
                pending.set(true);
                return;
            };
            if guard.tag.matches_or_child_of(scope) {
                refresh_settled(&mut guard, registry, &pending);
            }
        });

        self.link = Some(RegistryLink {
            registry: Rc::clone(registry),
            listener,
        });
        self.pending.set(true);
        self.settle();
    }

    /// Drops the registry coupling and every injected modifier. Idempotent.
    pub fn deregister(&mut self) {
        if let Some(link) = self.link.take() {
            link.registry.unsubscribe(link.listener);
        }
        self.core.borrow_mut().clear_injected();
        self.pending.set(false);
    }

    pub fn is_registered(&self) -> bool {
        self.link.is_some()
    }

    pub fn registry(&self) -> Option<&Rc<ModifierRegistry>> {
        self.link.as_ref().map(|link| &link.registry)
    }

    /// Ids of the modifiers currently injected from the registry.
    pub fn injected_ids(&self) -> Vec<ModifierId> {
        self.core.borrow().injected.clone()
    }

    /// Number of modifiers added by gameplay code rather than the registry.
    pub fn local_modifier_count(&self) -> usize {
        let core = self.core.borrow();
        core.value.len().saturating_sub(core.injected.len())
    }

    /// Applies a refresh deferred while the core was busy.
    fn settle(&self) {
        let Some(link) = &self.link else {
            self.pending.set(false);
            return;
        };
        if !self.pending.get() {
            return;
        }
        // Still borrowed further up the stack; that caller settles instead.
        if let Ok(mut core) = self.core.try_borrow_mut() {
            refresh_settled(&mut core, &link.registry, &self.pending);
        }
    }

    /// Runs `f` on the core, then applies any refresh it deferred.
    fn update<R>(&self, f: impl FnOnce(&mut AttributeCore) -> R) -> R {
        let result = f(&mut *self.core.borrow_mut());
        self.settle();
        result
    }

    // ===== tag =====

    pub fn tag(&self) -> GameplayTag {
        self.core.borrow().tag.clone()
    }

    /// Changes the identifying tag and re-pulls when registered.
    pub fn set_tag(&mut self, tag: GameplayTag) {
        self.core.borrow_mut().tag = tag;
        if self.link.is_some() {
            self.pending.set(true);
        }
        self.settle();
    }

    // ===== value =====

    pub fn value(&self) -> f32 {
        self.core.borrow().value.value()
    }

    pub fn base(&self) -> f32 {
        self.core.borrow().value.base()
    }

    pub fn set_base(&mut self, base: f32) {
        self.update(|core| core.value.set_base(base));
    }

    pub fn min(&self) -> f32 {
        self.core.borrow().value.min()
    }

    pub fn set_min(&mut self, min: f32) {
        self.update(|core| core.value.set_min(min));
    }

    pub fn max(&self) -> f32 {
        self.core.borrow().value.max()
    }

    pub fn set_max(&mut self, max: f32) {
        self.update(|core| core.value.set_max(max));
    }

    /// Snapshot of every modifier, injected ones included, in application order.
    pub fn modifiers(&self) -> Vec<Modifier> {
        self.core.borrow().value.modifiers().to_vec()
    }

    /// Read access to the owned value.
    pub fn with_value<R>(&self, f: impl FnOnce(&ModifiableValue) -> R) -> R {
        let result = f(&self.core.borrow().value);
        self.settle();
        result
    }

    // ===== local modifiers =====

    pub fn add_modifier(&mut self, modifier: Modifier) -> ModifierId {
        self.update(|core| core.value.add_modifier(modifier))
    }

    pub fn add(
        &mut self,
        operation: Operation,
        amount: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        self.update(|core| core.value.add(operation, amount, order, source))
    }

    pub fn add_additive(
        &mut self,
        amount: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        self.update(|core| core.value.add_additive(amount, order, source))
    }

    pub fn add_multiplier(
        &mut self,
        factor: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        self.update(|core| core.value.add_multiplier(factor, order, source))
    }

    pub fn add_override(
        &mut self,
        amount: f32,
        order: i32,
        source: Option<GameplayTag>,
    ) -> Result<ModifierId, StatsError> {
        self.update(|core| core.value.add_override(amount, order, source))
    }

    pub fn can_add_modifier(&self, candidate: &Modifier) -> bool {
        self.core.borrow().value.can_add_modifier(candidate)
    }

    /// Removes one modifier. Removing an injected id also untracks it; it
    /// returns on the next refresh.
    pub fn remove_modifier(&mut self, id: ModifierId) -> bool {
        self.update(|core| {
            let removed = core.value.remove_modifier(id);
            if removed {
                core.injected.retain(|injected| *injected != id);
            }
            removed
        })
    }

    pub fn remove_modifiers_by_tag(&mut self, tag: &GameplayTag) -> usize {
        self.update(|core| {
            let removed = core.value.remove_modifiers_by_tag(tag);
            if removed > 0 {
                core.prune_injected();
            }
            removed
        })
    }

    /// Removes every locally added modifier. Injected modifiers stay until the
    /// next refresh or [`deregister`](Self::deregister).
    pub fn clear_modifiers(&mut self) -> usize {
        self.update(|core| {
            let AttributeCore {
                value, injected, ..
            } = core;
            value.remove_where(|m| !injected.contains(&m.id()))
        })
    }

    // ===== notification =====

    pub fn subscribe(&mut self, listener: impl FnMut(f32) + 'static) -> ListenerId {
        self.core.borrow_mut().value.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.core.borrow_mut().value.unsubscribe(id)
    }

    // ===== persistence =====

    /// Restore hook for attributes loaded from persisted state.
    ///
    /// Restored attributes are unregistered. Injected ids that no longer refer
    /// to a stored modifier are dropped; the rest stay tracked so the next
    /// [`register`](Self::register) or [`deregister`](Self::deregister) removes
    /// them. The value cache is recomputed.
    pub fn post_deserialize(&mut self) {
        self.update(|core| {
            core.value.post_deserialize();
            core.prune_injected();
        });
    }
}

impl Drop for TaggedAttribute {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.registry.unsubscribe(link.listener);
        }
    }
}

impl fmt::Debug for TaggedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("TaggedAttribute");
        match self.core.try_borrow() {
            Ok(core) => out
                .field("tag", &core.tag)
                .field("value", &core.value.value())
                .field("modifiers", &core.value.len())
                .field("injected", &core.injected.len()),
            Err(_) => out.field("core", &"<busy>"),
        };
        out.field("registered", &self.is_registered()).finish()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TaggedAttribute {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(&*self.core.borrow(), serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TaggedAttribute {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let core = <AttributeCore as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Self::from_core(core))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(path: &str) -> GameplayTag {
        GameplayTag::new(path)
    }

    fn add(amount: f32) -> Modifier {
        Modifier::new(Operation::Add, amount, 0, None).unwrap()
    }

    #[test]
    fn register_pulls_matching_modifiers() {
        let registry = Rc::new(ModifierRegistry::new());
        registry.add_modifier(&tag("A"), add(10.0));

        let mut attr = TaggedAttribute::new(tag("A.B"), 0.0);
        attr.register(&registry);
        assert_eq!(attr.value(), 10.0);
        assert_eq!(attr.injected_ids().len(), 1);
        assert_eq!(registry.listener_count(), 1);
    }

    #[test]
    fn injected_ids_are_local() {
        let registry = Rc::new(ModifierRegistry::new());
        let registry_id = registry.add_modifier(&tag("A"), add(1.0)).unwrap();

        let mut attr = TaggedAttribute::new(tag("A"), 0.0);
        attr.register(&registry);
        let injected = attr.injected_ids();
        assert_eq!(injected.len(), 1);
        assert_ne!(injected[0], registry_id);
        assert!(attr.modifiers().iter().any(|m| m.id() == injected[0]));
    }

    #[test]
    fn deregister_is_idempotent() {
        let registry = Rc::new(ModifierRegistry::new());
        registry.add_modifier(&tag("A"), add(3.0));

        let mut attr = TaggedAttribute::new(tag("A"), 1.0);
        attr.add_additive(1.0, 0, None).unwrap();
        attr.register(&registry);
        assert_eq!(attr.value(), 5.0);

        attr.deregister();
        attr.deregister();
        assert!(!attr.is_registered());
        assert!(attr.injected_ids().is_empty());
        assert_eq!(attr.modifiers().len(), 1);
        assert_eq!(attr.value(), 2.0);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn deregister_from_unregistered_is_noop() {
        let mut attr = TaggedAttribute::new(tag("A"), 1.0);
        attr.deregister();
        assert_eq!(attr.value(), 1.0);
    }

    #[test]
    fn reregistering_switches_registries() {
        let first = Rc::new(ModifierRegistry::new());
        let second = Rc::new(ModifierRegistry::new());
        first.add_modifier(&tag("A"), add(1.0));
        second.add_modifier(&tag("A"), add(100.0));

        let mut attr = TaggedAttribute::new(tag("A"), 0.0);
        attr.register(&first);
        attr.register(&second);
        assert_eq!(attr.value(), 100.0);
        assert_eq!(first.listener_count(), 0);
        assert_eq!(second.listener_count(), 1);

        // Changes to the old registry no longer reach the attribute.
        first.add_modifier(&tag("A"), add(1000.0));
        assert_eq!(attr.value(), 100.0);
    }

    #[test]
    fn unrelated_scope_changes_are_ignored() {
        let registry = Rc::new(ModifierRegistry::new());
        let mut attr = TaggedAttribute::new(tag("X"), 0.0);
        attr.register(&registry);

        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        attr.subscribe(move |_| *counter.borrow_mut() += 1);

        registry.add_modifier(&tag("A"), add(5.0));
        assert_eq!(attr.value(), 0.0);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn invalid_tag_receives_nothing() {
        let registry = Rc::new(ModifierRegistry::new());
        registry.add_modifier(&tag("A"), add(5.0));
        let mut attr = TaggedAttribute::new(GameplayTag::none(), 1.0);
        attr.register(&registry);
        assert_eq!(attr.value(), 1.0);
        assert!(attr.injected_ids().is_empty());
    }

    #[test]
    fn set_tag_repulls() {
        let registry = Rc::new(ModifierRegistry::new());
        registry.add_modifier(&tag("Fire"), add(2.0));
        registry.add_modifier(&tag("Ice"), add(3.0));

        let mut attr = TaggedAttribute::new(tag("Fire.Damage"), 0.0);
        attr.register(&registry);
        assert_eq!(attr.value(), 2.0);
        attr.set_tag(tag("Ice.Damage"));
        assert_eq!(attr.value(), 3.0);
        assert_eq!(attr.injected_ids().len(), 1);
    }

    #[test]
    fn clear_keeps_injected_modifiers() {
        let registry = Rc::new(ModifierRegistry::new());
        registry.add_modifier(&tag("A"), add(10.0));
        let mut attr = TaggedAttribute::new(tag("A"), 0.0);
        attr.register(&registry);
        attr.add_additive(1.0, 0, None).unwrap();
        attr.add_additive(2.0, 0, None).unwrap();
        assert_eq!(attr.local_modifier_count(), 2);

        assert_eq!(attr.clear_modifiers(), 2);
        assert_eq!(attr.value(), 10.0);
        assert_eq!(attr.local_modifier_count(), 0);
    }

    #[test]
    fn removing_injected_id_untracks_it() {
        let registry = Rc::new(ModifierRegistry::new());
        registry.add_modifier(&tag("A"), add(10.0));
        let mut attr = TaggedAttribute::new(tag("A"), 0.0);
        attr.register(&registry);

        let injected = attr.injected_ids()[0];
        assert!(attr.remove_modifier(injected));
        assert!(attr.injected_ids().is_empty());
        assert_eq!(attr.value(), 0.0);

        // The next change on a matching scope brings it back.
        registry.add_modifier(&tag("A"), add(1.0));
        assert_eq!(attr.value(), 11.0);
        assert_eq!(attr.injected_ids().len(), 2);
    }

    #[test]
    fn remove_by_source_tag_prunes_injected_set() {
        let registry = Rc::new(ModifierRegistry::new());
        let aura = Modifier::new(Operation::Add, 4.0, 0, Some(tag("Aura.Command"))).unwrap();
        registry.add_modifier(&tag("Army"), aura);
        let mut attr = TaggedAttribute::new(tag("Army.Morale"), 0.0);
        attr.register(&registry);
        attr.add_additive(1.0, 0, Some(tag("Aura.Banner"))).unwrap();
        assert_eq!(attr.value(), 5.0);

        assert_eq!(attr.remove_modifiers_by_tag(&tag("Aura")), 2);
        assert!(attr.injected_ids().is_empty());
        assert_eq!(attr.value(), 0.0);
    }

    #[test]
    fn drop_unsubscribes() {
        let registry = Rc::new(ModifierRegistry::new());
        {
            let mut attr = TaggedAttribute::new(tag("A"), 0.0);
            attr.register(&registry);
            assert_eq!(registry.listener_count(), 1);
        }
        assert_eq!(registry.listener_count(), 0);
        registry.add_modifier(&tag("A"), add(1.0));
    }
}
