//! Interfaces to the host simulation.
//!
//! Entities are owned by the host: this crate never stores a live entity
//! reference, only `EntityId` keys and weak [`EntityHandle`]s that are
//! re-validated against the host on every use. Everything the simulation
//! core needs from the outside world comes through [`HostWorld`] (physical
//! queries and mutations) and [`BehaviorGraph`] (animation-layer variables
//! and triggers).

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Stable per-entity key, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Weak reference to a host entity. Holding one keeps nothing alive;
/// `resolve` returns `None` once the entity has been destroyed or unloaded.
///
/// Scheduled closures must resolve every captured handle at the top of each
/// invocation and return done when any of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityHandle {
    id: EntityId,
}

impl EntityHandle {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }

    /// The raw key, valid for record lookups regardless of load state.
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn resolve(&self, host: &dyn HostWorld) -> Option<EntityId> {
        if host.is_loaded(self.id) {
            Some(self.id)
        } else {
            None
        }
    }
}

impl From<EntityId> for EntityHandle {
    fn from(id: EntityId) -> Self {
        Self::new(id)
    }
}

/// Attachment point used while an entity is being carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachNode {
    #[default]
    None,
    Hand,
    Cleavage,
    Mouth,
}

/// Depletable stat pools mirrored from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Health,
    Magicka,
    Stamina,
}

/// Passive bonuses that alter scale-engine math. The host decides how an
/// entity acquires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passive {
    /// Shrink magnitude is banked into stolen-attribute reserves.
    Absorption,
    /// Low health amplifies shrinks and taxes growths.
    Duress,
    /// Reduced stamina upkeep for sustained actions.
    Conservation,
}

/// Physical queries and mutations against the host simulation.
///
/// Absence is always a soft condition: queries on unloaded entities return
/// `None`/`false`/neutral values, never panic.
pub trait HostWorld {
    fn is_loaded(&self, id: EntityId) -> bool;
    fn is_alive(&self, id: EntityId) -> bool;
    fn is_player(&self, id: EntityId) -> bool;
    /// Teammate/follower of the player.
    fn is_ally(&self, id: EntityId) -> bool;
    fn is_hostile(&self, a: EntityId, b: EntityId) -> bool;
    fn loaded_entities(&self) -> Vec<EntityId>;

    fn position(&self, id: EntityId) -> Option<DVec3>;
    /// Bounding extents in meters at engine scale 1.0.
    fn bounding_box(&self, id: EntityId) -> Option<DVec3>;
    /// Scale applied by the host engine itself, outside this system.
    fn engine_scale(&self, id: EntityId) -> f64;
    /// Baseline scale of the entity's species/archetype.
    fn species_scale(&self, id: EntityId) -> f64;
    /// Body-editor scale chosen by the player, outside this system.
    fn cosmetic_scale(&self, id: EntityId) -> f64;
    fn body_weight(&self, id: EntityId) -> f64;
    fn footwear_weight(&self, id: EntityId) -> f64;
    fn level(&self, id: EntityId) -> u32;

    fn health_fraction(&self, id: EntityId) -> f64;
    fn resource(&self, id: EntityId, kind: Resource) -> f64;
    fn max_resource(&self, id: EntityId, kind: Resource) -> f64;
    fn damage(&mut self, id: EntityId, kind: Resource, amount: f64);
    fn restore(&mut self, id: EntityId, kind: Resource, amount: f64);
    fn slay(&mut self, id: EntityId);

    fn has_passive(&self, id: EntityId, passive: Passive) -> bool;

    /// Suppress or restore collision between a pair of entities.
    fn set_collision_enabled(&mut self, a: EntityId, b: EntityId, enabled: bool);
    /// Attach `held` to the given node of `holder` for this tick. Returns
    /// `false` when the node is unavailable; callers retry next tick.
    fn attach(&mut self, holder: EntityId, held: EntityId, node: AttachNode) -> bool;
    /// Push two entities apart after a release.
    fn separate(&mut self, a: EntityId, b: EntityId);
}

/// Named-variable surface of the host's animation/behavior layer.
///
/// Missing variables are expected: reads return `None` and writes on
/// unknown entities may be dropped.
pub trait BehaviorGraph {
    fn get_bool(&self, id: EntityId, var: &str) -> Option<bool>;
    fn get_int(&self, id: EntityId, var: &str) -> Option<i32>;
    fn get_float(&self, id: EntityId, var: &str) -> Option<f64>;
    fn set_bool(&mut self, id: EntityId, var: &str, value: bool);
    fn set_int(&mut self, id: EntityId, var: &str, value: i32);
    fn set_float(&mut self, id: EntityId, var: &str, value: f64);
    /// Fire a named behavior transition (animation trigger).
    fn start_anim(&mut self, id: EntityId, trigger: &str);
}
