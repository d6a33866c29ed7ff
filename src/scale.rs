//! Scale mutation engine.
//!
//! All quantities are multipliers over an entity's natural size. Target
//! scale is stored normalized (divided by natural scale on write,
//! multiplied back on read) so body-editor or engine scale changes never
//! silently inflate a stored target. Mutators clamp instead of erroring:
//! after any call here, `target_scale <= max_scale + EPS` holds.
//!
//! Accessors return [`UNINITIALIZED`] (`-1.0`) when no durable record
//! exists; callers must check the sentinel before doing arithmetic with it.

use rand::Rng;

use crate::config::SimConfig;
use crate::curves::soft_power;
use crate::host::{EntityId, HostWorld, Passive};
use crate::store::EntityStore;

pub const EPS: f64 = 1e-4;
/// Reserved sentinel for "no record"; every real scale is strictly positive.
pub const UNINITIALIZED: f64 = -1.0;
/// Default human standing height in meters, for bounding-box comparisons.
const REFERENCE_HEIGHT: f64 = 1.82;

/// Intent of a growth delta. `Shrink` engages the low-health edge bonus;
/// `Neutral` is for mechanical adjustments that should skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeEffect {
    Grow,
    Shrink,
    Neutral,
}

/// Combined scale from sources outside this system: body editor, species
/// baseline, and optionally the host engine's own scale. Defaults to 1.0
/// for entities never observed, so growth math degrades gracefully.
pub fn get_natural_scale(
    store: &EntityStore,
    host: &dyn HostWorld,
    id: EntityId,
    include_engine_scale: bool,
) -> f64 {
    match store.get_volatile(id) {
        Some(volatile) => {
            let mut result = volatile.natural_scale_factor * volatile.species_scale;
            if include_engine_scale {
                result *= host.engine_scale(id);
            }
            result
        }
        None => 1.0,
    }
}

pub fn get_visual_scale(store: &EntityStore, host: &dyn HostWorld, id: EntityId) -> f64 {
    match store.get_durable(id) {
        Some(durable) => durable.visual_scale * get_natural_scale(store, host, id, true),
        None => UNINITIALIZED,
    }
}

pub fn get_target_scale(store: &EntityStore, host: &dyn HostWorld, id: EntityId) -> f64 {
    match store.get_durable(id) {
        Some(durable) => durable.target_scale * get_natural_scale(store, host, id, true),
        None => UNINITIALIZED,
    }
}

/// Asymmetric clamp: values below the ceiling are accepted, values above it
/// snap to the ceiling only when coming from below. A target already over
/// the ceiling can come down but never jump further up.
pub fn set_target_scale(store: &mut EntityStore, host: &dyn HostWorld, id: EntityId, value: f64) {
    let natural = get_natural_scale(store, host, id, true);
    let Some(durable) = store.get_durable_mut(id) else {
        return;
    };
    let scale = value / natural;
    if scale < durable.max_scale + EPS {
        durable.target_scale = scale;
    } else if durable.target_scale < durable.max_scale - EPS {
        durable.target_scale = durable.max_scale;
    }
}

/// Delta form of the same clamp. Shrinking is never blocked by the ceiling.
pub fn mod_target_scale(store: &mut EntityStore, id: EntityId, delta: f64) {
    let Some(durable) = store.get_durable_mut(id) else {
        return;
    };
    if delta - EPS < 0.0 {
        durable.target_scale += delta;
    } else if durable.target_scale + delta < durable.max_scale + EPS {
        durable.target_scale += delta;
    } else if durable.target_scale < durable.max_scale - EPS {
        durable.target_scale = durable.max_scale;
    }
}

/// Like [`mod_target_scale`], with a caller-supplied floor (in multiples of
/// natural scale). Floor policy belongs to the caller, not the engine.
pub fn mod_target_scale_floored(store: &mut EntityStore, id: EntityId, delta: f64, floor: Option<f64>) {
    mod_target_scale(store, id, delta);
    if let (Some(floor), Some(durable)) = (floor, store.get_durable_mut(id)) {
        if durable.target_scale < floor {
            durable.target_scale = floor;
        }
    }
}

pub fn get_max_scale(store: &EntityStore, id: EntityId) -> f64 {
    store.get_durable(id).map_or(UNINITIALIZED, |d| d.max_scale)
}

pub fn set_max_scale(store: &mut EntityStore, id: EntityId, value: f64) {
    if let Some(durable) = store.get_durable_mut(id) {
        durable.max_scale = value;
    }
}

pub fn mod_max_scale(store: &mut EntityStore, id: EntityId, delta: f64) {
    if let Some(durable) = store.get_durable_mut(id) {
        durable.max_scale += delta;
    }
}

/// Diminishing-returns divisor over current scale. Active only in balanced
/// mode 2 and above; never reports less than 1.0.
pub fn growth_reduction(config: &SimConfig, scale: f64) -> f64 {
    if config.balance.mode >= 2 {
        let power = soft_power(scale, config.growth.reduction_shape()) * config.balance.size_gain_penalty;
        power.max(1.0)
    } else {
        1.0
    }
}

/// One bonus table for duress: below 60% health the multiplier rises
/// linearly to 1.5 at 10% health. Shrinks are multiplied by it, growths
/// divided.
fn edge_multiplier(host: &dyn HostWorld, id: EntityId, amount: f64) -> f64 {
    if !host.has_passive(id, Passive::Duress) {
        return 1.0;
    }
    let edge = (1.6 - host.health_fraction(id)).clamp(1.0, 1.5);
    if amount < 0.0 {
        edge
    } else {
        1.0 / edge
    }
}

/// Growth/shrink mediation. Applies the diminishing-returns divisor to
/// player/ally growth at or above natural size, banks shrink magnitude into
/// the stolen-attribute reserve for qualifying entities, applies the duress
/// edge for shrink effects, then routes the result through the target-scale
/// clamp. Returns the post-multiplier delta so callers can drive feedback
/// proportionally.
pub fn apply_growth(
    store: &mut EntityStore,
    host: &dyn HostWorld,
    config: &SimConfig,
    id: EntityId,
    amount: f64,
    effect: SizeEffect,
) -> f64 {
    store.get_or_create_durable(host, &config.scale, id);
    let visual = get_visual_scale(store, host, id);
    let mut amount = amount;

    if amount > 0.0 && (host.is_player(id) || host.is_ally(id)) {
        if visual >= 1.0 {
            amount /= growth_reduction(config, visual);
        }
    } else if amount - EPS < 0.0 {
        if let Some(volatile) = store.get_volatile(id) {
            amount *= (1.0 - volatile.shrink_resistance).clamp(0.0, 1.0);
        }
        let banked = -amount / growth_reduction(config, visual.max(0.01));
        add_stolen_attributes(store, host, id, banked);
    }

    let edge = if effect == SizeEffect::Shrink { edge_multiplier(host, id, amount) } else { 1.0 };
    let applied = amount * edge;
    mod_target_scale(store, id, applied);
    applied
}

// ---------- Stolen attributes & size reserve ----------

/// Grow the unallocated bank. Requires the absorption passive; the bank
/// never goes negative.
pub fn add_stolen_attributes(store: &mut EntityStore, host: &dyn HostWorld, id: EntityId, value: f64) {
    if !host.has_passive(id, Passive::Absorption) {
        return;
    }
    if let Some(durable) = store.get_durable_mut(id) {
        durable.stolen_attributes = (durable.stolen_attributes + value).max(0.0);
    }
}

pub fn get_stolen_attributes(store: &EntityStore, id: EntityId) -> f64 {
    store.get_durable(id).map_or(0.0, |d| d.stolen_attributes)
}

/// Spend `value` from the bank into one random stat pool at a 4x rate.
/// Each pool is capped at `2 x level x level_limit_modifier`.
pub fn distribute_stolen_attributes(
    store: &mut EntityStore,
    host: &dyn HostWorld,
    config: &SimConfig,
    id: EntityId,
    value: f64,
) {
    if value <= 0.0 || !host.has_passive(id, Passive::Absorption) {
        return;
    }
    let limit = 2.0 * host.level(id) as f64 * config.balance.level_limit_modifier;
    let Some(durable) = store.get_durable_mut(id) else {
        return;
    };
    if durable.stolen_attributes <= 0.0 {
        return;
    }
    let pool = rand::thread_rng().gen_range(0..4);
    let gain = value * 4.0;
    match pool {
        0 => durable.stolen_health = (durable.stolen_health + gain).min(limit),
        1 => durable.stolen_magicka = (durable.stolen_magicka + gain).min(limit),
        _ => durable.stolen_stamina = (durable.stolen_stamina + gain).min(limit),
    }
    durable.stolen_attributes = (durable.stolen_attributes - value).max(0.0);
}

pub fn add_size_reserve(store: &mut EntityStore, id: EntityId, amount: f64) {
    if let Some(durable) = store.get_durable_mut(id) {
        durable.size_reserve = (durable.size_reserve + amount).max(0.0);
    }
}

pub fn get_size_reserve(store: &EntityStore, id: EntityId) -> f64 {
    store.get_durable(id).map_or(0.0, |d| d.size_reserve)
}

// ---------- Measurements ----------

/// Relative body size from the cached bounding box, against a default
/// human. 1.0 for entities never measured.
pub fn bounding_box_factor(store: &EntityStore, id: EntityId) -> f64 {
    store.get_volatile(id).map_or(1.0, |v| v.base_height / REFERENCE_HEIGHT)
}

/// Current standing height in meters, if the entity has been measured.
pub fn measured_height(store: &EntityStore, id: EntityId) -> Option<f64> {
    let volatile = store.get_volatile(id)?;
    let durable = store.get_durable(id)?;
    Some(volatile.base_height * durable.visual_scale)
}

/// Current weight estimate; mass scales cubically with visual scale.
pub fn measured_weight(store: &EntityStore, id: EntityId) -> Option<f64> {
    let volatile = store.get_volatile(id)?;
    let durable = store.get_durable(id)?;
    Some((volatile.body_weight + volatile.footwear_weight) * durable.visual_scale.powi(3))
}

/// Holder-to-held size ratio used by capture viability checks. Compares
/// target scales weighted by bounding-box size so a small race holding a
/// large one is judged fairly.
pub fn size_ratio(store: &EntityStore, host: &dyn HostWorld, holder: EntityId, held: EntityId) -> f64 {
    let holder_scale = get_target_scale(store, host, holder) * bounding_box_factor(store, holder);
    let held_scale = get_target_scale(store, host, held) * bounding_box_factor(store, held);
    if holder_scale <= 0.0 || held_scale <= 0.0 {
        return 0.0;
    }
    holder_scale / held_scale
}
