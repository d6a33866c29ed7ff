//! Multi-tick size effects built on the scheduler.
//!
//! Each effect is a named job capturing weak handles and a small spring or
//! timer; re-triggering an effect replaces the previous job under the same
//! name, so sources never stack by accident.

use crate::config::SimConfig;
use crate::events::{EventBus, SimEvent};
use crate::host::{EntityHandle, EntityId, HostWorld, Passive, Resource};
use crate::scale::{self, SizeEffect};
use crate::scheduler::{JobCtx, Scheduler};
use crate::spring::Spring;
use crate::store::EntityStore;

const SETTLE_TOLERANCE: f64 = 1e-4;

/// Grow `id` by `amount` total, eased in with the given half-life. The
/// delta runs through the full growth mediation every tick, so balance
/// penalties and caps apply exactly as they would for instant growth.
pub fn grow_over_time(scheduler: &mut Scheduler, id: EntityId, amount: f64, half_life: f64) {
    let handle = EntityHandle::new(id);
    let mut spring = Spring::new(0.0, half_life);
    spring.target = amount;
    let mut added = 0.0;
    scheduler.run(format!("spring_grow_{}", id.0), move |ctx: &mut JobCtx| {
        let Some(id) = handle.resolve(ctx.host) else {
            return false;
        };
        spring.advance(ctx.time.delta);
        let step = spring.value - added;
        added = spring.value;
        let applied = scale::apply_growth(ctx.store, ctx.host, ctx.config, id, step, SizeEffect::Grow);
        ctx.events.push(SimEvent::GrowthApplied { entity: id, delta: applied });
        !spring.settled(SETTLE_TOLERANCE)
    });
}

/// Shrink `id` by `amount` total (positive magnitude), eased in with the
/// given half-life. `floor`, when supplied, is a hard lower bound in
/// multiples of natural scale; floor policy belongs to the caller.
pub fn shrink_over_time(
    scheduler: &mut Scheduler,
    id: EntityId,
    amount: f64,
    half_life: f64,
    floor: Option<f64>,
) {
    let handle = EntityHandle::new(id);
    let mut spring = Spring::new(0.0, half_life);
    spring.target = -amount.abs();
    let mut added = 0.0;
    scheduler.run(format!("spring_shrink_{}", id.0), move |ctx: &mut JobCtx| {
        let Some(id) = handle.resolve(ctx.host) else {
            return false;
        };
        spring.advance(ctx.time.delta);
        let step = spring.value - added;
        added = spring.value;
        let applied = scale::apply_growth(ctx.store, ctx.host, ctx.config, id, step, SizeEffect::Shrink);
        if let (Some(floor), Some(durable)) = (floor, ctx.store.get_durable_mut(id)) {
            if durable.target_scale < floor {
                durable.target_scale = floor;
            }
        }
        ctx.events.push(SimEvent::GrowthApplied { entity: id, delta: applied });
        !spring.settled(SETTLE_TOLERANCE)
    });
}

/// Temporarily override the visual-convergence half-life and revert it
/// after `revert_after` seconds of simulation time. Reverts on every exit
/// path, including the entity unloading early.
pub fn adjust_half_life_for(
    scheduler: &mut Scheduler,
    store: &mut EntityStore,
    id: EntityId,
    half_life: f64,
    revert_after: f64,
) {
    let Some(durable) = store.get_durable_mut(id) else {
        return;
    };
    let old_half_life = durable.half_life;
    durable.half_life = half_life;

    let handle = EntityHandle::new(id);
    let mut started_at: Option<f64> = None;
    scheduler.run(format!("half_life_revert_{}", id.0), move |ctx: &mut JobCtx| {
        let start = *started_at.get_or_insert(ctx.time.elapsed);
        let expired = ctx.time.elapsed - start >= revert_after;
        if expired || handle.resolve(ctx.host).is_none() {
            if let Some(durable) = ctx.store.get_durable_mut(handle.id()) {
                durable.half_life = old_half_life;
            }
            return false;
        }
        true
    });
}

/// Spend banked size reserve after a held input: everything past the
/// activation threshold converts into growth plus a health refund. Returns
/// the amount actually spent.
pub fn release_size_reserve(
    store: &mut EntityStore,
    host: &mut dyn HostWorld,
    config: &SimConfig,
    events: &mut EventBus,
    id: EntityId,
    hold_duration: f64,
) -> f64 {
    const ACTIVATION: f64 = 1.2;
    const DRAIN_RATE: f64 = 80.0;

    let reserve = scale::get_size_reserve(store, id);
    if reserve <= 0.0 || hold_duration < ACTIVATION {
        return 0.0;
    }
    let spend = ((hold_duration - ACTIVATION) / DRAIN_RATE).min(reserve);
    scale::apply_growth(store, host, config, id, spend, SizeEffect::Neutral);
    if host.has_passive(id, Passive::Absorption) {
        let refund = host.max_resource(id, Resource::Health) * 0.25 * spend;
        host.restore(id, Resource::Health, refund);
    }
    if let Some(durable) = store.get_durable_mut(id) {
        durable.size_reserve = (durable.size_reserve - spend).max(0.0);
    }
    events.push(SimEvent::ReserveSpent { entity: id, amount: spend });
    spend
}
