//! Grab/attachment state machine.
//!
//! One record per capturing entity: who is held, how firmly, and where the
//! capture currently sits in `Catching -> Attached -> Releasing/Aborting`.
//! Transitions are driven by named events from the host's behavior graph
//! (see `SimContext::on_event`) plus a per-tick maintenance job that keeps
//! the pair attached, runs viability checks, and degrades to a clean
//! release when anything goes wrong. Nothing here errors outward: a missing
//! node retries next tick, a vanished participant ends the job silently.

use std::collections::HashMap;

use crate::config::SimConfig;
use crate::events::{EventBus, SimEvent};
use crate::host::{AttachNode, BehaviorGraph, EntityHandle, EntityId, HostWorld, Passive, Resource};
use crate::scale::{self, SizeEffect};
use crate::scheduler::{JobCtx, Scheduler};
use crate::store::EntityStore;

/// Behavior-graph variables this machine writes back to the host.
pub const VAR_HOLDING: &str = "holding_tiny";
pub const VAR_STORING: &str = "storing_tiny";
pub const VAR_GRAB_STATE: &str = "grab_state";
pub const VAR_STORED: &str = "is_stored";

/// Animation trigger fired when a grab ends abnormally.
pub const ANIM_ABORT: &str = "grab_abort";
pub const ANIM_STORAGE_FRIENDLY: &str = "storage_idle_friendly";
pub const ANIM_STORAGE_HOSTILE: &str = "storage_idle_hostile";
pub const ANIM_STORAGE_EXIT: &str = "storage_exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabPhase {
    Catching,
    Attached(AttachNode),
    Releasing,
    Aborting,
}

#[derive(Debug, Clone, Copy)]
pub struct GrabRecord {
    pub held: EntityHandle,
    pub strength: f64,
    pub phase: GrabPhase,
}

fn attach_job_name(holder: EntityId) -> String {
    format!("grab_attach_{}", holder.0)
}

#[derive(Default)]
pub struct GrabManager {
    grabs: HashMap<EntityId, GrabRecord>,
}

impl GrabManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a capture. At most one held target per capturing entity: a
    /// second call replaces the first record and retargets the maintenance
    /// job. Strength 1.0 is a normal grip for the holder's size.
    #[allow(clippy::too_many_arguments)]
    pub fn begin(
        &mut self,
        scheduler: &mut Scheduler,
        store: &mut EntityStore,
        host: &mut dyn HostWorld,
        graph: &mut dyn BehaviorGraph,
        config: &SimConfig,
        events: &mut EventBus,
        holder: EntityId,
        held: EntityId,
        strength: f64,
    ) {
        if let Some(previous) = self.grabs.get(&holder).map(|record| record.held.id()) {
            if previous != held {
                clear_held_state(store, host, previous, holder);
            }
        }
        self.grabs.insert(
            holder,
            GrabRecord { held: EntityHandle::new(held), strength, phase: GrabPhase::Catching },
        );

        store.get_or_create_durable(host, &config.scale, holder);
        store.get_or_create_durable(host, &config.scale, held);
        let volatile = store.get_or_create_volatile(host, held);
        volatile.held_by = Some(holder);
        volatile.collision_suppressed_with = Some(holder);
        host.set_collision_enabled(holder, held, false);
        graph.set_int(holder, VAR_GRAB_STATE, 1);
        events.push(SimEvent::GrabStarted { holder, held });

        let holder_handle = EntityHandle::new(holder);
        let held_handle = EntityHandle::new(held);
        scheduler.run(attach_job_name(holder), move |ctx: &mut JobCtx| {
            maintain(ctx, holder_handle, held_handle)
        });
    }

    pub fn record(&self, holder: EntityId) -> Option<&GrabRecord> {
        self.grabs.get(&holder)
    }

    pub fn held_by(&self, holder: EntityId) -> Option<EntityId> {
        self.grabs.get(&holder).map(|record| record.held.id())
    }

    pub fn set_phase(&mut self, holder: EntityId, phase: GrabPhase) {
        if let Some(record) = self.grabs.get_mut(&holder) {
            record.phase = phase;
        }
    }

    /// Drop the record without touching the participants. Cleanup helpers
    /// below are the public way out.
    pub fn release(&mut self, holder: EntityId) {
        self.grabs.remove(&holder);
    }

    pub fn reset(&mut self, scheduler: &mut Scheduler) {
        for holder in self.grabs.keys() {
            scheduler.cancel(&attach_job_name(*holder));
        }
        self.grabs.clear();
    }

    pub fn active_count(&self) -> usize {
        self.grabs.len()
    }
}

/// Whether any capturing entity currently holds `id`.
pub fn is_held(store: &EntityStore, id: EntityId) -> bool {
    store.get_volatile(id).is_some_and(|v| v.held_by.is_some())
}

/// Clean release driven from outside a job (events, strikes, teardown).
#[allow(clippy::too_many_arguments)]
pub fn release_held(
    grabs: &mut GrabManager,
    scheduler: &mut Scheduler,
    store: &mut EntityStore,
    host: &mut dyn HostWorld,
    graph: &mut dyn BehaviorGraph,
    events: &mut EventBus,
    holder: EntityId,
    forced: bool,
) {
    let Some(held) = grabs.held_by(holder) else {
        return;
    };
    scheduler.cancel(&attach_job_name(holder));
    clear_holder_vars(graph, holder);
    clear_held_state(store, host, held, holder);
    if host.is_loaded(held) {
        host.separate(holder, held);
    }
    grabs.release(holder);
    events.push(SimEvent::GrabReleased { holder, held, forced });
}

/// Damage whatever the holder is carrying. The blow scales with the size
/// difference, shrinks the victim, and crushes them outright when it kills.
#[allow(clippy::too_many_arguments)]
pub fn strike_held(
    grabs: &mut GrabManager,
    scheduler: &mut Scheduler,
    store: &mut EntityStore,
    host: &mut dyn HostWorld,
    graph: &mut dyn BehaviorGraph,
    config: &SimConfig,
    events: &mut EventBus,
    holder: EntityId,
    damage: f64,
) {
    let Some(held) = grabs.held_by(holder) else {
        return;
    };
    if !host.is_loaded(held) {
        return;
    }
    let ratio = scale::size_ratio(store, host, holder, held).max(1.0);
    let dealt = damage * ratio;
    host.damage(held, Resource::Health, dealt);
    scale::apply_growth(store, host, config, held, -dealt * 0.005, SizeEffect::Shrink);
    events.push(SimEvent::Cue { name: "grab_strike", entity: holder, magnitude: ratio });

    if !host.is_alive(held) || host.resource(held, Resource::Health) <= 1.0 {
        let reserve = scale::get_visual_scale(store, host, held).max(0.0) / 10.0;
        host.slay(held);
        if let Some(durable) = store.get_durable_mut(holder) {
            durable.crushed_count += 1;
        }
        scale::add_size_reserve(store, holder, reserve);
        events.push(SimEvent::Crushed { holder, victim: held });
        release_held(grabs, scheduler, store, host, graph, events, holder, true);
    }
}

/// Per-tick maintenance while a capture is live. Returns `false` to end the
/// job; every exit path leaves flags, collision, and graph variables clean.
fn maintain(ctx: &mut JobCtx, holder_handle: EntityHandle, held_handle: EntityHandle) -> bool {
    let Some(holder) = holder_handle.resolve(ctx.host) else {
        // Holder unloaded mid-capture: free the held side if it survives.
        if let Some(held) = held_handle.resolve(ctx.host) {
            clear_held_state(ctx.store, ctx.host, held, holder_handle.id());
        }
        ctx.grabs.grabs.remove(&holder_handle.id());
        return false;
    };
    let Some(held) = held_handle.resolve(ctx.host) else {
        clear_holder_vars(ctx.graph, holder);
        ctx.grabs.grabs.remove(&holder);
        return false;
    };
    let Some(record) = ctx.grabs.grabs.get(&holder).copied() else {
        return false;
    };

    let ratio = scale::size_ratio(ctx.store, ctx.host, holder, held);
    let striking = ctx.graph.get_bool(holder, "grab_attacking").unwrap_or(false);
    if !striking {
        let starved = ctx.host.resource(holder, Resource::Stamina) < ctx.config.grab.min_stamina;
        let dead = !ctx.host.is_alive(holder) || !ctx.host.is_alive(held);
        // A firmer grip keeps a smaller size advantage viable.
        if dead || ratio * record.strength < ctx.config.grab.min_size_ratio || starved {
            force_release(ctx, holder, held);
            return false;
        }
    }

    if let GrabPhase::Attached(_) = record.phase {
        let rate = ctx.config.grab.passive_transfer * ctx.time.delta;
        if ctx.host.is_hostile(holder, held) {
            ctx.host.damage(held, Resource::Stamina, rate * ctx.config.grab.hostile_drain_mult);
        } else {
            ctx.host.restore(held, Resource::Health, rate);
            ctx.host.restore(held, Resource::Stamina, rate);
        }
    }

    let node = match record.phase {
        GrabPhase::Catching => AttachNode::Hand,
        GrabPhase::Attached(node) => node,
        // Keep the pair together until the release/abort event lands.
        GrabPhase::Releasing | GrabPhase::Aborting => AttachNode::Hand,
    };
    if !ctx.host.attach(holder, held, node) {
        // Node unavailable this tick; try again next tick.
        return true;
    }

    if matches!(record.phase, GrabPhase::Attached(AttachNode::Hand)) {
        let mut upkeep = ctx.config.grab.hold_drain * ctx.time.delta / ratio.max(1.0);
        if ctx.host.has_passive(holder, Passive::Conservation) {
            upkeep *= 0.65;
        }
        ctx.host.damage(holder, Resource::Stamina, upkeep);
    }

    true
}

/// Job-side forced release: notify the graph, free the held entity, restore
/// collision, and drop the record. The job returns done right after.
fn force_release(ctx: &mut JobCtx, holder: EntityId, held: EntityId) {
    ctx.graph.start_anim(holder, ANIM_ABORT);
    clear_holder_vars(ctx.graph, holder);
    clear_held_state(ctx.store, ctx.host, held, holder);
    ctx.host.separate(holder, held);
    ctx.grabs.grabs.remove(&holder);
    ctx.events.push(SimEvent::GrabReleased { holder, held, forced: true });
}

fn clear_holder_vars(graph: &mut dyn BehaviorGraph, holder: EntityId) {
    graph.set_int(holder, VAR_HOLDING, 0);
    graph.set_int(holder, VAR_STORING, 0);
    graph.set_int(holder, VAR_GRAB_STATE, 0);
}

fn clear_held_state(store: &mut EntityStore, host: &mut dyn HostWorld, held: EntityId, holder: EntityId) {
    if let Some(volatile) = store.get_volatile_mut(held) {
        volatile.held_by = None;
        volatile.between_cleavage = false;
        volatile.attach_node = AttachNode::None;
        volatile.collision_suppressed_with = None;
    }
    host.set_collision_enabled(holder, held, true);
}

// ---------- Event-driven transitions ----------

/// Capture animation started reaching for the target.
pub fn on_catch_start(
    grabs: &mut GrabManager,
    store: &mut EntityStore,
    host: &mut dyn HostWorld,
    events: &mut EventBus,
    holder: EntityId,
) {
    let Some(held) = grabs.held_by(holder) else {
        return;
    };
    if let Some(volatile) = store.get_volatile_mut(held) {
        volatile.held_by = Some(holder);
    }
    host.set_collision_enabled(holder, held, false);
    let magnitude = scale::size_ratio(store, host, holder, held);
    events.push(SimEvent::Cue { name: "grab_reach", entity: holder, magnitude });
}

/// Capture animation reached the hand: the hold is now real.
pub fn on_catch_confirm(
    grabs: &mut GrabManager,
    store: &mut EntityStore,
    host: &mut dyn HostWorld,
    graph: &mut dyn BehaviorGraph,
    events: &mut EventBus,
    holder: EntityId,
) {
    let Some(record) = grabs.grabs.get_mut(&holder) else {
        return;
    };
    record.phase = GrabPhase::Attached(AttachNode::Hand);
    let held = record.held.id();
    graph.set_int(holder, VAR_HOLDING, 1);
    if let Some(volatile) = store.get_volatile_mut(held) {
        volatile.attach_node = AttachNode::Hand;
    }
    // Re-assert suppression; the catch animation may have respawned physics.
    host.set_collision_enabled(holder, held, false);
    let magnitude = scale::size_ratio(store, host, holder, held);
    events.push(SimEvent::Cue { name: "grab_catch", entity: holder, magnitude });
}

/// Move the held entity into cleavage storage.
pub fn on_stow(
    grabs: &mut GrabManager,
    store: &mut EntityStore,
    host: &mut dyn HostWorld,
    graph: &mut dyn BehaviorGraph,
    holder: EntityId,
) {
    let Some(record) = grabs.grabs.get_mut(&holder) else {
        return;
    };
    record.phase = GrabPhase::Attached(AttachNode::Cleavage);
    let held = record.held.id();
    graph.set_int(holder, VAR_STORING, 1);
    graph.set_int(holder, VAR_HOLDING, 0);
    graph.set_bool(held, VAR_STORED, true);
    if let Some(volatile) = store.get_volatile_mut(held) {
        volatile.between_cleavage = true;
        volatile.attach_node = AttachNode::Cleavage;
    }
    let idle = if host.is_hostile(holder, held) { ANIM_STORAGE_HOSTILE } else { ANIM_STORAGE_FRIENDLY };
    graph.start_anim(held, idle);
}

/// Take the held entity back into the hand.
pub fn on_unstow(
    grabs: &mut GrabManager,
    store: &mut EntityStore,
    graph: &mut dyn BehaviorGraph,
    holder: EntityId,
) {
    let Some(record) = grabs.grabs.get_mut(&holder) else {
        return;
    };
    record.phase = GrabPhase::Attached(AttachNode::Hand);
    let held = record.held.id();
    graph.set_int(holder, VAR_STORING, 0);
    graph.set_int(holder, VAR_HOLDING, 1);
    graph.set_bool(held, VAR_STORED, false);
    if let Some(volatile) = store.get_volatile_mut(held) {
        volatile.between_cleavage = false;
        volatile.attach_node = AttachNode::Hand;
    }
    graph.start_anim(held, ANIM_STORAGE_EXIT);
}

/// The devour animation took over; keep the pair attached at the mouth.
pub fn on_consume_start(grabs: &mut GrabManager, store: &mut EntityStore, holder: EntityId) {
    let Some(record) = grabs.grabs.get_mut(&holder) else {
        return;
    };
    record.phase = GrabPhase::Attached(AttachNode::Mouth);
    if let Some(volatile) = store.get_volatile_mut(record.held.id()) {
        volatile.attach_node = AttachNode::Mouth;
    }
}
