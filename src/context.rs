//! Explicitly constructed session context.
//!
//! One `SimContext` per host session, created at session start and dropped
//! (or `reset_session`) at session end. The host calls `tick` once per
//! frame and `physics_tick` once per physics step, forwards behavior-graph
//! events through `on_event`, and drains `events` for feedback cues. There
//! are no globals; everything the core owns lives here.

use std::io::{Read, Write};

use anyhow::Result;

use crate::config::SimConfig;
use crate::events::EventBus;
use crate::grab::{self, GrabManager};
use crate::host::{BehaviorGraph, EntityId, HostWorld};
use crate::scale::{self, SizeEffect};
use crate::scheduler::{Scheduler, TickData, UpdatePhase};
use crate::store::EntityStore;

/// Simulation clock. Advanced only by `SimContext::tick`, so job deadlines
/// and effect easing stay stable under variable frame rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimTime {
    pub elapsed: f64,
    pub delta: f64,
}

impl SimTime {
    pub fn advance(&mut self, dt: f64) {
        self.delta = dt;
        self.elapsed += dt;
    }
}

/// Fixed-period gate against the simulation clock.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    period: f64,
    next: f64,
}

impl Timer {
    pub fn new(period: f64) -> Self {
        Self { period, next: 0.0 }
    }

    pub fn should_run(&mut self, now: f64) -> bool {
        if now >= self.next {
            self.next = now + self.period;
            true
        } else {
            false
        }
    }
}

pub struct SimContext {
    pub config: SimConfig,
    pub time: SimTime,
    pub store: EntityStore,
    pub scheduler: Scheduler,
    pub grabs: GrabManager,
    pub events: EventBus,
    refresh: Timer,
}

impl SimContext {
    pub fn new(config: SimConfig) -> Self {
        let refresh = Timer::new(config.refresh_period);
        Self {
            config,
            time: SimTime::default(),
            store: EntityStore::new(),
            scheduler: Scheduler::new(),
            grabs: GrabManager::new(),
            events: EventBus::default(),
            refresh,
        }
    }

    /// Advance one frame: move the clock, chase visual scales toward their
    /// targets, refresh cheap volatile fields on cadence, then run every
    /// default-phase job exactly once.
    pub fn tick(&mut self, host: &mut dyn HostWorld, graph: &mut dyn BehaviorGraph, dt: f64) {
        self.time.advance(dt);
        self.store.converge_visuals(dt);
        if self.refresh.should_run(self.time.elapsed) {
            self.store.refresh_loaded(host);
        }
        self.run_phase(UpdatePhase::Update, host, graph);
    }

    /// Run jobs parked on the physics phase. Does not advance the clock.
    pub fn physics_tick(&mut self, host: &mut dyn HostWorld, graph: &mut dyn BehaviorGraph) {
        self.run_phase(UpdatePhase::Physics, host, graph);
    }

    fn run_phase(&mut self, phase: UpdatePhase, host: &mut dyn HostWorld, graph: &mut dyn BehaviorGraph) {
        self.scheduler.tick(
            phase,
            TickData {
                store: &mut self.store,
                grabs: &mut self.grabs,
                host,
                graph,
                config: &self.config,
                time: &self.time,
                events: &mut self.events,
            },
        );
    }

    /// Inbound dispatch for named behavior-graph events. Unknown names are
    /// ignored; the graph layer raises more than this core consumes.
    pub fn on_event(
        &mut self,
        host: &mut dyn HostWorld,
        graph: &mut dyn BehaviorGraph,
        name: &str,
        entity: EntityId,
    ) {
        match name {
            "grab_catch_start" => {
                grab::on_catch_start(&mut self.grabs, &mut self.store, host, &mut self.events, entity)
            }
            "grab_catch_actor" => {
                grab::on_catch_confirm(&mut self.grabs, &mut self.store, host, graph, &mut self.events, entity)
            }
            "grab_stow_actor" => grab::on_stow(&mut self.grabs, &mut self.store, host, graph, entity),
            "grab_unstow_actor" => grab::on_unstow(&mut self.grabs, &mut self.store, graph, entity),
            "grab_consume_start" => grab::on_consume_start(&mut self.grabs, &mut self.store, entity),
            "grab_release_start" => self.grabs.set_phase(entity, grab::GrabPhase::Releasing),
            "grab_release_free" => grab::release_held(
                &mut self.grabs,
                &mut self.scheduler,
                &mut self.store,
                host,
                graph,
                &mut self.events,
                entity,
                false,
            ),
            "grab_exit" | "grab_abort" => grab::release_held(
                &mut self.grabs,
                &mut self.scheduler,
                &mut self.store,
                host,
                graph,
                &mut self.events,
                entity,
                true,
            ),
            other => log::debug!("ignoring behavior event '{other}'"),
        }
    }

    /// Start carrying `held`. Replaces any capture the holder already has.
    pub fn begin_grab(
        &mut self,
        host: &mut dyn HostWorld,
        graph: &mut dyn BehaviorGraph,
        holder: EntityId,
        held: EntityId,
        strength: f64,
    ) {
        self.grabs.begin(
            &mut self.scheduler,
            &mut self.store,
            host,
            graph,
            &self.config,
            &mut self.events,
            holder,
            held,
            strength,
        );
    }

    pub fn strike_held(
        &mut self,
        host: &mut dyn HostWorld,
        graph: &mut dyn BehaviorGraph,
        holder: EntityId,
        damage: f64,
    ) {
        grab::strike_held(
            &mut self.grabs,
            &mut self.scheduler,
            &mut self.store,
            host,
            graph,
            &self.config,
            &mut self.events,
            holder,
            damage,
        );
    }

    pub fn release_grab(&mut self, host: &mut dyn HostWorld, graph: &mut dyn BehaviorGraph, holder: EntityId) {
        grab::release_held(
            &mut self.grabs,
            &mut self.scheduler,
            &mut self.store,
            host,
            graph,
            &mut self.events,
            holder,
            false,
        );
    }

    /// Ensure records exist for `id`, capturing measurements on first
    /// sight. Returns the durable record for immediate mutation.
    pub fn track(&mut self, host: &dyn HostWorld, id: EntityId) -> &mut crate::store::DurableRecord {
        self.store.get_or_create_durable(host, &self.config.scale, id)
    }

    pub fn held_by(&self, holder: EntityId) -> Option<EntityId> {
        self.grabs.held_by(holder)
    }

    pub fn is_held(&self, entity: EntityId) -> bool {
        grab::is_held(&self.store, entity)
    }

    // Thin forwarding layer so collaborators (damage, potions, quests) can
    // drive the scale engine without reaching into the component modules.

    pub fn get_visual_scale(&self, host: &dyn HostWorld, id: EntityId) -> f64 {
        scale::get_visual_scale(&self.store, host, id)
    }

    pub fn get_target_scale(&self, host: &dyn HostWorld, id: EntityId) -> f64 {
        scale::get_target_scale(&self.store, host, id)
    }

    pub fn set_target_scale(&mut self, host: &dyn HostWorld, id: EntityId, value: f64) {
        scale::set_target_scale(&mut self.store, host, id, value);
    }

    pub fn mod_target_scale(&mut self, id: EntityId, delta: f64) {
        scale::mod_target_scale(&mut self.store, id, delta);
    }

    pub fn apply_growth(
        &mut self,
        host: &dyn HostWorld,
        id: EntityId,
        amount: f64,
        effect: SizeEffect,
    ) -> f64 {
        scale::apply_growth(&mut self.store, host, &self.config, id, amount, effect)
    }

    /// Drop session-local state (jobs, grabs, volatile records, undrained
    /// events) while keeping durable records. Matches a host session ending
    /// without the world being discarded.
    pub fn reset_session(&mut self) {
        log::info!("session reset: dropping jobs, grabs, volatile records");
        self.grabs.reset(&mut self.scheduler);
        self.scheduler.clear();
        self.store.clear_volatile();
        self.events.drain();
        self.time = SimTime::default();
        self.refresh = Timer::new(self.config.refresh_period);
    }

    /// Wholesale wipe, durable records included.
    pub fn reset_all(&mut self) {
        self.reset_session();
        self.store.clear_all();
    }

    /// Persist the durable map. Volatile records and jobs are intentionally
    /// never saved; they are rebuilt from live observation after reload.
    pub fn save_to(&self, writer: impl Write) -> Result<()> {
        self.store.save_to(writer)
    }

    /// Restore the durable map and restart the session around it.
    pub fn load_from(&mut self, reader: impl Read) -> Result<()> {
        self.reset_session();
        self.store.load_from(reader)
    }
}
