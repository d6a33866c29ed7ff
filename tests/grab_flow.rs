mod common;

use common::{TestGraph, TestWorld};
use stature_core::events::SimEvent;
use stature_core::grab::{self, VAR_GRAB_STATE, VAR_HOLDING, VAR_STORING};
use stature_core::{AttachNode, EntityId, SimConfig, SimContext};

const DT: f64 = 0.1;

/// Holder at 10x scale with a carried 1x entity, grab already begun.
fn captured_pair() -> (SimContext, TestWorld, TestGraph, EntityId, EntityId) {
    let mut world = TestWorld::default();
    let holder = world.spawn(10);
    let tiny = world.spawn(11);
    let mut graph = TestGraph::default();

    let mut ctx = SimContext::new(SimConfig::default());
    {
        let record = ctx.track(&world, holder);
        record.max_scale = 20.0;
        record.target_scale = 10.0;
        record.visual_scale = 10.0;
    }
    ctx.track(&world, tiny);
    ctx.begin_grab(&mut world, &mut graph, holder, tiny, 1.0);
    (ctx, world, graph, holder, tiny)
}

#[test]
fn starting_a_grab_marks_both_sides() {
    let (ctx, world, graph, holder, tiny) = captured_pair();

    assert_eq!(ctx.held_by(holder), Some(tiny));
    assert!(ctx.is_held(tiny));
    assert!(world.collision_suppressed(holder, tiny));
    assert_eq!(graph.int(holder, VAR_GRAB_STATE), 1);
    assert!(ctx.scheduler.is_scheduled("grab_attach_10"));
}

#[test]
fn second_grab_replaces_the_first_target() {
    let (mut ctx, mut world, mut graph, holder, first) = captured_pair();
    let second = world.spawn(12);
    ctx.track(&world, second);

    ctx.begin_grab(&mut world, &mut graph, holder, second, 1.0);

    assert_eq!(ctx.grabs.active_count(), 1, "one held target per capturing entity");
    assert_eq!(ctx.held_by(holder), Some(second));
    assert!(!ctx.is_held(first), "replaced target must be freed");
    assert!(!world.collision_suppressed(holder, first));
    assert!(ctx.is_held(second));
}

#[test]
fn maintenance_attaches_every_tick_and_drains_the_holder() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    assert_eq!(graph.int(holder, VAR_HOLDING), 1);

    ctx.tick(&mut world, &mut graph, DT);
    ctx.tick(&mut world, &mut graph, DT);

    assert!(
        world.attach_log.iter().any(|(h, t, node)| *h == holder && *t == tiny && *node == AttachNode::Hand),
        "maintenance job must attach the pair at the hand"
    );
    assert!(
        world.entities[&holder].stamina < 100.0,
        "holding someone costs stamina"
    );
}

#[test]
fn failed_attachment_retries_instead_of_releasing() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    world.entity_mut(holder).attachable = false;

    for _ in 0..4 {
        ctx.tick(&mut world, &mut graph, DT);
    }

    assert!(world.attach_log.is_empty());
    assert!(ctx.scheduler.is_scheduled("grab_attach_10"), "node misses are transient, keep trying");
    assert_eq!(ctx.held_by(holder), Some(tiny));
}

#[test]
fn stowing_moves_the_pair_to_cleavage() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    ctx.on_event(&mut world, &mut graph, "grab_stow_actor", holder);

    assert_eq!(graph.int(holder, VAR_STORING), 1);
    assert_eq!(graph.int(holder, VAR_HOLDING), 0);
    assert!(graph.triggered(tiny, grab::ANIM_STORAGE_FRIENDLY));
    assert!(ctx.store.get_volatile(tiny).unwrap().between_cleavage);

    ctx.tick(&mut world, &mut graph, DT);
    assert!(
        world.attach_log.iter().any(|(_, _, node)| *node == AttachNode::Cleavage),
        "attachment follows the placement"
    );
}

#[test]
fn friendly_carry_restores_the_carried_entity() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    world.entity_mut(tiny).health = 50.0;

    ctx.tick(&mut world, &mut graph, DT);
    assert!(world.entities[&tiny].health > 50.0, "friendly transfer heals");
}

#[test]
fn hostile_carry_drains_the_carried_entity() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    world.set_hostile(holder, tiny);
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);

    ctx.tick(&mut world, &mut graph, DT);
    assert!(world.entities[&tiny].stamina < 100.0, "hostile transfer drains stamina");
}

#[test]
fn release_event_frees_everything() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    ctx.tick(&mut world, &mut graph, DT);

    ctx.on_event(&mut world, &mut graph, "grab_release_free", holder);

    assert_eq!(ctx.held_by(holder), None);
    assert!(!ctx.is_held(tiny));
    assert!(!world.collision_suppressed(holder, tiny));
    assert!(!ctx.scheduler.is_scheduled("grab_attach_10"));
    assert!(world.separations.contains(&(holder, tiny)));
    assert_eq!(graph.int(holder, VAR_HOLDING), 0);
    assert_eq!(graph.int(holder, VAR_GRAB_STATE), 0);
    let released = ctx
        .events
        .drain()
        .into_iter()
        .any(|event| matches!(event, SimEvent::GrabReleased { forced: false, .. }));
    assert!(released, "release must be reported unforced");
}

#[test]
fn losing_the_size_advantage_forces_a_clean_release() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    ctx.tick(&mut world, &mut graph, DT);

    ctx.store.get_durable_mut(holder).unwrap().target_scale = 5.0;
    ctx.tick(&mut world, &mut graph, DT);

    assert_eq!(ctx.held_by(holder), None);
    assert!(!ctx.is_held(tiny));
    assert!(!world.collision_suppressed(holder, tiny));
    assert!(graph.triggered(holder, grab::ANIM_ABORT));
    assert!(!ctx.scheduler.is_scheduled("grab_attach_10"));
}

#[test]
fn death_of_either_participant_ends_the_grab() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    ctx.tick(&mut world, &mut graph, DT);

    world.entity_mut(tiny).alive = false;
    ctx.tick(&mut world, &mut graph, DT);

    assert_eq!(ctx.held_by(holder), None);
    assert!(!ctx.is_held(tiny));
}

#[test]
fn exhausted_holder_drops_the_grab() {
    let (mut ctx, mut world, mut graph, holder, _tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    ctx.tick(&mut world, &mut graph, DT);

    world.entity_mut(holder).stamina = 1.0;
    ctx.tick(&mut world, &mut graph, DT);

    assert_eq!(ctx.held_by(holder), None);
}

#[test]
fn unloading_the_held_entity_ends_the_job_next_tick() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    ctx.tick(&mut world, &mut graph, DT);

    world.unload(tiny);
    ctx.tick(&mut world, &mut graph, DT);

    assert_eq!(ctx.held_by(holder), None);
    assert_eq!(graph.int(holder, VAR_HOLDING), 0, "graph flags cleared when the target vanishes");
}

#[test]
fn striking_shrinks_the_held_entity() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    let before = ctx.store.get_durable(tiny).unwrap().target_scale;

    ctx.strike_held(&mut world, &mut graph, holder, 2.0);

    assert!(world.entities[&tiny].health < 100.0);
    let after = ctx.store.get_durable(tiny).unwrap().target_scale;
    assert!(after < before, "a capture strike inflicts a size-reducing effect");
    assert_eq!(ctx.held_by(holder), Some(tiny), "a survivable strike keeps the hold");
}

#[test]
fn lethal_strike_crushes_and_banks_reserve() {
    let (mut ctx, mut world, mut graph, holder, tiny) = captured_pair();
    ctx.on_event(&mut world, &mut graph, "grab_catch_actor", holder);
    world.entity_mut(tiny).health = 5.0;

    ctx.strike_held(&mut world, &mut graph, holder, 10.0);

    assert!(!world.entities[&tiny].alive);
    let holder_record = ctx.store.get_durable(holder).unwrap();
    assert_eq!(holder_record.crushed_count, 1);
    assert!(holder_record.size_reserve > 0.0, "crushed size is banked, never wasted");
    assert_eq!(ctx.held_by(holder), None);
    let crushed = ctx
        .events
        .drain()
        .into_iter()
        .any(|event| matches!(event, SimEvent::Crushed { .. }));
    assert!(crushed);
}
