mod common;

use std::fs::File;
use std::io::Write;

use common::{TestGraph, TestWorld};
use stature_core::store::CosmeticFlags;
use stature_core::{JobCtx, SimConfig, SimContext};

#[test]
fn durable_records_survive_a_save_and_reload() {
    let mut world = TestWorld::default();
    let entity = world.spawn(21);
    let mut ctx = SimContext::new(SimConfig::default());
    {
        let record = ctx.track(&world, entity);
        record.target_scale = 1.4;
        record.max_scale = 3.0;
        record.visual_scale = 1.2;
        record.half_life = 0.25;
        record.stolen_attributes = 0.6;
        record.stolen_health = 2.0;
        record.size_reserve = 0.3;
        record.crushed_count = 4;
        record.set_cosmetic(CosmeticFlags::BAREFOOT, true);
    }
    let saved = ctx.store.get_durable(entity).unwrap().clone();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("scales.json");
    ctx.save_to(File::create(&path).expect("create save")).expect("write save");

    let mut restored = SimContext::new(SimConfig::default());
    restored.load_from(File::open(&path).expect("open save")).expect("read save");

    assert_eq!(restored.store.get_durable(entity), Some(&saved));
    assert!(
        restored.store.get_durable(entity).unwrap().cosmetics().contains(CosmeticFlags::BAREFOOT),
        "cosmetic flags round-trip through the packed field"
    );
}

#[test]
fn volatile_state_and_jobs_are_never_persisted() {
    let mut world = TestWorld::default();
    let mut graph = TestGraph::default();
    let entity = world.spawn(21);
    let mut ctx = SimContext::new(SimConfig::default());
    ctx.track(&world, entity);
    ctx.store.get_volatile_mut(entity).unwrap().between_cleavage = true;
    ctx.scheduler.run("leftover", |_: &mut JobCtx| true);
    ctx.tick(&mut world, &mut graph, 0.1);

    let mut buffer = Vec::new();
    ctx.save_to(&mut buffer).expect("write save");

    let mut restored = SimContext::new(SimConfig::default());
    restored.scheduler.run("stale", |_: &mut JobCtx| true);
    restored.load_from(buffer.as_slice()).expect("read save");

    assert!(restored.store.get_volatile(entity).is_none(), "volatile records rebuild from observation");
    assert_eq!(restored.scheduler.job_count(), 0, "jobs re-register after reload, never deserialize");
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("old_save.json");
    File::create(&path)
        .and_then(|mut f| f.write_all(br#"{"entities":{"5":{"target_scale":1.7}}}"#))
        .expect("write legacy save");

    let mut ctx = SimContext::new(SimConfig::default());
    ctx.load_from(File::open(&path).expect("open save")).expect("read save");

    let record = ctx.store.get_durable(stature_core::EntityId(5)).expect("entity restored");
    assert_eq!(record.target_scale, 1.7);
    assert_eq!(record.max_scale, 1.0, "absent fields use defaults");
    assert_eq!(record.visual_scale, 1.0);
    assert_eq!(record.crushed_count, 0);
}

#[test]
fn removal_and_reset_drop_records() {
    let mut world = TestWorld::default();
    let a = world.spawn(1);
    let b = world.spawn(2);
    let mut ctx = SimContext::new(SimConfig::default());
    ctx.track(&world, a);
    ctx.track(&world, b);

    ctx.store.remove(a);
    assert!(ctx.store.get_durable(a).is_none());
    assert!(ctx.store.get_volatile(a).is_none());
    assert!(ctx.store.get_durable(b).is_some());

    ctx.reset_all();
    assert!(ctx.store.get_durable(b).is_none());
}
