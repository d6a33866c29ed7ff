#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use glam::DVec3;
use stature_core::{AttachNode, BehaviorGraph, EntityId, HostWorld, Passive, Resource};

/// Scriptable stand-in for the host simulation's entity world.
pub struct TestEntity {
    pub loaded: bool,
    pub alive: bool,
    pub player: bool,
    pub ally: bool,
    pub pos: DVec3,
    pub bounds: DVec3,
    pub engine_scale: f64,
    pub species_scale: f64,
    pub cosmetic_scale: f64,
    pub body_weight: f64,
    pub footwear_weight: f64,
    pub level: u32,
    pub health: f64,
    pub max_health: f64,
    pub magicka: f64,
    pub max_magicka: f64,
    pub stamina: f64,
    pub max_stamina: f64,
    pub passives: Vec<Passive>,
    pub attachable: bool,
}

impl Default for TestEntity {
    fn default() -> Self {
        Self {
            loaded: true,
            alive: true,
            player: false,
            ally: false,
            pos: DVec3::ZERO,
            bounds: DVec3::new(0.45, 0.3, 1.82),
            engine_scale: 1.0,
            species_scale: 1.0,
            cosmetic_scale: 1.0,
            body_weight: 70.0,
            footwear_weight: 1.0,
            level: 10,
            health: 100.0,
            max_health: 100.0,
            magicka: 100.0,
            max_magicka: 100.0,
            stamina: 100.0,
            max_stamina: 100.0,
            passives: Vec::new(),
            attachable: true,
        }
    }
}

#[derive(Default)]
pub struct TestWorld {
    pub entities: HashMap<EntityId, TestEntity>,
    pub hostile_pairs: HashSet<(u32, u32)>,
    pub collision_disabled: HashSet<(u32, u32)>,
    pub separations: Vec<(EntityId, EntityId)>,
    pub attach_log: Vec<(EntityId, EntityId, AttachNode)>,
}

impl TestWorld {
    pub fn spawn(&mut self, id: u32) -> EntityId {
        let id = EntityId(id);
        self.entities.insert(id, TestEntity::default());
        id
    }

    pub fn spawn_with(&mut self, id: u32, configure: impl FnOnce(&mut TestEntity)) -> EntityId {
        let id = self.spawn(id);
        configure(self.entities.get_mut(&id).expect("just spawned"));
        id
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut TestEntity {
        self.entities.get_mut(&id).expect("entity not spawned")
    }

    pub fn unload(&mut self, id: EntityId) {
        self.entity_mut(id).loaded = false;
    }

    pub fn set_hostile(&mut self, a: EntityId, b: EntityId) {
        self.hostile_pairs.insert(pair_key(a, b));
    }

    pub fn collision_suppressed(&self, a: EntityId, b: EntityId) -> bool {
        self.collision_disabled.contains(&pair_key(a, b))
    }
}

fn pair_key(a: EntityId, b: EntityId) -> (u32, u32) {
    if a.0 <= b.0 {
        (a.0, b.0)
    } else {
        (b.0, a.0)
    }
}

impl HostWorld for TestWorld {
    fn is_loaded(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.loaded)
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.alive)
    }

    fn is_player(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.player)
    }

    fn is_ally(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.ally)
    }

    fn is_hostile(&self, a: EntityId, b: EntityId) -> bool {
        self.hostile_pairs.contains(&pair_key(a, b))
    }

    fn loaded_entities(&self) -> Vec<EntityId> {
        self.entities.iter().filter(|(_, e)| e.loaded).map(|(id, _)| *id).collect()
    }

    fn position(&self, id: EntityId) -> Option<DVec3> {
        self.entities.get(&id).filter(|e| e.loaded).map(|e| e.pos)
    }

    fn bounding_box(&self, id: EntityId) -> Option<DVec3> {
        self.entities.get(&id).filter(|e| e.loaded).map(|e| e.bounds)
    }

    fn engine_scale(&self, id: EntityId) -> f64 {
        self.entities.get(&id).map_or(1.0, |e| e.engine_scale)
    }

    fn species_scale(&self, id: EntityId) -> f64 {
        self.entities.get(&id).map_or(1.0, |e| e.species_scale)
    }

    fn cosmetic_scale(&self, id: EntityId) -> f64 {
        self.entities.get(&id).map_or(1.0, |e| e.cosmetic_scale)
    }

    fn body_weight(&self, id: EntityId) -> f64 {
        self.entities.get(&id).map_or(0.0, |e| e.body_weight)
    }

    fn footwear_weight(&self, id: EntityId) -> f64 {
        self.entities.get(&id).map_or(0.0, |e| e.footwear_weight)
    }

    fn level(&self, id: EntityId) -> u32 {
        self.entities.get(&id).map_or(1, |e| e.level)
    }

    fn health_fraction(&self, id: EntityId) -> f64 {
        self.entities.get(&id).map_or(1.0, |e| {
            if e.max_health > 0.0 {
                e.health / e.max_health
            } else {
                0.0
            }
        })
    }

    fn resource(&self, id: EntityId, kind: Resource) -> f64 {
        self.entities.get(&id).map_or(0.0, |e| match kind {
            Resource::Health => e.health,
            Resource::Magicka => e.magicka,
            Resource::Stamina => e.stamina,
        })
    }

    fn max_resource(&self, id: EntityId, kind: Resource) -> f64 {
        self.entities.get(&id).map_or(0.0, |e| match kind {
            Resource::Health => e.max_health,
            Resource::Magicka => e.max_magicka,
            Resource::Stamina => e.max_stamina,
        })
    }

    fn damage(&mut self, id: EntityId, kind: Resource, amount: f64) {
        if let Some(e) = self.entities.get_mut(&id) {
            match kind {
                Resource::Health => e.health = (e.health - amount).max(0.0),
                Resource::Magicka => e.magicka = (e.magicka - amount).max(0.0),
                Resource::Stamina => e.stamina = (e.stamina - amount).max(0.0),
            }
            if e.health <= 0.0 {
                e.alive = false;
            }
        }
    }

    fn restore(&mut self, id: EntityId, kind: Resource, amount: f64) {
        if let Some(e) = self.entities.get_mut(&id) {
            match kind {
                Resource::Health => e.health = (e.health + amount).min(e.max_health),
                Resource::Magicka => e.magicka = (e.magicka + amount).min(e.max_magicka),
                Resource::Stamina => e.stamina = (e.stamina + amount).min(e.max_stamina),
            }
        }
    }

    fn slay(&mut self, id: EntityId) {
        if let Some(e) = self.entities.get_mut(&id) {
            e.alive = false;
            e.health = 0.0;
        }
    }

    fn has_passive(&self, id: EntityId, passive: Passive) -> bool {
        self.entities.get(&id).is_some_and(|e| e.passives.contains(&passive))
    }

    fn set_collision_enabled(&mut self, a: EntityId, b: EntityId, enabled: bool) {
        if enabled {
            self.collision_disabled.remove(&pair_key(a, b));
        } else {
            self.collision_disabled.insert(pair_key(a, b));
        }
    }

    fn attach(&mut self, holder: EntityId, held: EntityId, node: AttachNode) -> bool {
        let ok = self.entities.get(&holder).is_some_and(|e| e.loaded && e.attachable)
            && self.entities.get(&held).is_some_and(|e| e.loaded);
        if ok {
            self.attach_log.push((holder, held, node));
        }
        ok
    }

    fn separate(&mut self, a: EntityId, b: EntityId) {
        self.separations.push((a, b));
    }
}

/// Recording stand-in for the animation/behavior layer.
#[derive(Default)]
pub struct TestGraph {
    pub bools: HashMap<(EntityId, String), bool>,
    pub ints: HashMap<(EntityId, String), i32>,
    pub floats: HashMap<(EntityId, String), f64>,
    pub anims: Vec<(EntityId, String)>,
}

impl TestGraph {
    pub fn int(&self, id: EntityId, var: &str) -> i32 {
        self.ints.get(&(id, var.to_string())).copied().unwrap_or(0)
    }

    pub fn triggered(&self, id: EntityId, anim: &str) -> bool {
        self.anims.iter().any(|(e, a)| *e == id && a == anim)
    }
}

impl BehaviorGraph for TestGraph {
    fn get_bool(&self, id: EntityId, var: &str) -> Option<bool> {
        self.bools.get(&(id, var.to_string())).copied()
    }

    fn get_int(&self, id: EntityId, var: &str) -> Option<i32> {
        self.ints.get(&(id, var.to_string())).copied()
    }

    fn get_float(&self, id: EntityId, var: &str) -> Option<f64> {
        self.floats.get(&(id, var.to_string())).copied()
    }

    fn set_bool(&mut self, id: EntityId, var: &str, value: bool) {
        self.bools.insert((id, var.to_string()), value);
    }

    fn set_int(&mut self, id: EntityId, var: &str, value: i32) {
        self.ints.insert((id, var.to_string()), value);
    }

    fn set_float(&mut self, id: EntityId, var: &str, value: f64) {
        self.floats.insert((id, var.to_string()), value);
    }

    fn start_anim(&mut self, id: EntityId, trigger: &str) {
        self.anims.push((id, trigger.to_string()));
    }
}
