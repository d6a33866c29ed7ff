//! Per-entity state records and their lifecycle.
//!
//! Two maps, one durable and one volatile. The durable map is the only
//! state that survives a save/reload cycle; the volatile map is rebuilt
//! from live observation and is cheap to refresh. Absence of either record
//! is never an error: accessors return `Option` and the scale engine
//! substitutes sentinels/defaults.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

use anyhow::{Context, Result};
use bitflags::bitflags;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::config::ScaleConfig;
use crate::host::{AttachNode, EntityId, HostWorld};
use crate::spring;

bitflags! {
    /// Packed cosmetic state mirrored into the save file so visuals restore
    /// without re-deriving them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CosmeticFlags: u32 {
        /// Footwear hidden because the entity outgrew it.
        const BAREFOOT = 1 << 0;
        /// Growth aura effect enabled.
        const AURA = 1 << 1;
        /// Entity pinned to the size readout HUD.
        const HUD_TRACKED = 1 << 2;
    }
}

fn one() -> f64 {
    1.0
}

/// Persistent per-entity scale state. Serialized as-is into the flat save
/// map; every field must keep a serde default so old saves load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurableRecord {
    /// Scale the entity converges toward, stored as a multiplier over
    /// natural size.
    #[serde(default = "one")]
    pub target_scale: f64,
    /// Soft ceiling for `target_scale`.
    #[serde(default = "one")]
    pub max_scale: f64,
    /// Scale in effect this tick; chases `target_scale`.
    #[serde(default = "one")]
    pub visual_scale: f64,
    /// Half-life of the visual-scale convergence. Zero snaps.
    #[serde(default)]
    pub half_life: f64,
    /// Unallocated bank built from shrink magnitude.
    #[serde(default)]
    pub stolen_attributes: f64,
    #[serde(default)]
    pub stolen_health: f64,
    #[serde(default)]
    pub stolen_magicka: f64,
    #[serde(default)]
    pub stolen_stamina: f64,
    /// Banked size released on demand.
    #[serde(default)]
    pub size_reserve: f64,
    /// Victims crushed while held; drives quest progression.
    #[serde(default)]
    pub crushed_count: u32,
    #[serde(default)]
    cosmetic_flags: u32,
}

impl DurableRecord {
    pub fn new(scale_cfg: &ScaleConfig) -> Self {
        Self {
            target_scale: 1.0,
            max_scale: scale_cfg.default_max_scale,
            visual_scale: 1.0,
            half_life: scale_cfg.default_half_life,
            stolen_attributes: 0.0,
            stolen_health: 0.0,
            stolen_magicka: 0.0,
            stolen_stamina: 0.0,
            size_reserve: 0.0,
            crushed_count: 0,
            cosmetic_flags: 0,
        }
    }

    pub fn cosmetics(&self) -> CosmeticFlags {
        CosmeticFlags::from_bits_truncate(self.cosmetic_flags)
    }

    pub fn set_cosmetic(&mut self, flag: CosmeticFlags, enabled: bool) {
        let mut flags = self.cosmetics();
        flags.set(flag, enabled);
        self.cosmetic_flags = flags.bits();
    }
}

/// Session-local per-entity state, rebuilt on first sight. Never persisted.
#[derive(Debug, Clone)]
pub struct VolatileRecord {
    /// Scale contributed by the body editor, outside this system.
    pub natural_scale_factor: f64,
    /// Baseline species/archetype scale, cached at first sight.
    pub species_scale: f64,
    /// Standing height in meters at the scale observed on creation.
    pub base_height: f64,
    /// Bounding volume in cubic meters at the scale observed on creation.
    pub base_volume: f64,
    pub footwear_weight: f64,
    pub body_weight: f64,
    pub is_ally: bool,
    /// Set while another entity carries this one.
    pub held_by: Option<EntityId>,
    pub between_cleavage: bool,
    pub attach_node: AttachNode,
    pub collision_suppressed_with: Option<EntityId>,
    /// Short-lived consumable bonus on max scale.
    pub size_potion_bonus: f64,
    pub shrink_resistance: f64,
    pub movement_slowdown: f64,
}

impl VolatileRecord {
    /// Capability query against the live entity. Measurements are captured
    /// once; `EntityStore::refresh_loaded` keeps only the cheap fields
    /// current afterwards.
    pub fn capture(host: &dyn HostWorld, id: EntityId) -> Self {
        let bounds = host.bounding_box(id).unwrap_or(DVec3::new(0.45, 0.3, 1.82));
        let observed = host.engine_scale(id).max(f64::MIN_POSITIVE);
        Self {
            natural_scale_factor: host.cosmetic_scale(id),
            species_scale: host.species_scale(id),
            base_height: bounds.z * observed,
            base_volume: bounds.x * bounds.y * bounds.z * observed.powi(3),
            footwear_weight: host.footwear_weight(id),
            body_weight: host.body_weight(id),
            is_ally: host.is_ally(id),
            held_by: None,
            between_cleavage: false,
            attach_node: AttachNode::None,
            collision_suppressed_with: None,
            size_potion_bonus: 0.0,
            shrink_resistance: 0.0,
            movement_slowdown: 1.0,
        }
    }
}

/// Flat save layout: stable id -> durable fields, nothing else.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SaveState {
    pub entities: BTreeMap<EntityId, DurableRecord>,
}

#[derive(Default)]
pub struct EntityStore {
    durable: HashMap<EntityId, DurableRecord>,
    volatile: HashMap<EntityId, VolatileRecord>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never fails; creating the durable record also captures the volatile
    /// one so first-mutation callers see consistent measurements.
    pub fn get_or_create_durable(
        &mut self,
        host: &dyn HostWorld,
        scale_cfg: &ScaleConfig,
        id: EntityId,
    ) -> &mut DurableRecord {
        self.volatile.entry(id).or_insert_with(|| VolatileRecord::capture(host, id));
        self.durable.entry(id).or_insert_with(|| DurableRecord::new(scale_cfg))
    }

    pub fn get_durable(&self, id: EntityId) -> Option<&DurableRecord> {
        self.durable.get(&id)
    }

    pub fn get_durable_mut(&mut self, id: EntityId) -> Option<&mut DurableRecord> {
        self.durable.get_mut(&id)
    }

    pub fn get_or_create_volatile(&mut self, host: &dyn HostWorld, id: EntityId) -> &mut VolatileRecord {
        self.volatile.entry(id).or_insert_with(|| VolatileRecord::capture(host, id))
    }

    pub fn get_volatile(&self, id: EntityId) -> Option<&VolatileRecord> {
        self.volatile.get(&id)
    }

    pub fn get_volatile_mut(&mut self, id: EntityId) -> Option<&mut VolatileRecord> {
        self.volatile.get_mut(&id)
    }

    pub fn remove(&mut self, id: EntityId) {
        self.durable.remove(&id);
        self.volatile.remove(&id);
    }

    pub fn remove_volatile(&mut self, id: EntityId) {
        self.volatile.remove(&id);
    }

    pub fn clear_all(&mut self) {
        log::info!("entity store cleared ({} durable records)", self.durable.len());
        self.durable.clear();
        self.volatile.clear();
    }

    pub fn clear_volatile(&mut self) {
        self.volatile.clear();
    }

    pub fn tracked_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.durable.keys().copied()
    }

    /// Recompute the cheap volatile fields for every loaded entity that
    /// already has a record. Refresh, not create: unseen entities are
    /// skipped.
    pub fn refresh_loaded(&mut self, host: &dyn HostWorld) {
        for id in host.loaded_entities() {
            let Some(record) = self.volatile.get_mut(&id) else {
                continue;
            };
            record.footwear_weight = host.footwear_weight(id);
            record.body_weight = host.body_weight(id);
            record.is_ally = host.is_ally(id);
        }
    }

    /// Drive every visual scale toward its target with the record's own
    /// half-life damping.
    pub fn converge_visuals(&mut self, dt: f64) {
        for record in self.durable.values_mut() {
            record.visual_scale =
                spring::approach(record.visual_scale, record.target_scale, record.half_life, dt);
        }
    }

    pub fn save_state(&self) -> SaveState {
        SaveState { entities: self.durable.iter().map(|(id, rec)| (*id, rec.clone())).collect() }
    }

    pub fn apply_state(&mut self, state: SaveState) {
        self.durable = state.entities.into_iter().collect();
    }

    pub fn save_to(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.save_state()).context("Serializing durable records")
    }

    pub fn load_from(&mut self, reader: impl Read) -> Result<()> {
        let state: SaveState = serde_json::from_reader(reader).context("Parsing durable records")?;
        self.apply_state(state);
        Ok(())
    }
}
