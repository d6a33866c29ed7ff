use crate::host::EntityId;
use std::fmt;

/// Outbound notifications for the host's feedback layers (audio, particles,
/// UI). The core never plays or spawns anything itself; it pushes events and
/// the host drains the bus once per frame.
#[derive(Debug, Clone)]
pub enum SimEvent {
    GrowthApplied { entity: EntityId, delta: f64 },
    GrabStarted { holder: EntityId, held: EntityId },
    GrabReleased { holder: EntityId, held: EntityId, forced: bool },
    Crushed { holder: EntityId, victim: EntityId },
    ReserveSpent { entity: EntityId, amount: f64 },
    /// Generic feedback cue; `magnitude` is proportional to the size
    /// difference or effect strength driving it.
    Cue { name: &'static str, entity: EntityId, magnitude: f64 },
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimEvent::GrowthApplied { entity, delta } => {
                write!(f, "GrowthApplied entity={entity} delta={delta:.4}")
            }
            SimEvent::GrabStarted { holder, held } => {
                write!(f, "GrabStarted holder={holder} held={held}")
            }
            SimEvent::GrabReleased { holder, held, forced } => {
                write!(f, "GrabReleased holder={holder} held={held} forced={forced}")
            }
            SimEvent::Crushed { holder, victim } => {
                write!(f, "Crushed holder={holder} victim={victim}")
            }
            SimEvent::ReserveSpent { entity, amount } => {
                write!(f, "ReserveSpent entity={entity} amount={amount:.4}")
            }
            SimEvent::Cue { name, entity, magnitude } => {
                write!(f, "Cue {name} entity={entity} magnitude={magnitude:.3}")
            }
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    events: Vec<SimEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
