pub mod config;
pub mod context;
pub mod curves;
pub mod effects;
pub mod events;
pub mod grab;
pub mod host;
pub mod scale;
pub mod scheduler;
pub mod spring;
pub mod store;

pub use config::SimConfig;
pub use context::{SimContext, SimTime, Timer};
pub use host::{AttachNode, BehaviorGraph, EntityHandle, EntityId, HostWorld, Passive, Resource};
pub use scale::SizeEffect;
pub use scheduler::{JobCtx, Scheduler, UpdatePhase};
pub use store::{DurableRecord, EntityStore, VolatileRecord};
