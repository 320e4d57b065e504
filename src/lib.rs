//! Shieldwall - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of large-scale melee
//! battles: formations advance, make contact, fight, and break. Uses
//! `bevy_ecs` for the entity-component-system architecture. Rendering and
//! windowing are external collaborators that read snapshots.

pub mod api;
pub mod components;
pub mod constants;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::{SimConfig, SimWorld};
pub use components::*;
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
pub use world::Snapshot;
