//! ECS systems for the Shieldwall simulation.
//!
//! Systems contain the game logic that operates on components. They run
//! strictly sequentially within a tick, in this order:
//!
//! 1. `rebuild_spatial_grid` - refresh the neighbor index (src/spatial.rs)
//! 2. `formation_system` - formation state machine + contact detection
//! 3. `movement_system` - per-soldier steering and integration
//! 4. `flash_decay_system`, `combat_system` - visual cues, then melee
//! 5. `morale_shock_system`, `rout_system`, `stamina_recovery_system`
//!
//! The ordering is load-bearing: movement reads the formation state decided
//! this tick, and combat reads positions as moved this tick. The spatial
//! grid is read-only for everything after its rebuild.

pub mod combat;
pub mod formation;
pub mod morale;
pub mod movement;

pub use combat::*;
pub use formation::*;
pub use morale::*;
pub use movement::*;
