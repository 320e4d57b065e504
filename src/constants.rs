//! Tuning constants for the battle simulation.
//!
//! Radii are shared between the formation, movement, and combat systems, so
//! they live here rather than at the top of any single system file.

/// Simulation step length in seconds (60 Hz).
pub const FIXED_TIMESTEP: f32 = 1.0 / 60.0;

/// Frame deltas above this are clamped before accumulation.
pub const MAX_FRAME_TIME: f32 = 0.25;

// ============================================================================
// SPATIAL
// ============================================================================

/// Distance at which a free unit stops short of its movement target.
pub const MELEE_RANGE: f32 = 2.0;

/// Rank/file distance between soldiers in a formation block.
pub const FORMATION_SPACING: f32 = 2.5;

/// Radius within which deaths and routs affect morale, and within which
/// routing soldiers look for enemies to flee from.
pub const MORALE_EFFECT_RADIUS: f32 = 20.0;

/// Spatial grid cell size. Tuned to the interaction radii below: small
/// enough that a radius query touches few cells, large enough that a cell
/// holds more than one soldier at formation spacing.
pub const SPATIAL_CELL_SIZE: f32 = 10.0;

/// An enemy inside this radius halts a soldier's advance and, for front-rank
/// soldiers, flips the whole formation to Engaged. Kept equal to
/// ATTACK_RANGE so soldiers cross into melee on the same step their
/// formation declares contact.
pub const ENEMY_STOP_RADIUS: f32 = 4.0;

/// Same-team soldiers inside this radius push each other apart.
pub const ALLY_SEPARATION_RADIUS: f32 = 1.5;

/// Speed contribution of the accumulated ally-separation push.
pub const ALLY_SEPARATION_STRENGTH: f32 = 3.0;

/// Radius of the ally check one spacing ahead when looking for a gap in the
/// line. Half a spacing: sees a soldier standing in the slot, not his file
/// neighbors.
pub const GAP_CHECK_RADIUS: f32 = FORMATION_SPACING * 0.5;

// ============================================================================
// COMBAT
// ============================================================================

pub const ATTACK_RANGE: f32 = 4.0;
pub const ATTACK_COOLDOWN: f32 = 1.0;

pub const MISS_CHANCE: f32 = 0.3;
/// Chance that a non-miss lands as a heavy hit.
pub const HEAVY_HIT_CHANCE: f32 = 0.2;
pub const LIGHT_DAMAGE: f32 = 12.0;
pub const HEAVY_DAMAGE: f32 = 30.0;

pub const BASE_ATTACK_STAMINA_COST: f32 = 10.0;
pub const STAMINA_REGEN_RATE: f32 = 5.0;

/// How long an attack/hit flash stays visible, in seconds.
pub const FLASH_DURATION: f32 = 0.2;

// ============================================================================
// MORALE
// ============================================================================

pub const ALLY_KILL_MORALE_BOOST: f32 = 0.05;
pub const ALLY_DEATH_MORALE_HIT: f32 = 0.08;
pub const NEARBY_ROUT_MORALE_HIT: f32 = 0.15;
pub const OFFICER_DEATH_MORALE_HIT: f32 = 0.20;
pub const ROUT_THRESHOLD: f32 = 0.0;
pub const FRONT_LINE_MORALE_BONUS: f32 = 0.1;

// ============================================================================
// MOVEMENT SPEEDS (units per second)
// ============================================================================

pub const LIGHT_INFANTRY_SPEED: f32 = 8.0;
pub const HEAVY_INFANTRY_SPEED: f32 = 5.0;
pub const CAVALRY_SPEED: f32 = 15.0;

/// Speed multiplier for routing soldiers.
pub const ROUT_SPEED_MULT: f32 = 1.5;
