//! ECS components for the Shieldwall simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::*;

// ============================================================================
// MATH
// ============================================================================

/// Small 2D vector used for facings, offsets, and steering forces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit-length copy, or zero when the vector is too short to normalize.
    pub fn normalized(&self) -> Self {
        let len = self.length();
        if len < 1e-4 {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Clockwise perpendicular (the "right hand" of a facing vector).
    pub fn perp(&self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// Cap the magnitude at `max`. Vectors already under the cap are
    /// returned unchanged, not renormalized.
    pub fn clamp_length(&self, max: f32) -> Self {
        let len = self.length();
        if len > max && len > 1e-4 {
            Self::new(self.x * max / len, self.y * max / len)
        } else {
            *self
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D position on the battlefield (x = east/west, y = north/south).
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn to_vec2(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 2D velocity vector.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn from_vec2(v: Vec2) -> Self {
        Self { vx: v.x, vy: v.y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Army side.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// Compact id used by the spatial grid entries.
    pub fn index(&self) -> u8 {
        match self {
            Team::Red => 0,
            Team::Blue => 1,
        }
    }

    /// Direction a soldier of this team runs when routing with no enemy in
    /// sight. Red armies deploy on the -Y side, Blue on the +Y side, so each
    /// axis points back toward home.
    pub fn flee_axis(&self) -> Vec2 {
        match self {
            Team::Red => Vec2::new(0.0, -1.0),
            Team::Blue => Vec2::new(0.0, 1.0),
        }
    }
}

impl Default for Team {
    fn default() -> Self {
        Team::Red
    }
}

// ============================================================================
// COMBAT STATS
// ============================================================================

/// Per-soldier combat statistics.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Stats {
    pub health: f32,
    pub max_health: f32,
    pub stamina: f32,
    pub max_stamina: f32,
    pub attack_power: f32,
    pub defense: f32,
    pub speed: f32,
}

impl Stats {
    pub fn new(health: f32, stamina: f32, attack_power: f32, defense: f32, speed: f32) -> Self {
        Self {
            health,
            max_health: health,
            stamina,
            max_stamina: stamina,
            attack_power,
            defense,
            speed,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Reduce health, clamped at zero. There is no heal path in this
    /// simulation; health never increases once lost.
    pub fn damage(&mut self, amount: f32) {
        self.health = (self.health - amount).max(0.0);
    }

    pub fn drain_stamina(&mut self, amount: f32) {
        self.stamina = (self.stamina - amount).max(0.0);
    }

    pub fn recover_stamina(&mut self, amount: f32) {
        self.stamina = (self.stamina + amount).min(self.max_stamina);
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new(100.0, 100.0, 10.0, 5.0, HEAVY_INFANTRY_SPEED)
    }
}

/// Morale state of a soldier (0.0 = breaking, 1.0 = steady).
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Morale {
    pub value: f32,
    /// Standing modifier from army size, terrain, and the like.
    pub base_modifier: f32,
}

impl Morale {
    pub fn new(value: f32, base_modifier: f32) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            base_modifier,
        }
    }

    pub fn decrease(&mut self, amount: f32) {
        self.value = (self.value - amount).max(0.0);
    }

    pub fn recover(&mut self, amount: f32) {
        self.value = (self.value + amount).min(1.0);
    }
}

impl Default for Morale {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

// ============================================================================
// UNIT CLASSIFICATION
// ============================================================================

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitType {
    LightInfantry,
    HeavyInfantry,
    Cavalry,
}

impl UnitType {
    pub fn base_speed(&self) -> f32 {
        match self {
            UnitType::LightInfantry => LIGHT_INFANTRY_SPEED,
            UnitType::HeavyInfantry => HEAVY_INFANTRY_SPEED,
            UnitType::Cavalry => CAVALRY_SPEED,
        }
    }
}

impl Default for UnitType {
    fn default() -> Self {
        UnitType::HeavyInfantry
    }
}

/// Officers are drawn larger and their deaths shake nearby morale harder.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Officer {
    pub rank: i32,
}

impl Officer {
    pub fn new(rank: i32) -> Self {
        Self { rank }
    }
}

// ============================================================================
// FORMATION
// ============================================================================

/// What the formation as a whole is doing.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormationState {
    /// Moving toward the objective.
    Advancing,
    /// Front line in contact with the enemy, holding position.
    Engaged,
    /// Pulling back. Declared but not yet driven by any transition.
    Withdrawing,
    /// Collapsed, every man for himself. Declared but not yet driven.
    Broken,
}

impl Default for FormationState {
    fn default() -> Self {
        FormationState::Advancing
    }
}

/// Component for formation entities (the formation itself, not its members).
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Formation {
    /// Where the formation is trying to go.
    pub target_position: Vec2,
    /// Direction the formation faces (unit vector).
    pub facing: Vec2,
    pub state: FormationState,
    /// Formation advance speed.
    pub speed: f32,
    /// Which rank currently counts as the front line.
    pub front_rank: i32,
}

impl Formation {
    pub fn new(target_position: Vec2, facing: Vec2, speed: f32) -> Self {
        Self {
            target_position,
            facing,
            state: FormationState::Advancing,
            speed,
            front_rank: 0,
        }
    }

    /// World-space slot for a member offset: `offset.x` runs along the
    /// formation's right hand, `offset.y` along its facing.
    pub fn slot_position(&self, center: Vec2, local_offset: Vec2) -> Vec2 {
        center + self.facing.perp() * local_offset.x + self.facing * local_offset.y
    }
}

impl Default for Formation {
    fn default() -> Self {
        Self::new(Vec2::ZERO, Vec2::new(0.0, 1.0), HEAVY_INFANTRY_SPEED)
    }
}

/// Attached to soldiers belonging to a formation. The formation handle is a
/// generational `Entity`; systems probe it and treat a missing referent as
/// "ownerless" rather than an error.
#[derive(Component, Debug, Clone, Copy)]
pub struct FormationMember {
    pub formation: Entity,
    /// Offset from the formation center, in the formation's facing frame.
    pub local_offset: Vec2,
    /// Row: 0 = front, 1 = second, and so on.
    pub rank: i32,
    /// Column position.
    pub file: i32,
}

impl FormationMember {
    pub fn new(formation: Entity, local_offset: Vec2, rank: i32, file: i32) -> Self {
        Self {
            formation,
            local_offset,
            rank,
            file,
        }
    }
}

// ============================================================================
// SOLDIER STATUS
// ============================================================================

/// Exclusive per-soldier status. One enum rather than presence/absence tags,
/// so a soldier cannot be simultaneously dead and fighting.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub enum SoldierState {
    #[default]
    Normal,
    InCombat {
        opponent: Entity,
        /// Time since the last attack. Starts positive-random on engage and
        /// is reset negative after each swing to stagger cadence.
        timer: f32,
    },
    Routing,
    Dead,
}

impl SoldierState {
    pub fn is_dead(&self) -> bool {
        matches!(self, SoldierState::Dead)
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead()
    }

    pub fn is_routing(&self) -> bool {
        matches!(self, SoldierState::Routing)
    }

    pub fn opponent(&self) -> Option<Entity> {
        match self {
            SoldierState::InCombat { opponent, .. } => Some(*opponent),
            _ => None,
        }
    }

    /// One-way transition to Dead. Idempotent.
    pub fn kill(&mut self) {
        *self = SoldierState::Dead;
    }

    /// Renderer-facing tag.
    pub fn tag(&self) -> &'static str {
        match self {
            SoldierState::Normal => "Normal",
            SoldierState::InCombat { .. } => "InCombat",
            SoldierState::Routing => "Routing",
            SoldierState::Dead => "Dead",
        }
    }
}

/// Chase behavior target. Reserved: nothing assigns it yet, but death strips
/// it alongside the combat status.
#[derive(Component, Debug, Clone, Copy)]
pub struct Pursuing {
    pub target: Entity,
}

// ============================================================================
// MOVEMENT
// ============================================================================

/// Destination for free (non-formation) units.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MovementTarget {
    pub position: Vec2,
    pub has_target: bool,
}

impl MovementTarget {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            has_target: true,
        }
    }
}

// ============================================================================
// VISUAL CUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlashKind {
    #[default]
    None,
    /// White flash: the soldier swung.
    Attack,
    /// Yellow flash: the soldier was struck.
    Hit,
}

/// Transient visual cue, decremented every tick by the combat system.
/// Not behaviorally significant.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FlashEffect {
    pub kind: FlashKind,
    pub timer: f32,
}

impl FlashEffect {
    pub fn attack() -> Self {
        Self {
            kind: FlashKind::Attack,
            timer: FLASH_DURATION,
        }
    }

    pub fn hit() -> Self {
        Self {
            kind: FlashKind::Hit,
            timer: FLASH_DURATION,
        }
    }

    pub fn is_active(&self) -> bool {
        self.kind != FlashKind::None && self.timer > 0.0
    }

    pub fn decay(&mut self, dt: f32) {
        if self.timer > 0.0 {
            self.timer -= dt;
            if self.timer <= 0.0 {
                self.timer = 0.0;
                self.kind = FlashKind::None;
            }
        }
    }
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete soldier entity.
#[derive(Bundle, Default)]
pub struct SoldierBundle {
    pub position: Position,
    pub velocity: Velocity,
    pub team: Team,
    pub stats: Stats,
    pub morale: Morale,
    pub unit_type: UnitType,
    pub state: SoldierState,
    pub flash: FlashEffect,
}

/// Bundle for spawning a formation entity. The Team here is authoring
/// metadata; contact detection reads team off the members.
#[derive(Bundle, Default)]
pub struct FormationBundle {
    pub position: Position,
    pub team: Team,
    pub formation: Formation,
}
