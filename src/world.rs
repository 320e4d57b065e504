//! Serializable snapshot of the simulation state.
//!
//! The `Snapshot` struct is the read-only surface handed to an external
//! renderer: positions and teams for drawing, status tags for styling,
//! morale for brightness, flashes for transient color overrides.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::*;

/// Snapshot of a single soldier's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoldierSnapshot {
    pub id: u32,
    pub team: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub health: f32,
    pub max_health: f32,
    pub stamina: f32,
    pub morale: f32,
    pub unit_type: String,
    /// "Normal", "InCombat", "Routing", or "Dead".
    pub state: String,
    pub officer: bool,
    /// "None", "Attack", or "Hit".
    pub flash: String,
}

/// Snapshot of a formation entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormationSnapshot {
    pub id: u32,
    pub team: String,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub facing_x: f32,
    pub facing_y: f32,
    pub state: String,
    pub front_rank: i32,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub soldiers: Vec<SoldierSnapshot>,
    pub formations: Vec<FormationSnapshot>,
    pub red_alive: usize,
    pub blue_alive: usize,
    pub red_dead: usize,
    pub blue_dead: usize,
}

fn team_name(team: &Team) -> &'static str {
    match team {
        Team::Red => "Red",
        Team::Blue => "Blue",
    }
}

fn formation_state_name(state: FormationState) -> &'static str {
    match state {
        FormationState::Advancing => "Advancing",
        FormationState::Engaged => "Engaged",
        FormationState::Withdrawing => "Withdrawing",
        FormationState::Broken => "Broken",
    }
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut soldiers = Vec::new();
        let mut red_alive = 0;
        let mut blue_alive = 0;
        let mut red_dead = 0;
        let mut blue_dead = 0;

        let mut soldier_query = world.query_filtered::<(
            Entity,
            &Position,
            &Velocity,
            &Team,
            &Stats,
            &Morale,
            &UnitType,
            &SoldierState,
            Option<&Officer>,
            Option<&FlashEffect>,
        ), Without<Formation>>();

        for (entity, pos, vel, team, stats, morale, unit_type, state, officer, flash) in
            soldier_query.iter(world)
        {
            match (team, state.is_dead()) {
                (Team::Red, false) => red_alive += 1,
                (Team::Red, true) => red_dead += 1,
                (Team::Blue, false) => blue_alive += 1,
                (Team::Blue, true) => blue_dead += 1,
            }

            let unit_type_str = match unit_type {
                UnitType::LightInfantry => "LightInfantry",
                UnitType::HeavyInfantry => "HeavyInfantry",
                UnitType::Cavalry => "Cavalry",
            };
            let flash_str = match flash {
                Some(f) if f.is_active() && f.kind == FlashKind::Attack => "Attack",
                Some(f) if f.is_active() && f.kind == FlashKind::Hit => "Hit",
                _ => "None",
            };

            soldiers.push(SoldierSnapshot {
                id: entity.index(),
                team: team_name(team).to_string(),
                x: pos.x,
                y: pos.y,
                vx: vel.vx,
                vy: vel.vy,
                health: stats.health,
                max_health: stats.max_health,
                stamina: stats.stamina,
                morale: morale.value,
                unit_type: unit_type_str.to_string(),
                state: state.tag().to_string(),
                officer: officer.is_some(),
                flash: flash_str.to_string(),
            });
        }

        let mut formations = Vec::new();
        let mut formation_query = world.query::<(Entity, &Position, &Team, &Formation)>();
        for (entity, pos, team, formation) in formation_query.iter(world) {
            formations.push(FormationSnapshot {
                id: entity.index(),
                team: team_name(team).to_string(),
                x: pos.x,
                y: pos.y,
                target_x: formation.target_position.x,
                target_y: formation.target_position.y,
                facing_x: formation.facing.x,
                facing_y: formation.facing.y,
                state: formation_state_name(formation.state).to_string(),
                front_rank: formation.front_rank,
            });
        }

        Self {
            tick,
            time,
            soldiers,
            formations,
            red_alive,
            blue_alive,
            red_dead,
            blue_dead,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tallies_and_tags() {
        let mut world = World::new();
        world.spawn(SoldierBundle {
            team: Team::Red,
            ..Default::default()
        });
        let casualty = world
            .spawn((
                SoldierBundle {
                    team: Team::Blue,
                    ..Default::default()
                },
                Officer::new(1),
            ))
            .id();
        world.get_mut::<SoldierState>(casualty).unwrap().kill();
        world.spawn(FormationBundle {
            team: Team::Blue,
            ..Default::default()
        });

        let snapshot = Snapshot::from_world(&mut world, 42, 0.7);

        assert_eq!(snapshot.tick, 42);
        assert_eq!(snapshot.soldiers.len(), 2);
        assert_eq!(snapshot.formations.len(), 1);
        assert_eq!(snapshot.red_alive, 1);
        assert_eq!(snapshot.blue_dead, 1);
        assert_eq!(snapshot.blue_alive, 0);

        let dead = snapshot.soldiers.iter().find(|s| s.state == "Dead").unwrap();
        assert!(dead.officer);
        assert_eq!(dead.team, "Blue");
        assert_eq!(snapshot.formations[0].state, "Advancing");
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut world = World::new();
        world.spawn(SoldierBundle {
            team: Team::Red,
            ..Default::default()
        });

        let json = Snapshot::from_world(&mut world, 1, 0.0).to_json().unwrap();
        assert!(json.contains("\"soldiers\""));
        assert!(json.contains("Red"));
        assert!(json.contains("HeavyInfantry"));
    }
}
