//! Formation system - formation-level movement and the state machine.
//!
//! A formation entity advances toward its target until any of its front-rank
//! soldiers comes within stop radius of an enemy; from then on it is Engaged
//! and holds position while the soldiers fight their own micro-battles.

use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::components::*;
use crate::constants::ENEMY_STOP_RADIUS;
use crate::spatial::{SpatialEntry, SpatialGrid};
use crate::systems::movement::DeltaTime;

/// System that runs the per-formation state machine.
///
/// Contact detection is existential: one front-rank soldier within
/// [`ENEMY_STOP_RADIUS`] of one living enemy flips the whole formation, and
/// the scan short-circuits per formation. The formation's team is inferred
/// from the first member discovered; the formation entity's own `Team` is
/// authoring metadata, not the source of record.
pub fn formation_system(
    dt: Res<DeltaTime>,
    grid: Res<SpatialGrid>,
    mut scratch: Local<Vec<SpatialEntry>>,
    mut formations: Query<(Entity, &mut Position, &mut Formation)>,
    members: Query<(Entity, &Position, &FormationMember, &Team, &SoldierState), Without<Formation>>,
) {
    // Front ranks of the formations that can still make first contact.
    let front_ranks: HashMap<Entity, i32> = formations
        .iter()
        .filter(|(_, _, formation)| formation.state == FormationState::Advancing)
        .map(|(entity, _, formation)| (entity, formation.front_rank))
        .collect();

    let mut formation_team: HashMap<Entity, u8> = HashMap::new();
    let mut in_contact: HashSet<Entity> = HashSet::new();

    for (soldier, pos, member, team, state) in members.iter() {
        let Some(&front_rank) = front_ranks.get(&member.formation) else {
            // Ownerless, or the formation is past Advancing.
            continue;
        };
        if state.is_dead() || state.is_routing() {
            continue;
        }

        let team_idx = *formation_team
            .entry(member.formation)
            .or_insert_with(|| team.index());

        if member.rank != front_rank || in_contact.contains(&member.formation) {
            continue;
        }

        grid.query_radius_into(pos.x, pos.y, ENEMY_STOP_RADIUS, &mut scratch);
        let radius_sq = ENEMY_STOP_RADIUS * ENEMY_STOP_RADIUS;
        for entry in scratch.iter() {
            if entry.entity == soldier || entry.team == team_idx {
                continue;
            }
            let dx = entry.x - pos.x;
            let dy = entry.y - pos.y;
            if dx * dx + dy * dy <= radius_sq {
                in_contact.insert(member.formation);
                break;
            }
        }
    }

    let delta = dt.0;
    for (entity, mut pos, mut formation) in formations.iter_mut() {
        match formation.state {
            FormationState::Advancing => {
                if in_contact.contains(&entity) {
                    formation.state = FormationState::Engaged;
                    debug!(formation = entity.index(), "front line made contact, formation engaged");
                    continue;
                }

                let to_target = formation.target_position - pos.to_vec2();
                if to_target.length() > 1.0 {
                    let dir = to_target.normalized();
                    pos.x += dir.x * formation.speed * delta;
                    pos.y += dir.y * formation.speed * delta;
                }
            }
            FormationState::Engaged => {
                // Holds position; soldiers handle their own micro-movement.
                // Detecting that the enemy has withdrawn would go here.
            }
            FormationState::Withdrawing => {
                // Declared but not yet driven by any transition.
            }
            FormationState::Broken => {
                // Formation no longer functions; soldiers act independently.
            }
        }
    }
}
