//! Morale system - the psychological side of the battle.
//!
//! Deaths ripple outward: allies who watch a man fall lose heart, enemies
//! take heart, and a soldier whose effective morale hits the floor breaks
//! and runs. Witnessing a nearby rout shakes the men around the runner.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::components::*;
use crate::constants::*;
use crate::spatial::{SpatialEntry, SpatialGrid};
use crate::systems::combat::DeathEvents;
use crate::systems::movement::DeltaTime;

/// System that applies morale shocks from this tick's deaths.
///
/// For every death, living soldiers within [`MORALE_EFFECT_RADIUS`]: same
/// team loses morale (more when the fallen was an officer), opposing team
/// recovers a little.
pub fn morale_shock_system(
    grid: Res<SpatialGrid>,
    mut deaths: ResMut<DeathEvents>,
    mut scratch: Local<Vec<SpatialEntry>>,
    mut soldiers: Query<(&mut Morale, &Team, &SoldierState), Without<Formation>>,
) {
    let radius_sq = MORALE_EFFECT_RADIUS * MORALE_EFFECT_RADIUS;
    for event in deaths.0.drain(..) {
        grid.query_radius_into(event.x, event.y, MORALE_EFFECT_RADIUS, &mut scratch);
        for entry in scratch.iter() {
            if entry.entity == event.entity {
                continue;
            }
            let dx = entry.x - event.x;
            let dy = entry.y - event.y;
            if dx * dx + dy * dy > radius_sq {
                continue;
            }
            let Ok((mut morale, team, state)) = soldiers.get_mut(entry.entity) else {
                continue;
            };
            if state.is_dead() {
                continue;
            }
            if *team == event.team {
                let mut hit = ALLY_DEATH_MORALE_HIT;
                if event.officer {
                    hit += OFFICER_DEATH_MORALE_HIT;
                }
                morale.decrease(hit);
            } else {
                morale.recover(ALLY_KILL_MORALE_BOOST);
            }
        }
    }
}

/// System that breaks soldiers whose effective morale has hit the floor,
/// then shakes their nearby teammates.
///
/// Effective morale is the current value plus the standing modifier, with a
/// bonus for soldiers currently holding the front rank of their formation.
pub fn rout_system(
    grid: Res<SpatialGrid>,
    mut scratch: Local<Vec<SpatialEntry>>,
    formations: Query<&Formation>,
    mut soldiers: Query<
        (
            Entity,
            &Position,
            &Team,
            &mut Morale,
            &mut SoldierState,
            Option<&FormationMember>,
        ),
        Without<Formation>,
    >,
) {
    let mut broke: Vec<(Entity, f32, f32, u8)> = Vec::new();

    for (entity, pos, team, morale, mut state, member) in soldiers.iter_mut() {
        if state.is_dead() || state.is_routing() {
            continue;
        }
        let mut effective = morale.value + morale.base_modifier;
        if let Some(member) = member {
            if let Ok(formation) = formations.get(member.formation) {
                if member.rank == formation.front_rank {
                    effective += FRONT_LINE_MORALE_BONUS;
                }
            }
        }
        if effective <= ROUT_THRESHOLD {
            *state = SoldierState::Routing;
            debug!(soldier = entity.index(), "morale broke, soldier routs");
            broke.push((entity, pos.x, pos.y, team.index()));
        }
    }

    // Watching a man run is its own shock. Cascades resolve on later ticks.
    let radius_sq = MORALE_EFFECT_RADIUS * MORALE_EFFECT_RADIUS;
    for (runner, x, y, team_idx) in broke {
        grid.query_radius_into(x, y, MORALE_EFFECT_RADIUS, &mut scratch);
        for entry in scratch.iter() {
            if entry.entity == runner || entry.team != team_idx {
                continue;
            }
            let dx = entry.x - x;
            let dy = entry.y - y;
            if dx * dx + dy * dy > radius_sq {
                continue;
            }
            let Ok((_, _, _, mut morale, state, _)) = soldiers.get_mut(entry.entity) else {
                continue;
            };
            if state.is_dead() || state.is_routing() {
                continue;
            }
            morale.decrease(NEARBY_ROUT_MORALE_HIT);
        }
    }
}

/// System that regenerates stamina for soldiers who are not fighting.
pub fn stamina_recovery_system(
    dt: Res<DeltaTime>,
    mut query: Query<(&mut Stats, &SoldierState)>,
) {
    for (mut stats, state) in query.iter_mut() {
        if state.is_dead() || state.opponent().is_some() {
            continue;
        }
        stats.recover_stamina(STAMINA_REGEN_RATE * dt.0);
    }
}
