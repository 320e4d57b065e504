//! Movement system - per-soldier steering and position integration.
//!
//! Soldiers are partitioned into exactly one movement mode per tick, in
//! priority order: dead and fighting soldiers do not move at all, routing
//! soldiers flee, formation members steer for their slot in the line, and
//! free units seek their movement target. Anything else stands still.
//!
//! The system runs in three phases, the shape the combat system uses for its
//! gather/apply split: a gather pass resolves each soldier's mode against
//! the ECS, a compute pass turns modes into velocities reading only the
//! spatial grid, and an apply pass writes velocities and integrates
//! positions. The compute pass is pure per-soldier work; with the
//! `parallel` feature it runs on rayon.

use bevy_ecs::prelude::*;

use crate::components::*;
use crate::constants::*;
use crate::spatial::{SpatialEntry, SpatialGrid};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Movement mode resolved for one soldier during the gather phase.
#[derive(Clone, Copy)]
enum MoveMode {
    /// Routing: run from everything on the other team.
    Flee,
    /// Steer for the formation slot, hold the line on contact.
    InFormation {
        slot: Vec2,
        facing: Vec2,
        formation_state: FormationState,
    },
    /// Free unit seeking its movement target.
    Seek { target: Vec2 },
}

struct MoveJob {
    entity: Entity,
    position: Vec2,
    team: Team,
    speed: f32,
    mode: MoveMode,
}

pub fn movement_system(
    dt: Res<DeltaTime>,
    grid: Res<SpatialGrid>,
    mut scratch: Local<Vec<SpatialEntry>>,
    mut soldiers: Query<
        (
            Entity,
            &mut Position,
            &mut Velocity,
            &Team,
            &UnitType,
            &SoldierState,
            Option<&FormationMember>,
            Option<&MovementTarget>,
        ),
        Without<Formation>,
    >,
    formations: Query<(&Position, &Formation)>,
) {
    // Gather: resolve each soldier's movement mode. A member whose formation
    // entity no longer resolves is ownerless and falls back to free-unit
    // movement (or stands still).
    let jobs: Vec<MoveJob> = soldiers
        .iter()
        .filter_map(|(entity, pos, _, team, unit_type, state, member, target)| {
            let mode = match *state {
                SoldierState::Dead | SoldierState::InCombat { .. } => return None,
                SoldierState::Routing => MoveMode::Flee,
                SoldierState::Normal => {
                    let resolved = member.and_then(|m| {
                        formations.get(m.formation).ok().map(|(fpos, formation)| {
                            MoveMode::InFormation {
                                slot: formation.slot_position(fpos.to_vec2(), m.local_offset),
                                facing: formation.facing,
                                formation_state: formation.state,
                            }
                        })
                    });
                    match resolved {
                        Some(mode) => mode,
                        None => match target.filter(|t| t.has_target) {
                            Some(t) => MoveMode::Seek { target: t.position },
                            None => return None,
                        },
                    }
                }
            };
            Some(MoveJob {
                entity,
                position: pos.to_vec2(),
                team: *team,
                speed: unit_type.base_speed(),
                mode,
            })
        })
        .collect();

    // Compute: pure per-soldier steering against the read-only grid.
    #[cfg(not(feature = "parallel"))]
    let moves: Vec<(Entity, Vec2)> = {
        let buf = &mut *scratch;
        jobs.iter()
            .map(|job| (job.entity, compute_velocity(job, &grid, buf)))
            .collect()
    };

    #[cfg(feature = "parallel")]
    let moves: Vec<(Entity, Vec2)> = {
        scratch.clear(); // buffers are per-thread below
        let grid: &SpatialGrid = &grid;
        jobs.par_iter()
            .map_init(Vec::new, |buf, job| (job.entity, compute_velocity(job, grid, buf)))
            .collect()
    };

    // Apply: write velocities and integrate.
    let delta = dt.0;
    for (entity, vel) in moves {
        if let Ok((_, mut pos, mut velocity, ..)) = soldiers.get_mut(entity) {
            *velocity = Velocity::from_vec2(vel);
            pos.x += vel.x * delta;
            pos.y += vel.y * delta;
        }
    }
}

fn compute_velocity(job: &MoveJob, grid: &SpatialGrid, scratch: &mut Vec<SpatialEntry>) -> Vec2 {
    match job.mode {
        MoveMode::Flee => flee_velocity(job, grid, scratch),
        MoveMode::InFormation {
            slot,
            facing,
            formation_state,
        } => formation_velocity(job, slot, facing, formation_state, grid, scratch),
        MoveMode::Seek { target } => seek_velocity(job, target, grid, scratch),
    }
}

/// Run from every living enemy within morale radius, nearer enemies
/// dominating the direction. With nobody in sight the soldier still runs,
/// along his team's fallback axis, so a rout never stalls.
fn flee_velocity(job: &MoveJob, grid: &SpatialGrid, scratch: &mut Vec<SpatialEntry>) -> Vec2 {
    grid.query_radius_into(job.position.x, job.position.y, MORALE_EFFECT_RADIUS, scratch);

    let mut away = Vec2::ZERO;
    let mut enemy_count = 0;
    for entry in scratch.iter() {
        if entry.entity == job.entity || entry.team == job.team.index() {
            continue;
        }
        let dx = job.position.x - entry.x;
        let dy = job.position.y - entry.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 0.1 || dist > MORALE_EFFECT_RADIUS {
            continue;
        }
        // Weight by inverse distance: closer enemies are scarier.
        let weight = 1.0 / dist;
        away += Vec2::new(dx, dy) * weight;
        enemy_count += 1;
    }

    if enemy_count == 0 {
        away = job.team.flee_axis();
    }

    away.normalized() * (job.speed * ROUT_SPEED_MULT)
}

/// Enemy and ally repulsion shared by formation members and free units.
/// Returns the two accumulated pushes and whether an enemy sits inside the
/// stop radius.
fn accumulate_pushes(
    job: &MoveJob,
    grid: &SpatialGrid,
    scratch: &mut Vec<SpatialEntry>,
) -> (Vec2, Vec2, bool) {
    let radius = ENEMY_STOP_RADIUS.max(ALLY_SEPARATION_RADIUS);
    grid.query_radius_into(job.position.x, job.position.y, radius, scratch);

    let mut enemy_push = Vec2::ZERO;
    let mut ally_push = Vec2::ZERO;
    let mut enemy_contact = false;

    for entry in scratch.iter() {
        if entry.entity == job.entity {
            continue;
        }
        let dx = job.position.x - entry.x;
        let dy = job.position.y - entry.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < 1e-4 {
            continue;
        }

        if entry.team != job.team.index() {
            if dist <= ENEMY_STOP_RADIUS {
                enemy_contact = true;
                let strength = (ENEMY_STOP_RADIUS - dist) / ENEMY_STOP_RADIUS;
                enemy_push += Vec2::new(dx / dist, dy / dist) * (strength * 2.0);
            }
        } else if dist <= ALLY_SEPARATION_RADIUS {
            let strength = (ALLY_SEPARATION_RADIUS - dist) / ALLY_SEPARATION_RADIUS;
            ally_push += Vec2::new(dx / dist, dy / dist) * strength;
        }
    }

    (enemy_push, ally_push, enemy_contact)
}

/// True when a living ally already stands in the slot one spacing ahead.
fn ally_holds_slot_ahead(
    job: &MoveJob,
    facing: Vec2,
    grid: &SpatialGrid,
    scratch: &mut Vec<SpatialEntry>,
) -> bool {
    let ahead = job.position + facing * FORMATION_SPACING;
    grid.query_nearby_into(ahead.x, ahead.y, scratch);

    let radius_sq = GAP_CHECK_RADIUS * GAP_CHECK_RADIUS;
    scratch.iter().any(|entry| {
        entry.entity != job.entity && entry.team == job.team.index() && {
            let dx = entry.x - ahead.x;
            let dy = entry.y - ahead.y;
            dx * dx + dy * dy <= radius_sq
        }
    })
}

fn formation_velocity(
    job: &MoveJob,
    slot: Vec2,
    facing: Vec2,
    formation_state: FormationState,
    grid: &SpatialGrid,
    scratch: &mut Vec<SpatialEntry>,
) -> Vec2 {
    let (enemy_push, ally_push, enemy_contact) = accumulate_pushes(job, grid, scratch);

    let goal = if formation_state == FormationState::Advancing && !enemy_contact {
        // Ease into the slot instead of overshooting and oscillating.
        let to_slot = slot - job.position;
        let urgency = (to_slot.length() / FORMATION_SPACING).min(1.0);
        to_slot.normalized() * (job.speed * urgency)
    } else if formation_state == FormationState::Engaged || enemy_contact {
        if !enemy_contact && !ally_holds_slot_ahead(job, facing, grid, scratch) {
            // The line self-heals: step forward into the gap a fallen or
            // displaced front-line soldier left.
            facing * (job.speed * 0.5)
        } else {
            // Tighten ranks without shoving through allies.
            (slot - job.position).normalized() * (job.speed * 0.3)
        }
    } else {
        // Withdrawing/Broken formations issue no goal yet.
        Vec2::ZERO
    };

    let vel = goal + enemy_push * (job.speed * 1.5) + ally_push * ALLY_SEPARATION_STRENGTH;
    vel.clamp_length(job.speed)
}

fn seek_velocity(
    job: &MoveJob,
    target: Vec2,
    grid: &SpatialGrid,
    scratch: &mut Vec<SpatialEntry>,
) -> Vec2 {
    let (enemy_push, ally_push, enemy_contact) = accumulate_pushes(job, grid, scratch);

    let goal = if enemy_contact {
        Vec2::ZERO
    } else {
        let to_target = target - job.position;
        if to_target.length() > MELEE_RANGE {
            to_target.normalized() * job.speed
        } else {
            Vec2::ZERO
        }
    };

    let vel = goal + enemy_push * (job.speed * 1.5) + ally_push * ALLY_SEPARATION_STRENGTH;
    vel.clamp_length(job.speed)
}
