//! Combat system - melee resolution between soldiers.
//!
//! Each tick:
//! 1. Visual-cue flashes decay, independent of everything else.
//! 2. Every living, non-routing soldier advances his swing timer, picks the
//!    closest living enemy in reach, and attacks when the cooldown elapses.
//! 3. Attacks roll miss / light / heavy; defense reduces but never fully
//!    negates damage; soldiers at zero health die in place.
//!
//! The main pass is an exclusive system: resolving an attack mutates the
//! target mid-iteration (a soldier killed early in the pass must be invalid
//! as a target for everyone after), so it needs registry-style access rather
//! than a parallel query. The combat view is collected once and the RNG is
//! consumed in that order, which makes a seeded run reproducible.

use bevy_ecs::prelude::*;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::trace;

use crate::components::*;
use crate::constants::*;
use crate::spatial::{SpatialEntry, SpatialGrid};
use crate::systems::movement::DeltaTime;

/// Seedable random stream for attack rolls and cooldown jitter.
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

/// A soldier death recorded this tick, consumed by the morale system.
#[derive(Debug, Clone, Copy)]
pub struct DeathEvent {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
    pub team: Team,
    pub officer: bool,
}

/// Deaths accumulated during the combat pass, drained each tick.
#[derive(Resource, Default)]
pub struct DeathEvents(pub Vec<DeathEvent>);

/// System that decays attack/hit flashes. Runs just before the combat pass.
pub fn flash_decay_system(dt: Res<DeltaTime>, mut query: Query<&mut FlashEffect>) {
    for mut flash in query.iter_mut() {
        flash.decay(dt.0);
    }
}

/// System that processes melee combat for all soldiers.
pub fn combat_system(world: &mut World, mut scratch: Local<Vec<SpatialEntry>>) {
    let delta = world.resource::<DeltaTime>().0;

    let combatants: Vec<Entity> = world
        .query_filtered::<(Entity, &SoldierState), (With<Position>, With<Team>, With<Stats>)>()
        .iter(world)
        .filter(|(_, state)| !state.is_dead() && !state.is_routing())
        .map(|(entity, _)| entity)
        .collect();

    world.resource_scope(|world, grid: Mut<SpatialGrid>| {
        world.resource_scope(|world, mut rng: Mut<SimRng>| {
            for attacker in combatants {
                step_combatant(world, &grid, &mut rng.0, attacker, delta, &mut scratch);
            }
        });
    });
}

fn step_combatant(
    world: &mut World,
    grid: &SpatialGrid,
    rng: &mut SmallRng,
    attacker: Entity,
    delta: f32,
    scratch: &mut Vec<SpatialEntry>,
) {
    // State may have changed earlier in this pass.
    let Some(state) = world.get::<SoldierState>(attacker).copied() else {
        return;
    };
    let timer = match state {
        SoldierState::Dead | SoldierState::Routing => return,
        SoldierState::InCombat { timer, .. } => Some(timer + delta),
        SoldierState::Normal => None,
    };

    let Some(pos) = world.get::<Position>(attacker).copied() else {
        return;
    };
    let Some(team) = world.get::<Team>(attacker).copied() else {
        return;
    };

    match find_target(world, grid, attacker, &pos, team, scratch) {
        Some(target) => {
            // Entering combat samples a random initial cooldown so a whole
            // rank doesn't swing in lockstep.
            let mut timer = timer.unwrap_or_else(|| rng.gen_range(0.0..ATTACK_COOLDOWN));
            if timer >= ATTACK_COOLDOWN {
                perform_attack(world, rng, attacker, target);
                // Negative reset: the next swing needs slightly more than a
                // full cooldown. Intentional cadence jitter.
                timer = -rng.gen_range(0.0..ATTACK_COOLDOWN);
            }
            if let Some(mut state) = world.get_mut::<SoldierState>(attacker) {
                *state = SoldierState::InCombat {
                    opponent: target,
                    timer,
                };
            }
        }
        None => {
            // Nobody in reach: leave combat.
            if timer.is_some() {
                if let Some(mut state) = world.get_mut::<SoldierState>(attacker) {
                    *state = SoldierState::Normal;
                }
            }
        }
    }
}

/// Closest living enemy strictly within attack range. Equal distances keep
/// the first entry found, which is deterministic for a fixed rebuild order.
fn find_target(
    world: &World,
    grid: &SpatialGrid,
    attacker: Entity,
    pos: &Position,
    team: Team,
    scratch: &mut Vec<SpatialEntry>,
) -> Option<Entity> {
    grid.query_radius_into(pos.x, pos.y, ATTACK_RANGE, scratch);

    let mut best: Option<(Entity, f32)> = None;
    for entry in scratch.iter() {
        if entry.entity == attacker || entry.team == team.index() {
            continue;
        }
        // The grid is a tick-start snapshot: the entry may have died during
        // this pass, and positions have moved, so both are read fresh.
        let alive = world
            .get::<SoldierState>(entry.entity)
            .map_or(false, |s| s.is_alive());
        if !alive || world.get::<Stats>(entry.entity).is_none() {
            continue;
        }
        let Some(other_pos) = world.get::<Position>(entry.entity) else {
            continue;
        };
        let dist = pos.distance_to(other_pos);
        if dist <= ATTACK_RANGE && best.map_or(true, |(_, d)| dist < d) {
            best = Some((entry.entity, dist));
        }
    }
    best.map(|(entity, _)| entity)
}

fn perform_attack(world: &mut World, rng: &mut SmallRng, attacker: Entity, target: Entity) {
    let target_alive = world
        .get::<SoldierState>(target)
        .map_or(false, |s| s.is_alive());
    if !target_alive || world.get::<Stats>(target).is_none() {
        return;
    }

    // The swing shows regardless of whether it lands.
    if let Some(mut flash) = world.get_mut::<FlashEffect>(attacker) {
        *flash = FlashEffect::attack();
    }
    if let Some(mut stats) = world.get_mut::<Stats>(attacker) {
        stats.drain_stamina(BASE_ATTACK_STAMINA_COST);
    }

    let damage = roll_damage(rng);
    if damage <= 0.0 {
        return;
    }

    let mut died = false;
    if let Some(mut stats) = world.get_mut::<Stats>(target) {
        // Defense never fully negates a landed hit.
        let actual = (damage - stats.defense * 0.5).max(1.0);
        stats.damage(actual);
        died = !stats.is_alive();
    }
    if let Some(mut flash) = world.get_mut::<FlashEffect>(target) {
        *flash = FlashEffect::hit();
    }

    if died {
        handle_death(world, target);
    }
}

/// Roll one swing: miss, light, or heavy.
pub(crate) fn roll_damage(rng: &mut SmallRng) -> f32 {
    if rng.gen::<f32>() < MISS_CHANCE {
        return 0.0;
    }
    if rng.gen::<f32>() < HEAVY_HIT_CHANCE {
        HEAVY_DAMAGE
    } else {
        LIGHT_DAMAGE
    }
}

/// One-way death: clamp already happened in `Stats::damage`, here the status
/// flips and combat/rout/pursuit state is stripped so later systems skip the
/// corpse by status alone.
fn handle_death(world: &mut World, entity: Entity) {
    let newly_dead = world
        .get::<SoldierState>(entity)
        .map_or(false, |s| !s.is_dead());
    if !newly_dead {
        return;
    }

    if let Some(mut state) = world.get_mut::<SoldierState>(entity) {
        state.kill();
    }
    world.entity_mut(entity).remove::<Pursuing>();

    let officer = world.get::<Officer>(entity).is_some();
    let pos = world.get::<Position>(entity).copied();
    let team = world.get::<Team>(entity).copied();
    if let (Some(pos), Some(team)) = (pos, team) {
        trace!(soldier = entity.index(), ?team, "soldier fell");
        if let Some(mut deaths) = world.get_resource_mut::<DeathEvents>() {
            deaths.0.push(DeathEvent {
                entity,
                x: pos.x,
                y: pos.y,
                team,
                officer,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::rebuild_spatial_grid;

    const DT: f32 = 1.0 / 60.0;

    fn test_world(seed: u64) -> (World, Schedule) {
        let mut world = World::new();
        world.insert_resource(DeltaTime(DT));
        world.insert_resource(SpatialGrid::default());
        world.insert_resource(SimRng::seeded(seed));
        world.insert_resource(DeathEvents::default());
        let mut schedule = Schedule::default();
        schedule.add_systems((rebuild_spatial_grid, flash_decay_system, combat_system).chain());
        (world, schedule)
    }

    fn spawn_soldier(world: &mut World, team: Team, x: f32, y: f32) -> Entity {
        world
            .spawn(SoldierBundle {
                position: Position::new(x, y),
                team,
                ..Default::default()
            })
            .id()
    }

    #[test]
    fn engaging_samples_a_staggered_initial_cooldown() {
        let (mut world, mut schedule) = test_world(7);
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        let blue = spawn_soldier(&mut world, Team::Blue, 2.0, 0.0);

        schedule.run(&mut world);

        for entity in [red, blue] {
            match *world.get::<SoldierState>(entity).unwrap() {
                SoldierState::InCombat { opponent, timer } => {
                    assert!(timer >= 0.0 && timer < ATTACK_COOLDOWN);
                    assert_ne!(opponent, entity);
                }
                ref other => panic!("expected InCombat, got {:?}", other),
            }
            // The initial cooldown is strictly positive headroom: nobody
            // swings on the tick they engage.
            assert_eq!(world.get::<Stats>(entity).unwrap().health, 100.0);
        }
    }

    #[test]
    fn duel_runs_to_a_single_death_with_monotonic_health() {
        let (mut world, mut schedule) = test_world(42);
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        let blue = spawn_soldier(&mut world, Team::Blue, 2.0, 0.0);

        let mut last = [100.0f32, 100.0];
        let mut death_tick = None;
        for tick in 0..60 * 120 {
            schedule.run(&mut world);
            let healths = [
                world.get::<Stats>(red).unwrap().health,
                world.get::<Stats>(blue).unwrap().health,
            ];
            assert!(healths[0] <= last[0] && healths[1] <= last[1], "health must never rise");
            last = healths;

            let red_dead = world.get::<SoldierState>(red).unwrap().is_dead();
            let blue_dead = world.get::<SoldierState>(blue).unwrap().is_dead();
            if red_dead || blue_dead {
                death_tick = Some((tick, red_dead));
                break;
            }
        }

        let (_, red_died) = death_tick.expect("a two-minute duel should produce a death");
        let (dead, survivor) = if red_died { (red, blue) } else { (blue, red) };
        assert_eq!(world.get::<Stats>(dead).unwrap().health, 0.0);
        assert!(world.get::<SoldierState>(dead).unwrap().is_dead());
        assert!(world.get::<SoldierState>(survivor).unwrap().is_alive());

        // The survivor disengages once the corpse drops out of the grid,
        // and the corpse stays a corpse.
        for _ in 0..5 {
            schedule.run(&mut world);
        }
        assert_eq!(
            *world.get::<SoldierState>(survivor).unwrap(),
            SoldierState::Normal
        );
        assert!(world.get::<SoldierState>(dead).unwrap().is_dead());
        assert_eq!(world.get::<Stats>(dead).unwrap().health, 0.0);
    }

    #[test]
    fn disengages_when_no_enemy_in_reach() {
        let (mut world, mut schedule) = test_world(3);
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        let blue = spawn_soldier(&mut world, Team::Blue, 50.0, 0.0);
        *world.get_mut::<SoldierState>(red).unwrap() = SoldierState::InCombat {
            opponent: blue,
            timer: 0.2,
        };

        schedule.run(&mut world);

        assert_eq!(*world.get::<SoldierState>(red).unwrap(), SoldierState::Normal);
    }

    #[test]
    fn targets_closest_living_enemy_only() {
        let mut world = World::new();
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        let corpse = spawn_soldier(&mut world, Team::Blue, 1.0, 0.0);
        world.get_mut::<SoldierState>(corpse).unwrap().kill();
        let near = spawn_soldier(&mut world, Team::Blue, 3.0, 0.0);
        let far = spawn_soldier(&mut world, Team::Blue, 3.5, 0.0);

        // Tick-start snapshot: the corpse is still in the grid.
        let mut grid = SpatialGrid::default();
        for entity in [red, corpse, near, far] {
            let pos = *world.get::<Position>(entity).unwrap();
            let team = *world.get::<Team>(entity).unwrap();
            grid.insert(entity, pos.x, pos.y, team.index());
        }

        let mut scratch = Vec::new();
        let pos = *world.get::<Position>(red).unwrap();
        let target = find_target(&world, &grid, red, &pos, Team::Red, &mut scratch);
        assert_eq!(target, Some(near));
    }

    #[test]
    fn out_of_range_enemies_are_not_targets() {
        let mut world = World::new();
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        // In the 3x3 cell neighborhood superset, but beyond attack range.
        let blue = spawn_soldier(&mut world, Team::Blue, ATTACK_RANGE + 1.0, 0.0);

        let mut grid = SpatialGrid::default();
        for entity in [red, blue] {
            let pos = *world.get::<Position>(entity).unwrap();
            let team = *world.get::<Team>(entity).unwrap();
            grid.insert(entity, pos.x, pos.y, team.index());
        }

        let mut scratch = Vec::new();
        let pos = *world.get::<Position>(red).unwrap();
        assert_eq!(
            find_target(&world, &grid, red, &pos, Team::Red, &mut scratch),
            None
        );
    }

    #[test]
    fn landed_damage_never_drops_below_one() {
        let mut world = World::new();
        world.insert_resource(DeathEvents::default());
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        let blue = spawn_soldier(&mut world, Team::Blue, 1.0, 0.0);
        world.get_mut::<Stats>(blue).unwrap().defense = 1000.0;

        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..40 {
            perform_attack(&mut world, &mut rng, red, blue);
        }

        let health = world.get::<Stats>(blue).unwrap().health;
        assert!(health < 100.0, "some swings out of 40 must land");
        // Every landed hit was floored to exactly 1 damage.
        assert_eq!((100.0 - health).fract(), 0.0);
    }

    #[test]
    fn miss_and_heavy_rates_converge_to_the_constants() {
        let mut rng = SmallRng::seed_from_u64(42);
        let rolls = 20_000;
        let mut misses = 0u32;
        let mut heavies = 0u32;
        for _ in 0..rolls {
            match roll_damage(&mut rng) {
                d if d == 0.0 => misses += 1,
                d if d == HEAVY_DAMAGE => heavies += 1,
                d => assert_eq!(d, LIGHT_DAMAGE),
            }
        }

        let miss_rate = misses as f32 / rolls as f32;
        assert!(
            (miss_rate - MISS_CHANCE).abs() < 0.02,
            "observed miss rate {miss_rate}"
        );
        let heavy_rate = heavies as f32 / (rolls - misses) as f32;
        assert!(
            (heavy_rate - HEAVY_HIT_CHANCE).abs() < 0.02,
            "observed heavy rate {heavy_rate}"
        );
    }

    #[test]
    fn death_is_terminal_and_reported_once() {
        let mut world = World::new();
        world.insert_resource(DeathEvents::default());
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        let blue = spawn_soldier(&mut world, Team::Blue, 1.0, 0.0);
        world.get_mut::<Stats>(blue).unwrap().health = 1.0;
        world.get_mut::<Stats>(blue).unwrap().defense = 0.0;
        world.entity_mut(blue).insert(Pursuing { target: red });

        let mut rng = SmallRng::seed_from_u64(5);
        while world.get::<SoldierState>(blue).unwrap().is_alive() {
            perform_attack(&mut world, &mut rng, red, blue);
        }

        assert_eq!(world.get::<Stats>(blue).unwrap().health, 0.0);
        assert!(world.get::<Pursuing>(blue).is_none());
        assert_eq!(world.resource::<DeathEvents>().0.len(), 1);

        // Striking the corpse again has no effect.
        perform_attack(&mut world, &mut rng, red, blue);
        assert_eq!(world.get::<Stats>(blue).unwrap().health, 0.0);
        assert_eq!(world.resource::<DeathEvents>().0.len(), 1);
    }

    #[test]
    fn swings_flash_both_sides_and_cost_stamina() {
        let mut world = World::new();
        world.insert_resource(DeathEvents::default());
        let red = spawn_soldier(&mut world, Team::Red, 0.0, 0.0);
        let blue = spawn_soldier(&mut world, Team::Blue, 1.0, 0.0);

        let mut rng = SmallRng::seed_from_u64(9);
        while world.get::<Stats>(blue).unwrap().health == 100.0 {
            perform_attack(&mut world, &mut rng, red, blue);
        }

        assert_eq!(world.get::<FlashEffect>(red).unwrap().kind, FlashKind::Attack);
        assert_eq!(world.get::<FlashEffect>(blue).unwrap().kind, FlashKind::Hit);
        assert!(world.get::<Stats>(red).unwrap().stamina < 100.0);
    }
}
