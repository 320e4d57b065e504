//! Public API for the simulation.
//!
//! `SimWorld` owns the ECS world and the tick schedule, and is the interface
//! an external driver loop talks to: feed it frame deltas, author scenarios
//! before the battle starts, and pull snapshots for rendering.
//!
//! ## Fixed timestep
//!
//! The simulation runs at a fixed 60 Hz internally. `step(dt)` accumulates
//! wall-clock time and drains it in fixed-size updates, capping the frame
//! delta so a stalled frame cannot trigger a catch-up spiral. Systems run
//! strictly sequentially within a tick: grid rebuild, formations, movement,
//! combat, morale.

use bevy_ecs::prelude::*;
use rand::Rng;
use tracing::info;

use crate::components::*;
use crate::constants::*;
use crate::spatial::{rebuild_spatial_grid, SpatialGrid};
use crate::systems::*;
use crate::world::Snapshot;

/// Simulation configuration.
#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    /// Fixed timestep in seconds.
    pub fixed_timestep: f32,
    /// Spatial grid cell size in world units.
    pub cell_size: f32,
    /// Seed for attack rolls, cooldown jitter, and spawn jitter.
    pub seed: u64,
    /// Cap applied to incoming frame deltas.
    pub max_frame_time: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: FIXED_TIMESTEP,
            cell_size: SPATIAL_CELL_SIZE,
            seed: 1,
            max_frame_time: MAX_FRAME_TIME,
        }
    }
}

/// The main simulation world container.
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for the fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Self {
        let mut world = World::new();

        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SpatialGrid::new(config.cell_size));
        world.insert_resource(SimRng::seeded(config.seed));
        world.insert_resource(DeathEvents::default());
        world.insert_resource(config);

        // The tick order is load-bearing; see systems/mod.rs.
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                rebuild_spatial_grid,
                formation_system,
                movement_system,
                flash_decay_system,
                combat_system,
                morale_shock_system,
                rout_system,
                stamina_recovery_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Step the simulation forward by `dt` seconds of wall-clock time.
    pub fn step(&mut self, dt: f32) {
        let (fixed_dt, max_frame) = self
            .world
            .get_resource::<SimConfig>()
            .map(|c| (c.fixed_timestep, c.max_frame_time))
            .unwrap_or((FIXED_TIMESTEP, MAX_FRAME_TIME));

        self.time_accumulator += dt.min(max_frame);

        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }

        self.schedule.run(&mut self.world);

        self.tick += 1;
        self.time += dt;
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time in seconds.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    // ------------------------------------------------------------------
    // Scenario authoring
    // ------------------------------------------------------------------

    /// Spawn a formation entity and a `rows x cols` block of soldiers
    /// marching with it. Rank 0 is the front of the block along `facing`.
    /// Soldiers get a little positional jitter so lines read as human, and
    /// a sprinkling of officers through the ranks.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_formation_block(
        &mut self,
        team: Team,
        center_x: f32,
        center_y: f32,
        rows: i32,
        cols: i32,
        spacing: f32,
        facing: (f32, f32),
        target: (f32, f32),
    ) -> Entity {
        let mut facing = Vec2::new(facing.0, facing.1).normalized();
        if facing == Vec2::ZERO {
            facing = Vec2::new(0.0, 1.0);
        }

        let formation = Formation::new(Vec2::new(target.0, target.1), facing, HEAVY_INFANTRY_SPEED);
        let center = Vec2::new(center_x, center_y);
        let formation_entity = self
            .world
            .spawn(FormationBundle {
                position: Position::new(center_x, center_y),
                team,
                formation,
            })
            .id();

        let half_rows = (rows - 1) as f32 * 0.5;
        let half_cols = (cols - 1) as f32 * 0.5;

        for rank in 0..rows {
            for file in 0..cols {
                let offset = Vec2::new(
                    (file as f32 - half_cols) * spacing,
                    (half_rows - rank as f32) * spacing,
                );
                let slot = formation.slot_position(center, offset);
                let (jx, jy) = {
                    let mut rng = self.world.resource_mut::<SimRng>();
                    (rng.0.gen_range(-0.3..0.3), rng.0.gen_range(-0.3..0.3))
                };

                let mut soldier = self.world.spawn((
                    SoldierBundle {
                        position: Position::new(slot.x + jx, slot.y + jy),
                        team,
                        ..Default::default()
                    },
                    FormationMember::new(formation_entity, offset, rank, file),
                ));
                if (rank * cols + file) % 50 == 25 {
                    soldier.insert(Officer::new(1));
                }
            }
        }

        info!(rows, cols, ?team, "spawned formation block");
        formation_entity
    }

    /// Spawn a single free soldier, optionally with a movement target.
    pub fn spawn_soldier(
        &mut self,
        team: Team,
        x: f32,
        y: f32,
        unit_type: UnitType,
        target: Option<(f32, f32)>,
    ) -> Entity {
        let stats = Stats {
            speed: unit_type.base_speed(),
            ..Default::default()
        };

        let mut soldier = self.world.spawn(SoldierBundle {
            position: Position::new(x, y),
            team,
            unit_type,
            stats,
            ..Default::default()
        });
        if let Some((tx, ty)) = target {
            soldier.insert(MovementTarget::new(tx, ty));
        }
        soldier.id()
    }

    // ------------------------------------------------------------------
    // Direct access
    // ------------------------------------------------------------------

    /// Get the spatial grid (for debugging/visualization).
    pub fn spatial_grid(&self) -> Option<&SpatialGrid> {
        self.world.get_resource::<SpatialGrid>()
    }

    /// Get direct access to the ECS world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
