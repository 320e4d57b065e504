//! Spatial partitioning for efficient neighbor queries.
//!
//! A uniform grid over quantized positions, rebuilt from scratch every tick
//! from all living, non-formation entities. Queries return the entities in
//! the cells overlapping the request; `query_radius` deliberately does NOT
//! distance-filter - it returns the square bounding-box superset and callers
//! filter by distance. The grid is read-only for the rest of the tick once
//! rebuilt.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::{Formation, Position, SoldierState, Team};

/// Entry in a spatial cell. Carries enough of the owner's state (position,
/// team) that most callers never have to touch the ECS for neighbors.
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
    /// 0 = Red, 1 = Blue.
    pub team: u8,
}

/// Grid-based spatial index.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    len: usize,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(crate::constants::SPATIAL_CELL_SIZE)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    fn cell_coord(&self, v: f32) -> i32 {
        (v * self.inv_cell_size).floor() as i32
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (self.cell_coord(x), self.cell_coord(y))
    }

    /// Drop all entries. Called at the start of every tick before the
    /// rebuild; bucket allocations are kept.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.len = 0;
    }

    /// Place an entity into the cell covering its position. There is no
    /// removal; stale entries are shed by the per-tick rebuild.
    pub fn insert(&mut self, entity: Entity, x: f32, y: f32, team: u8) {
        let cell = self.world_to_cell(x, y);
        self.cells
            .entry(cell)
            .or_default()
            .push(SpatialEntry { entity, x, y, team });
        self.len += 1;
    }

    /// Total entries currently in the grid.
    pub fn total_count(&self) -> usize {
        self.len
    }

    /// Collect every entity in the cells overlapped by the given circle into
    /// `out`. This is the bounding-box superset: entries up to a cell
    /// diagonal outside the radius are included and the caller filters by
    /// distance.
    pub fn query_radius_into(&self, x: f32, y: f32, radius: f32, out: &mut Vec<SpatialEntry>) {
        out.clear();

        let min_x = self.cell_coord(x - radius);
        let max_x = self.cell_coord(x + radius);
        let min_y = self.cell_coord(y - radius);
        let max_y = self.cell_coord(y + radius);

        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }

    /// Allocating convenience wrapper around [`query_radius_into`].
    ///
    /// [`query_radius_into`]: SpatialGrid::query_radius_into
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let mut out = Vec::new();
        self.query_radius_into(x, y, radius, &mut out);
        out
    }

    /// Collect the 3x3 cell neighborhood around a point, without radius
    /// filtering. Cheap short-range variant for checks within one cell size.
    pub fn query_nearby_into(&self, x: f32, y: f32, out: &mut Vec<SpatialEntry>) {
        out.clear();

        let (cell_x, cell_y) = self.world_to_cell(x, y);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cell_x + dx, cell_y + dy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }

    /// Allocating convenience wrapper around [`query_nearby_into`].
    ///
    /// [`query_nearby_into`]: SpatialGrid::query_nearby_into
    pub fn query_nearby(&self, x: f32, y: f32) -> Vec<SpatialEntry> {
        let mut out = Vec::new();
        self.query_nearby_into(x, y, &mut out);
        out
    }
}

/// System that rebuilds the spatial grid each tick. Runs before everything
/// else; dead soldiers and formation entities are left out, so every entry
/// is a living combatant.
pub fn rebuild_spatial_grid(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &Position, &Team, &SoldierState), Without<Formation>>,
) {
    grid.clear();

    for (entity, pos, team, state) in query.iter() {
        if state.is_dead() {
            continue;
        }
        grid.insert(entity, pos.x, pos.y, team.index());
    }
}
