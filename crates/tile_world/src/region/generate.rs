//! Region generation: heightmap, tiling, geometry.
//!
//! Runs on a worker with exclusive ownership of the region and reads
//! nothing but the terrain source, so independent regions generate
//! concurrently without coordination.

use bevy::math::IVec2;

use super::Region;
use crate::error::GenerateError;
use crate::geometry::GeometryBuffer;
use crate::streaming::CancelToken;
use crate::terrain::TerrainSource;
use crate::tile::{Side, Tile, TileKind};

impl Region {
  /// Fills the region from a terrain source.
  ///
  /// Checks `cancel` before each stage and before committing; a cancelled
  /// run leaves the region untouched.
  pub fn generate(
    &mut self,
    terrain: &dyn TerrainSource,
    cancel: &CancelToken,
  ) -> Result<(), GenerateError> {
    cancel.check()?;
    let heights = self.sample_heights(terrain);

    cancel.check()?;
    let mut tiles = self.fill_tiles(&heights, terrain);

    cancel.check()?;
    let (surface, collision) = self.build_geometry(&heights, &mut tiles);

    cancel.check()?;
    self.heights = heights;
    self.tiles = tiles;
    self.surface = surface;
    self.collision = collision;
    Ok(())
  }

  fn sample_heights(&self, terrain: &dyn TerrainSource) -> Vec<i32> {
    let first = self.origin().x - 1;
    (0..self.size().x + 2)
      .map(|i| terrain.column_height(first + i))
      .collect()
  }

  fn fill_tiles(&self, heights: &[i32], terrain: &dyn TerrainSource) -> Vec<Option<Tile>> {
    let size = self.size();
    let origin = self.origin();
    let mut tiles = vec![None; self.layout.area()];

    for x in 0..size.x {
      let ground = heights[(x + 1) as usize];
      if ground < origin.y + 1 {
        continue;
      }
      let dirt_depth = terrain.dirt_depth(origin.x + x);

      for y in 0..size.y {
        let global = y + origin.y + 1;
        if global > ground {
          break;
        }
        let kind = if global == ground {
          TileKind::Grass
        } else if ground - global < dirt_depth {
          TileKind::Dirt
        } else {
          TileKind::Rock
        };
        tiles[(y * size.x + x) as usize] = Some(Tile::new(kind, IVec2::new(x, y)));
      }
    }
    tiles
  }

  /// Surface quads for every tile, collision faces wherever the neighbor
  /// cell is above its column's ground. Padding samples answer for cells
  /// just outside the region.
  fn build_geometry(
    &self,
    heights: &[i32],
    tiles: &mut [Option<Tile>],
  ) -> (GeometryBuffer, GeometryBuffer) {
    let origin_y = self.origin().y;
    let mut surface = GeometryBuffer::surface();
    let mut collision = GeometryBuffer::collision();

    for tile in tiles.iter_mut().flatten() {
      tile.quad.surface = Some(surface.insert(&tile.quad.surface_primitive(tile.kind)));

      for side in Side::ALL {
        let neighbor = tile.quad.neighbor(side);
        let neighbor_height = neighbor.y + origin_y + 1;
        let neighbor_ground = heights[(neighbor.x + 1) as usize];
        if neighbor_height > neighbor_ground {
          tile.quad.edges[side.index()] = Some(collision.insert(&tile.quad.edge_primitive(side)));
        }
      }
    }
    (surface, collision)
  }
}
