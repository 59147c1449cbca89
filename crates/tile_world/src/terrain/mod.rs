//! Terrain sources - the column data regions are generated from.
//!
//! A [`TerrainSource`] answers two questions per world column: where the
//! ground surface is, and how deep the dirt layer below it goes. Regions
//! turn those answers into tiles and geometry.

mod perlin;

pub use perlin::NoiseTerrain;

/// Column heights and soil depths for region generation.
///
/// The `Send + Sync` bounds enable generation on background threads.
/// Implementations must be deterministic: the same column always yields
/// the same answer, or regions disagree at their shared boundaries.
pub trait TerrainSource: Send + Sync {
  /// Ground height of a world column. The topmost filled cell has global
  /// height equal to this value (cell `y` has global height `y + 1`).
  fn column_height(&self, world_x: i32) -> i32;

  /// Number of dirt cells between the grass surface and rock.
  fn dirt_depth(&self, world_x: i32) -> i32;
}

/// Superflat terrain: the same height and dirt depth everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatTerrain {
  pub height: i32,
  pub dirt_depth: i32,
}

impl FlatTerrain {
  pub const fn new(height: i32, dirt_depth: i32) -> Self {
    Self { height, dirt_depth }
  }
}

impl TerrainSource for FlatTerrain {
  fn column_height(&self, _world_x: i32) -> i32 {
    self.height
  }

  fn dirt_depth(&self, _world_x: i32) -> i32 {
    self.dirt_depth
  }
}
