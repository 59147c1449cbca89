//! Coordinate types and chunk addressing.
//!
//! Defines the coordinate system for the world:
//! - world tile position: absolute integer cell (`IVec2`)
//! - [`ChunkId`]: chunk grid position, derived by floor division
//! - local position: cell within a chunk (`IVec2`, `0..size`)
//!
//! One world unit equals one tile. Floating positions are floored before
//! any lookup, so a fractional position belongs to exactly one chunk.

use bevy::math::{IVec2, Vec2};

/// Position in the chunk grid.
///
/// Never stored independently of [`ChunkLayout::chunk_of`]; two positions
/// in the same chunk always produce the same id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId {
  pub x: i32,
  pub y: i32,
}

impl ChunkId {
  /// Creates a new chunk id.
  pub const fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  pub const fn as_ivec2(self) -> IVec2 {
    IVec2::new(self.x, self.y)
  }
}

impl From<IVec2> for ChunkId {
  fn from(v: IVec2) -> Self {
    Self::new(v.x, v.y)
  }
}

impl std::fmt::Display for ChunkId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "({}, {})", self.x, self.y)
  }
}

/// Chunk dimensions and the conversions that depend on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLayout {
  /// Width and height of a chunk in tiles.
  pub size: IVec2,
}

impl Default for ChunkLayout {
  fn default() -> Self {
    Self::new(IVec2::splat(16))
  }
}

impl ChunkLayout {
  /// Creates a layout. Both components must be positive.
  pub fn new(size: IVec2) -> Self {
    debug_assert!(size.x > 0 && size.y > 0, "chunk size must be positive");
    Self { size }
  }

  /// Floors a world position to the tile that contains it.
  #[inline]
  pub fn tile_of(pos: Vec2) -> IVec2 {
    pos.floor().as_ivec2()
  }

  /// Chunk containing a tile.
  ///
  /// Uses floor division: tile -1 lives in chunk -1, not chunk 0.
  #[inline]
  pub fn chunk_of_tile(&self, tile: IVec2) -> ChunkId {
    ChunkId::new(tile.x.div_euclid(self.size.x), tile.y.div_euclid(self.size.y))
  }

  /// Chunk containing a world position.
  #[inline]
  pub fn chunk_of(&self, pos: Vec2) -> ChunkId {
    self.chunk_of_tile(Self::tile_of(pos))
  }

  /// World tile of the chunk's bottom-left cell.
  #[inline]
  pub fn origin(&self, id: ChunkId) -> IVec2 {
    id.as_ivec2() * self.size
  }

  /// Geometric center of the chunk in world units.
  pub fn center(&self, id: ChunkId) -> Vec2 {
    self.origin(id).as_vec2() + self.size.as_vec2() * 0.5
  }

  /// `world - id * size`. Not clamped; callers pair it with the owning id.
  #[inline]
  pub fn world_to_local(&self, world: IVec2, id: ChunkId) -> IVec2 {
    world - self.origin(id)
  }

  /// Inverse of [`Self::world_to_local`].
  #[inline]
  pub fn local_to_world(&self, local: IVec2, id: ChunkId) -> IVec2 {
    local + self.origin(id)
  }

  /// Splits a world tile into its owning chunk and local offset.
  ///
  /// The local offset is always within `0..size`.
  pub fn split(&self, world: IVec2) -> (ChunkId, IVec2) {
    let id = self.chunk_of_tile(world);
    let local = IVec2::new(world.x.rem_euclid(self.size.x), world.y.rem_euclid(self.size.y));
    (id, local)
  }

  /// Returns true if a local position lies inside a chunk.
  #[inline]
  pub fn contains_local(&self, local: IVec2) -> bool {
    local.x >= 0 && local.y >= 0 && local.x < self.size.x && local.y < self.size.y
  }

  /// Number of cells in one chunk.
  pub fn area(&self) -> usize {
    (self.size.x * self.size.y) as usize
  }
}
