//! Regions - the unit of streaming, generation and mesh ownership.
//!
//! A [`Region`] exclusively owns its tile grid and its two geometry
//! buffers. Other regions never touch them directly; cross-boundary edits
//! go through [`Region::reconcile_collision`] on the owning region.

mod edit;
mod generate;

use bevy::math::IVec2;
use bevy::mesh::Mesh;

use crate::coords::{ChunkId, ChunkLayout};
use crate::geometry::GeometryBuffer;
use crate::tile::Tile;

/// Meshes built from a region's buffers at its last finalization.
#[derive(Clone, Debug)]
pub struct RegionMeshes {
  pub surface: Mesh,
  pub collision: Mesh,
}

/// A fixed-size rectangle of tiles.
pub struct Region {
  id: ChunkId,
  layout: ChunkLayout,
  /// Ground height per column, with one padding column on each side:
  /// index `i` is world column `origin.x + i - 1`.
  heights: Vec<i32>,
  /// Row-major, `None` is air.
  tiles: Vec<Option<Tile>>,
  surface: GeometryBuffer,
  collision: GeometryBuffer,
  visible: bool,
  collidable: bool,
  meshes: Option<RegionMeshes>,
  mesh_revision: u64,
}

impl Region {
  /// Creates an empty, ungenerated region.
  pub fn new(id: ChunkId, layout: ChunkLayout) -> Self {
    Self {
      id,
      layout,
      heights: Vec::new(),
      tiles: vec![None; layout.area()],
      surface: GeometryBuffer::surface(),
      collision: GeometryBuffer::collision(),
      visible: false,
      collidable: false,
      meshes: None,
      mesh_revision: 0,
    }
  }

  pub fn id(&self) -> ChunkId {
    self.id
  }

  pub fn size(&self) -> IVec2 {
    self.layout.size
  }

  pub fn layout(&self) -> ChunkLayout {
    self.layout
  }

  /// World tile of the bottom-left cell.
  pub fn origin(&self) -> IVec2 {
    self.layout.origin(self.id)
  }

  /// Display name, e.g. `Region (1, -2)`.
  pub fn name(&self) -> String {
    format!("Region {}", self.id)
  }

  /// Column heights including the two padding samples. Empty until
  /// generated.
  pub fn heights(&self) -> &[i32] {
    &self.heights
  }

  /// Ground height of a local column (`-1..=size.x`).
  pub fn ground_height(&self, local_x: i32) -> Option<i32> {
    usize::try_from(local_x + 1)
      .ok()
      .and_then(|i| self.heights.get(i).copied())
  }

  pub(crate) fn index(&self, local: IVec2) -> Option<usize> {
    self
      .layout
      .contains_local(local)
      .then(|| (local.y * self.layout.size.x + local.x) as usize)
  }

  pub fn tile(&self, local: IVec2) -> Option<&Tile> {
    self.index(local).and_then(|i| self.tiles[i].as_ref())
  }

  /// Occupied cells with their local positions.
  pub fn tiles(&self) -> impl Iterator<Item = (IVec2, &Tile)> + '_ {
    let width = self.layout.size.x;
    self.tiles.iter().enumerate().filter_map(move |(i, tile)| {
      let i = i as i32;
      tile.as_ref().map(|t| (IVec2::new(i % width, i / width), t))
    })
  }

  pub fn surface_buffer(&self) -> &GeometryBuffer {
    &self.surface
  }

  pub fn collision_buffer(&self) -> &GeometryBuffer {
    &self.collision
  }

  pub fn is_visible(&self) -> bool {
    self.visible
  }

  pub fn set_visible(&mut self, visible: bool) {
    self.visible = visible;
  }

  pub fn is_collidable(&self) -> bool {
    self.collidable
  }

  pub fn set_collidable(&mut self, collidable: bool) {
    self.collidable = collidable;
  }

  /// Meshes from the last [`Self::finalize_meshes`].
  pub fn meshes(&self) -> Option<&RegionMeshes> {
    self.meshes.as_ref()
  }

  /// Bumped by every finalization.
  pub fn mesh_revision(&self) -> u64 {
    self.mesh_revision
  }

  /// Rebuilds both meshes from the current buffers.
  pub fn finalize_meshes(&mut self) {
    self.meshes = Some(RegionMeshes {
      surface: self.surface.to_mesh(),
      collision: self.collision.to_mesh(),
    });
    self.mesh_revision += 1;
  }

  /// Drops meshes and geometry. The region is unusable afterwards.
  pub fn release(&mut self) {
    self.meshes = None;
    self.surface.clear();
    self.collision.clear();
    self.tiles.clear();
    self.heights.clear();
    self.visible = false;
    self.collidable = false;
  }
}
