//! Tile queries and edits in world coordinates.
//!
//! An edit changes one cell, then reconciles the collision faces of that
//! cell and its four neighbors. Each reconciliation runs on the region that
//! owns the cell, which may be a neighbor region. Only regions whose
//! buffers changed get their meshes rebuilt.
//!
//! A region generates from terrain samples alone, so once it is ready its
//! boundary is reconciled again against neighbors that may have been edited
//! in the meantime.

use std::collections::HashSet;

use bevy::log::debug;
use bevy::math::{IVec2, Vec2};

use super::TileWorld;
use crate::coords::{ChunkId, ChunkLayout};
use crate::error::EditError;
use crate::tile::{Side, Tile, TileKind};

impl TileWorld {
  /// Tile at a world position, floored to its cell.
  pub fn tile_at(&self, pos: Vec2) -> Option<&Tile> {
    self.tile_at_cell(ChunkLayout::tile_of(pos))
  }

  /// Tile at a world cell. Only generated regions answer.
  pub fn tile_at_cell(&self, cell: IVec2) -> Option<&Tile> {
    let (id, local) = self.layout().split(cell);
    self.streaming.ready_region(id)?.tile(local)
  }

  /// Places a tile, or changes the kind of the tile already there.
  pub fn place_tile(&mut self, pos: Vec2, kind: TileKind) -> Result<(), EditError> {
    self.place_tile_at_cell(ChunkLayout::tile_of(pos), kind)
  }

  pub fn place_tile_at_cell(&mut self, cell: IVec2, kind: TileKind) -> Result<(), EditError> {
    let (id, local) = self.layout().split(cell);
    self.streaming.ready_region_mut(id)?.set_tile(local, kind);

    let mut touched = HashSet::from([id]);
    self.reconcile_around(cell, &mut touched);
    self.finalize(touched);
    Ok(())
  }

  /// Removes the tile at a world position and returns its kind.
  ///
  /// `Ok(None)` when the cell was already empty.
  pub fn remove_tile(&mut self, pos: Vec2) -> Result<Option<TileKind>, EditError> {
    self.remove_tile_at_cell(ChunkLayout::tile_of(pos))
  }

  pub fn remove_tile_at_cell(&mut self, cell: IVec2) -> Result<Option<TileKind>, EditError> {
    let (id, local) = self.layout().split(cell);
    let Some(tile) = self.streaming.ready_region_mut(id)?.take_tile(local) else {
      return Ok(None);
    };

    let mut touched = HashSet::from([id]);
    self.reconcile_around(cell, &mut touched);
    self.finalize(touched);
    Ok(Some(tile.kind))
  }

  /// Turns collision participation of a tile on or off.
  ///
  /// A non-colliding tile owns no collision faces and does not block its
  /// neighbors' faces. No-op on empty cells.
  pub fn set_tile_collision(&mut self, pos: Vec2, collides: bool) -> Result<(), EditError> {
    let cell = ChunkLayout::tile_of(pos);
    let (id, local) = self.layout().split(cell);
    if !self.streaming.ready_region_mut(id)?.set_collides(local, collides) {
      return Ok(());
    }

    let mut touched = HashSet::from([id]);
    self.reconcile_around(cell, &mut touched);
    self.finalize(touched);
    Ok(())
  }

  /// Whether a cell blocks the collision face of the cell next to it.
  ///
  /// Cells in regions that are not generated count as open.
  fn blocks(&self, cell: IVec2) -> bool {
    self.tile_at_cell(cell).is_some_and(|tile| tile.collides)
  }

  fn is_ready_cell(&self, cell: IVec2) -> bool {
    let id = self.layout().chunk_of_tile(cell);
    self.streaming.ready_region(id).is_some()
  }

  /// Reconciles both sides of every seam between a freshly generated
  /// region and its generated neighbors.
  pub(crate) fn stitch_region(&mut self, id: ChunkId) {
    if self.streaming.ready_region(id).is_none() {
      return;
    }
    let layout = self.layout();
    let origin = layout.origin(id);
    let mut touched = HashSet::new();

    for side in Side::ALL {
      let neighbor = ChunkId::from(id.as_ivec2() + side.offset());
      if self.streaming.ready_region(neighbor).is_none() {
        continue;
      }
      for local in seam(layout.size, side) {
        let inner = origin + local;
        self.reconcile_cell(inner, Faces::KeepUnloaded, &mut touched);
        self.reconcile_cell(inner + side.offset(), Faces::KeepUnloaded, &mut touched);
      }
    }
    self.finalize(touched);
  }

  /// Reconciles a cell and its four neighbors.
  fn reconcile_around(&mut self, cell: IVec2, touched: &mut HashSet<ChunkId>) {
    self.reconcile_cell(cell, Faces::OpenUnloaded, touched);
    for side in Side::ALL {
      self.reconcile_cell(cell + side.offset(), Faces::OpenUnloaded, touched);
    }
  }

  /// Runs the owning region's reconciliation for one cell.
  fn reconcile_cell(&mut self, cell: IVec2, faces: Faces, touched: &mut HashSet<ChunkId>) {
    let Some(tile) = self.tile_at_cell(cell) else {
      return;
    };
    let exposed = Side::ALL.map(|side| {
      let next = cell + side.offset();
      if faces == Faces::KeepUnloaded && !self.is_ready_cell(next) {
        tile.quad.edge(side).is_some()
      } else {
        !self.blocks(next)
      }
    });
    let (id, local) = self.layout().split(cell);
    let Ok(region) = self.streaming.ready_region_mut(id) else {
      return;
    };
    if region.reconcile_collision(local, exposed) {
      touched.insert(id);
    }
  }

  /// Rebuilds meshes of every touched region.
  fn finalize(&mut self, touched: HashSet<ChunkId>) {
    if touched.is_empty() {
      return;
    }
    debug!("Rebuilding meshes of {} regions", touched.len());
    for id in touched {
      if let Ok(region) = self.streaming.ready_region_mut(id) {
        region.finalize_meshes();
        self.streaming.note_mesh_finalized(id);
      }
    }
  }
}

/// How faces toward cells of unready regions are treated.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Faces {
  /// Unready neighbors count as empty.
  OpenUnloaded,
  /// Faces toward unready neighbors are left as they are.
  KeepUnloaded,
}

/// Local cells of a region's boundary row or column on `side`.
fn seam(size: IVec2, side: Side) -> impl Iterator<Item = IVec2> {
  let (start, step, len) = match side {
    Side::Up => (IVec2::new(0, size.y - 1), IVec2::X, size.x),
    Side::Down => (IVec2::ZERO, IVec2::X, size.x),
    Side::Right => (IVec2::new(size.x - 1, 0), IVec2::Y, size.y),
    Side::Left => (IVec2::ZERO, IVec2::Y, size.y),
  };
  (0..len).map(move |i| start + step * i)
}
