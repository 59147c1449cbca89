//! Region-local edit entry points.
//!
//! These only touch the region's own grid and buffers. Deciding which
//! neighbors block a tile's sides needs the surrounding regions, so that
//! lookup is done by [`crate::TileWorld`] and handed in as plain flags.

use bevy::log::warn;
use bevy::math::IVec2;

use super::Region;
use crate::tile::{Side, Tile, TileKind};

impl Region {
  /// Places a tile or changes an existing tile's kind, and writes its
  /// surface quad (reusing the tile's slot when it has one).
  ///
  /// Collision faces are left alone; reconcile afterwards. Returns the
  /// previous kind.
  pub fn set_tile(&mut self, local: IVec2, kind: TileKind) -> Option<TileKind> {
    let Some(index) = self.index(local) else {
      warn!("set_tile outside region {}: {}", self.id, local);
      return None;
    };

    let previous = self.tiles[index].as_ref().map(|t| t.kind);
    let tile = self.tiles[index].get_or_insert_with(|| Tile::new(kind, local));
    tile.kind = kind;

    let primitive = tile.quad.surface_primitive(kind);
    match tile.quad.surface {
      Some(slot) => self.surface.write(slot, &primitive),
      None => tile.quad.surface = Some(self.surface.insert(&primitive)),
    }
    previous
  }

  /// Removes a tile, freeing its surface quad and every collision face.
  ///
  /// The returned tile no longer references any slot.
  pub fn take_tile(&mut self, local: IVec2) -> Option<Tile> {
    let index = self.index(local)?;
    let mut tile = self.tiles[index].take()?;

    if let Some(slot) = tile.quad.surface.take() {
      self.surface.free(slot);
    }
    for edge in &mut tile.quad.edges {
      if let Some(slot) = edge.take() {
        self.collision.free(slot);
      }
    }
    Some(tile)
  }

  /// Sets whether a tile takes part in collision. Returns true on change.
  pub fn set_collides(&mut self, local: IVec2, collides: bool) -> bool {
    let Some(tile) = self.index(local).and_then(|i| self.tiles[i].as_mut()) else {
      return false;
    };
    let changed = tile.collides != collides;
    tile.collides = collides;
    changed
  }

  /// Brings one tile's collision faces in line with its neighbors.
  ///
  /// `exposed[side]` is true when the neighbor on that side is air or does
  /// not collide. A non-colliding tile owns no faces at all. Returns true
  /// if the collision buffer changed.
  pub fn reconcile_collision(&mut self, local: IVec2, exposed: [bool; 4]) -> bool {
    let Some(tile) = self.index(local).and_then(|i| self.tiles[i].as_mut()) else {
      return false;
    };

    let mut changed = false;
    for side in Side::ALL {
      let i = side.index();
      let wants_face = tile.collides && exposed[i];
      match (tile.quad.edges[i], wants_face) {
        (None, true) => {
          let slot = self.collision.insert(&tile.quad.edge_primitive(side));
          tile.quad.edges[i] = Some(slot);
          changed = true;
        }
        (Some(slot), false) => {
          self.collision.free(slot);
          tile.quad.edges[i] = None;
          changed = true;
        }
        _ => {}
      }
    }
    changed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::coords::{ChunkId, ChunkLayout};
  use crate::streaming::CancelToken;
  use crate::terrain::FlatTerrain;

  fn flat_region() -> Region {
    let mut region = Region::new(ChunkId::new(0, 0), ChunkLayout::default());
    region
      .generate(&FlatTerrain::new(10, 3), &CancelToken::new())
      .unwrap();
    region
  }

  #[test]
  fn retyping_reuses_surface_slot() {
    let mut region = flat_region();
    let local = IVec2::new(4, 9);
    let slot = region.tile(local).unwrap().quad.surface;
    let slots_before = region.surface_buffer().slot_count();

    assert_eq!(region.set_tile(local, TileKind::Gold), Some(TileKind::Grass));
    let tile = region.tile(local).unwrap();
    assert_eq!(tile.kind, TileKind::Gold);
    assert_eq!(tile.quad.surface, slot);
    assert_eq!(region.surface_buffer().slot_count(), slots_before);

    let uv = region.surface_buffer().uvs()[slot.unwrap().offset()];
    assert_eq!(uv[2], TileKind::Gold.layer() as f32);
  }

  #[test]
  fn take_frees_every_slot() {
    let mut region = flat_region();
    let tile = region.take_tile(IVec2::new(2, 9)).unwrap();
    assert_eq!(tile.kind, TileKind::Grass);
    assert!(tile.quad.surface.is_none());
    assert!(tile.quad.edges.iter().all(Option::is_none));
    assert_eq!(region.surface_buffer().free_slots().count(), 1);
    assert_eq!(region.collision_buffer().free_slots().count(), 1);
    assert!(region.take_tile(IVec2::new(2, 9)).is_none());
  }

  #[test]
  fn reconcile_adds_and_removes_faces() {
    let mut region = flat_region();
    let local = IVec2::new(5, 5);
    assert!(region.reconcile_collision(local, [true, false, false, true]));
    let quad = &region.tile(local).unwrap().quad;
    assert!(quad.edge(Side::Up).is_some());
    assert!(quad.edge(Side::Left).is_some());

    // Idempotent.
    assert!(!region.reconcile_collision(local, [true, false, false, true]));

    region.set_collides(local, false);
    assert!(region.reconcile_collision(local, [true; 4]));
    assert_eq!(region.tile(local).unwrap().quad.exposed_sides().count(), 0);
  }
}
