//! Tile data model.
//!
//! A [`Tile`] occupies one cell of a region's grid and owns a [`Quad`]: its
//! footprint plus the geometry slots of its surface face and of its exposed
//! collision faces.

use bevy::math::{IVec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Primitive, Slot};

/// Half-depth of collision faces along Z.
const COLLISION_HALF_DEPTH: f32 = 2.0;

/// Tile material, ordered from surface soil to rarest gem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TileKind {
  Grass,
  Dirt,
  Rock,
  Copper,
  Iron,
  Gold,
  Ruby,
  Sapphire,
  Emerald,
  Diamond,
}

impl TileKind {
  pub const ALL: [TileKind; 10] = [
    TileKind::Grass,
    TileKind::Dirt,
    TileKind::Rock,
    TileKind::Copper,
    TileKind::Iron,
    TileKind::Gold,
    TileKind::Ruby,
    TileKind::Sapphire,
    TileKind::Emerald,
    TileKind::Diamond,
  ];

  /// Texture array layer for this material.
  #[inline]
  pub const fn layer(self) -> u32 {
    self as u32
  }
}

/// Cardinal side of a cell, in neighbor-scan order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
  Up,
  Right,
  Down,
  Left,
}

impl Side {
  pub const ALL: [Side; 4] = [Side::Up, Side::Right, Side::Down, Side::Left];

  #[inline]
  pub const fn index(self) -> usize {
    self as usize
  }

  /// Grid step toward the neighbor on this side (Y up).
  pub const fn offset(self) -> IVec2 {
    match self {
      Side::Up => IVec2::new(0, 1),
      Side::Right => IVec2::new(1, 0),
      Side::Down => IVec2::new(0, -1),
      Side::Left => IVec2::new(-1, 0),
    }
  }

  /// Outward normal of a face on this side.
  pub const fn normal(self) -> Vec3 {
    match self {
      Side::Up => Vec3::Y,
      Side::Right => Vec3::X,
      Side::Down => Vec3::NEG_Y,
      Side::Left => Vec3::NEG_X,
    }
  }

  pub const fn opposite(self) -> Side {
    match self {
      Side::Up => Side::Down,
      Side::Right => Side::Left,
      Side::Down => Side::Up,
      Side::Left => Side::Right,
    }
  }
}

/// Geometric record of one tile.
///
/// `None` slots mean the primitive is not present in its buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quad {
  /// Bottom-left cell, region-local.
  pub origin: IVec2,
  pub size: IVec2,
  /// Surface face in the render buffer.
  pub surface: Option<Slot>,
  /// Collision faces in the collision buffer, indexed by [`Side::index`].
  pub edges: [Option<Slot>; 4],
}

impl Quad {
  pub fn new(origin: IVec2) -> Self {
    Self {
      origin,
      size: IVec2::ONE,
      surface: None,
      edges: [None; 4],
    }
  }

  pub fn top_left(&self) -> Vec3 {
    Vec3::new(self.origin.x as f32, (self.origin.y + self.size.y) as f32, 0.0)
  }

  pub fn top_right(&self) -> Vec3 {
    (self.origin + self.size).as_vec2().extend(0.0)
  }

  pub fn bottom_right(&self) -> Vec3 {
    Vec3::new((self.origin.x + self.size.x) as f32, self.origin.y as f32, 0.0)
  }

  pub fn bottom_left(&self) -> Vec3 {
    self.origin.as_vec2().extend(0.0)
  }

  /// Neighbor cell on the given side, region-local.
  #[inline]
  pub fn neighbor(&self, side: Side) -> IVec2 {
    self.origin + side.offset()
  }

  pub fn edge(&self, side: Side) -> Option<Slot> {
    self.edges[side.index()]
  }

  /// Iterates the sides that currently own a collision face.
  pub fn exposed_sides(&self) -> impl Iterator<Item = (Side, Slot)> + '_ {
    Side::ALL
      .into_iter()
      .filter_map(|side| self.edge(side).map(|slot| (side, slot)))
  }

  /// Surface face, facing -Z, with the material layer in the UV's third
  /// component.
  pub fn surface_primitive(&self, kind: TileKind) -> Primitive {
    let layer = kind.layer() as f32;
    Primitive {
      positions: [
        self.top_left(),
        self.top_right(),
        self.bottom_right(),
        self.bottom_left(),
      ],
      normal: Vec3::NEG_Z,
      uvs: [
        Vec3::new(0.0, 1.0, layer),
        Vec3::new(1.0, 1.0, layer),
        Vec3::new(1.0, 0.0, layer),
        Vec3::new(0.0, 0.0, layer),
      ],
    }
  }

  /// Collision face for one side: the side's edge extruded along Z.
  pub fn edge_primitive(&self, side: Side) -> Primitive {
    let f = Vec3::Z * COLLISION_HALF_DEPTH;
    let (tl, tr, br, bl) = (
      self.top_left(),
      self.top_right(),
      self.bottom_right(),
      self.bottom_left(),
    );
    let positions = match side {
      Side::Up => [tl - f, tl + f, tr + f, tr - f],
      Side::Right => [tr - f, tr + f, br + f, br - f],
      Side::Down => [bl + f, bl - f, br - f, br + f],
      Side::Left => [tl + f, tl - f, bl - f, bl + f],
    };
    Primitive {
      positions,
      normal: side.normal(),
      uvs: [Vec3::ZERO; 4],
    }
  }
}

/// One occupied cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
  pub kind: TileKind,
  /// Whether neighbors treat this tile as blocking their collision faces.
  pub collides: bool,
  pub quad: Quad,
}

impl Tile {
  /// A colliding tile with no geometry allocated yet.
  pub fn new(kind: TileKind, origin: IVec2) -> Self {
    Self {
      kind,
      collides: true,
      quad: Quad::new(origin),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn corners_follow_origin() {
    let quad = Quad::new(IVec2::new(3, 5));
    assert_eq!(quad.top_left(), Vec3::new(3.0, 6.0, 0.0));
    assert_eq!(quad.top_right(), Vec3::new(4.0, 6.0, 0.0));
    assert_eq!(quad.bottom_right(), Vec3::new(4.0, 5.0, 0.0));
    assert_eq!(quad.bottom_left(), Vec3::new(3.0, 5.0, 0.0));
  }

  #[test]
  fn edge_faces_span_their_side() {
    let quad = Quad::new(IVec2::ZERO);
    for side in Side::ALL {
      let prim = quad.edge_primitive(side);
      assert_eq!(prim.normal, side.normal());
      // All four points sit on the side's line, at z = +-2.
      for p in prim.positions {
        assert_eq!(p.z.abs(), 2.0);
        match side {
          Side::Up => assert_eq!(p.y, 1.0),
          Side::Right => assert_eq!(p.x, 1.0),
          Side::Down => assert_eq!(p.y, 0.0),
          Side::Left => assert_eq!(p.x, 0.0),
        }
      }
    }
  }

  #[test]
  fn sides_pair_with_opposites() {
    for side in Side::ALL {
      assert_eq!(side.offset() + side.opposite().offset(), IVec2::ZERO);
      assert_eq!(side.opposite().opposite(), side);
    }
    assert_eq!(TileKind::Diamond.layer(), 9);
    assert!(TileKind::Grass < TileKind::Rock);
  }
}
