//! Tile edits across region boundaries.
//!
//! Run: cargo test -p tile_world --test editing

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bevy::math::{IVec2, Vec2};
use common::{FRAME, cells, eager_config, pump_until, world_with};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_world::{
  ChunkId, ChunkState, FlatTerrain, GeometryBuffer, Region, Side, StreamingEvent, TerrainSource,
  TileKind, TileWorld,
};

const FOCUS: Vec2 = Vec2::new(8.0, 8.0);

fn chunks() -> impl Iterator<Item = ChunkId> {
  (-1..=1).flat_map(|y| (-1..=1).map(move |x| ChunkId::new(x, y)))
}

/// Nine flat regions around the origin, ground at height 10.
fn generated_world() -> TileWorld {
  let mut world = world_with(eager_config(20.0, 20.0), Arc::new(FlatTerrain::new(10, 3)));
  pump_until(&mut world, FOCUS, FRAME, |w| {
    chunks().all(|id| w.state(id) == Some(ChunkState::Generated))
  });
  world.drain_events();
  world
}

fn region(world: &TileWorld, id: ChunkId) -> &Region {
  world.region_at(id).unwrap()
}

fn cell(x: i32, y: i32) -> Vec2 {
  Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
}

fn assert_buffer_sound(buffer: &GeometryBuffer, live: &HashSet<u32>, what: &str) {
  let free: HashSet<usize> = buffer.free_slots().map(|s| s.offset()).collect();
  assert_eq!(free.len() + live.len(), buffer.slot_count(), "{what}: slot accounting");
  for offset in &free {
    assert!(!live.contains(&(*offset as u32)), "{what}: live slot {offset} also free");
    assert!(buffer.indices()[*offset..*offset + 4].iter().all(|i| *i == 0));
  }
  for offset in live {
    let base = *offset as usize;
    let expected: Vec<u32> = (0..4).map(|i| *offset + i).collect();
    assert_eq!(&buffer.indices()[base..base + 4], expected.as_slice(), "{what}");
  }
}

/// Every slot is owned by exactly one tile or sits in the free list.
fn assert_region_sound(region: &Region) {
  let mut surface = HashSet::new();
  let mut collision = HashSet::new();
  for (local, tile) in region.tiles() {
    let slot = tile.quad.surface.expect("every tile has a surface quad");
    assert!(surface.insert(slot.offset() as u32), "{local:?} shares a surface slot");
    for (_, slot) in tile.quad.exposed_sides() {
      assert!(collision.insert(slot.offset() as u32), "{local:?} shares an edge slot");
    }
    if !tile.collides {
      assert_eq!(tile.quad.exposed_sides().count(), 0);
    }
  }
  assert_buffer_sound(region.surface_buffer(), &surface, "surface");
  assert_buffer_sound(region.collision_buffer(), &collision, "collision");
}

/// A colliding tile has a face on a side exactly when the neighbor there
/// does not block, so no two solid tiles face each other. Neighbors outside
/// `min..=max` are skipped.
fn assert_edges_symmetric(world: &TileWorld, min: IVec2, max: IVec2) {
  let blocks = |c: IVec2| world.tile_at_cell(c).is_some_and(|t| t.collides);
  for c in cells(min, max) {
    let Some(tile) = world.tile_at_cell(c) else {
      continue;
    };
    for side in Side::ALL {
      let neighbor = c + side.offset();
      if neighbor.cmplt(min).any() || neighbor.cmpgt(max).any() {
        continue;
      }
      let expected = tile.collides && !blocks(neighbor);
      assert_eq!(
        tile.quad.edge(side).is_some(),
        expected,
        "cell {c} side {side:?} (neighbor {neighbor})"
      );
    }
  }
}

#[test]
fn queries_and_removal() {
  let mut world = generated_world();
  assert_eq!(world.tile_at(Vec2::new(8.5, 9.2)).unwrap().kind, TileKind::Grass);
  assert!(world.tile_at(Vec2::new(8.0, 10.0)).is_none());
  assert_eq!(world.tile_at(Vec2::new(-0.5, -3.0)).unwrap().kind, TileKind::Rock);

  assert_eq!(world.remove_tile(cell(8, 9)), Ok(Some(TileKind::Grass)));
  assert!(world.tile_at(cell(8, 9)).is_none());
  assert_eq!(world.remove_tile(cell(8, 9)), Ok(None));

  let below = world.tile_at(cell(8, 8)).unwrap();
  assert_eq!(below.kind, TileKind::Dirt);
  assert!(below.quad.edge(Side::Up).is_some());
  assert!(world.tile_at(cell(7, 9)).unwrap().quad.edge(Side::Right).is_some());
  assert!(world.tile_at(cell(9, 9)).unwrap().quad.edge(Side::Left).is_some());

  assert_region_sound(region(&world, ChunkId::new(0, 0)));
  assert_edges_symmetric(&world, IVec2::splat(-16), IVec2::splat(31));

  let events = world.drain_events();
  assert_eq!(events, vec![StreamingEvent::MeshFinalized(ChunkId::new(0, 0))]);
}

#[test]
fn isolated_tile_is_closed_on_all_sides() {
  let mut world = generated_world();
  world.place_tile(cell(5, 14), TileKind::Gold).unwrap();

  let tile = world.tile_at(cell(5, 14)).unwrap();
  assert_eq!(tile.kind, TileKind::Gold);
  assert_eq!(tile.quad.exposed_sides().count(), 4);
  assert_region_sound(region(&world, ChunkId::new(0, 0)));
}

#[test]
fn retyping_keeps_collision() {
  let mut world = generated_world();
  let before = world.tile_at(cell(8, 9)).unwrap().quad.edges;
  world.place_tile(cell(8, 9), TileKind::Diamond).unwrap();

  let tile = world.tile_at(cell(8, 9)).unwrap();
  assert_eq!(tile.kind, TileKind::Diamond);
  assert_eq!(tile.quad.edges, before);
  assert_region_sound(region(&world, ChunkId::new(0, 0)));
}

#[test]
fn boundary_edit_only_touches_neighbor_collision() {
  let mut world = generated_world();
  let right = ChunkId::new(1, 0);

  world.place_tile(cell(16, 10), TileKind::Rock).unwrap();
  assert!(world.tile_at(cell(16, 10)).unwrap().quad.edge(Side::Left).is_some());
  world.drain_events();

  let snapshot = |world: &TileWorld| {
    let r = region(world, right);
    let tiles: Vec<(IVec2, TileKind)> = r.tiles().map(|(l, t)| (l, t.kind)).collect();
    (
      r.surface_buffer().positions().to_vec(),
      r.surface_buffer().indices().to_vec(),
      tiles,
    )
  };
  let before = snapshot(&world);
  let revisions: HashMap<ChunkId, u64> = chunks()
    .map(|id| (id, region(&world, id).mesh_revision()))
    .collect();
  let free_edges = region(&world, right).collision_buffer().free_slots().count();

  world.place_tile(cell(15, 10), TileKind::Rock).unwrap();

  assert_eq!(snapshot(&world), before);
  let neighbor = world.tile_at(cell(16, 10)).unwrap();
  assert!(neighbor.quad.edge(Side::Left).is_none());
  assert!(neighbor.quad.edge(Side::Up).is_some());
  assert_eq!(
    region(&world, right).collision_buffer().free_slots().count(),
    free_edges + 1
  );

  let placed = world.tile_at(cell(15, 10)).unwrap();
  assert!(placed.quad.edge(Side::Right).is_none());
  assert!(placed.quad.edge(Side::Down).is_none());
  assert!(placed.quad.edge(Side::Up).is_some());
  assert!(placed.quad.edge(Side::Left).is_some());
  assert!(world.tile_at(cell(15, 9)).unwrap().quad.edge(Side::Up).is_none());

  for id in chunks() {
    let expected = if id == right || id == ChunkId::new(0, 0) {
      revisions[&id] + 1
    } else {
      revisions[&id]
    };
    assert_eq!(region(&world, id).mesh_revision(), expected, "{id}");
  }
  let finalized: HashSet<StreamingEvent> = world.drain_events().into_iter().collect();
  assert_eq!(
    finalized,
    HashSet::from([
      StreamingEvent::MeshFinalized(ChunkId::new(0, 0)),
      StreamingEvent::MeshFinalized(right),
    ])
  );

  assert_region_sound(region(&world, right));
  assert_region_sound(region(&world, ChunkId::new(0, 0)));
  assert_edges_symmetric(&world, IVec2::splat(-16), IVec2::splat(31));
}

#[test]
fn collision_toggle_reopens_neighbors() {
  let mut world = generated_world();
  world.set_tile_collision(cell(4, 9), false).unwrap();

  let tile = world.tile_at(cell(4, 9)).unwrap();
  assert!(!tile.collides);
  assert_eq!(tile.quad.exposed_sides().count(), 0);
  assert!(tile.quad.surface.is_some());
  assert!(world.tile_at(cell(4, 8)).unwrap().quad.edge(Side::Up).is_some());
  assert!(world.tile_at(cell(3, 9)).unwrap().quad.edge(Side::Right).is_some());
  assert!(world.tile_at(cell(5, 9)).unwrap().quad.edge(Side::Left).is_some());
  assert_edges_symmetric(&world, IVec2::splat(-16), IVec2::splat(31));

  world.set_tile_collision(cell(4, 9), true).unwrap();
  let tile = world.tile_at(cell(4, 9)).unwrap();
  assert!(tile.collides);
  assert!(tile.quad.edge(Side::Up).is_some());
  assert!(world.tile_at(cell(4, 8)).unwrap().quad.edge(Side::Up).is_none());
  assert_region_sound(region(&world, ChunkId::new(0, 0)));
  assert_edges_symmetric(&world, IVec2::splat(-16), IVec2::splat(31));

  // Empty cells have nothing to toggle.
  assert_eq!(world.set_tile_collision(cell(4, 13), false), Ok(()));
}

#[test]
fn random_edits_keep_buffers_consistent() {
  let mut world = generated_world();
  let mut rng = StdRng::seed_from_u64(7);
  let mut slot_counts: HashMap<ChunkId, (usize, usize)> = HashMap::new();

  for step in 0..600 {
    let c = IVec2::new(rng.gen_range(-16..32), rng.gen_range(-4..20));
    let roll: f32 = rng.r#gen();
    if roll < 0.5 {
      let kind = TileKind::ALL[rng.gen_range(0..TileKind::ALL.len())];
      world.place_tile_at_cell(c, kind).unwrap();
      assert_eq!(world.tile_at_cell(c).unwrap().kind, kind);
    } else if roll < 0.9 {
      world.remove_tile_at_cell(c).unwrap();
      assert!(world.tile_at_cell(c).is_none());
    } else {
      world
        .set_tile_collision(c.as_vec2(), rng.gen_bool(0.5))
        .unwrap();
    }

    for id in chunks() {
      let r = region(&world, id);
      let counts = (
        r.surface_buffer().slot_count(),
        r.collision_buffer().slot_count(),
      );
      let previous = slot_counts.insert(id, counts).unwrap_or((0, 0));
      assert!(counts.0 >= previous.0 && counts.1 >= previous.1, "{id} shrank");
    }
    if step % 50 == 0 {
      chunks().for_each(|id| assert_region_sound(region(&world, id)));
    }
  }

  chunks().for_each(|id| assert_region_sound(region(&world, id)));
  assert_edges_symmetric(&world, IVec2::splat(-15), IVec2::splat(30));
}

/// Flat ground at height 10 whose columns from x = 32 on hang until the gate
/// opens, holding back every region with x = 1.
#[derive(Default)]
struct GatedTerrain {
  open: AtomicBool,
}

impl TerrainSource for GatedTerrain {
  fn column_height(&self, world_x: i32) -> i32 {
    while world_x >= 32 && !self.open.load(Ordering::Acquire) {
      std::thread::sleep(Duration::from_millis(1));
    }
    10
  }

  fn dirt_depth(&self, _world_x: i32) -> i32 {
    3
  }
}

#[test]
fn late_neighbor_generation_reconciles_the_seam() {
  let terrain = Arc::new(GatedTerrain::default());
  let mut world = world_with(eager_config(20.0, 20.0), terrain.clone());
  pump_until(&mut world, FOCUS, FRAME, |w| {
    (-1..=0).all(|x| (-1..=1).all(|y| w.state(ChunkId::new(x, y)) == Some(ChunkState::Generated)))
  });
  assert_eq!(world.state(ChunkId::new(1, 0)), Some(ChunkState::AwaitingGeneration));

  // Dig a hole against the pending region, and rebuild a cell whose right
  // neighbor is still unknown.
  assert_eq!(world.remove_tile_at_cell(IVec2::new(15, 5)), Ok(Some(TileKind::Rock)));
  world.remove_tile_at_cell(IVec2::new(15, 3)).unwrap();
  world.place_tile_at_cell(IVec2::new(15, 3), TileKind::Iron).unwrap();
  let rebuilt = world.tile_at_cell(IVec2::new(15, 3)).unwrap();
  assert!(rebuilt.quad.edge(Side::Right).is_some());
  let revision = region(&world, ChunkId::new(0, 0)).mesh_revision();

  terrain.open.store(true, Ordering::Release);
  pump_until(&mut world, FOCUS, FRAME, |w| {
    chunks().all(|id| w.state(id) == Some(ChunkState::Generated))
  });

  let facing_hole = world.tile_at_cell(IVec2::new(16, 5)).unwrap();
  assert!(facing_hole.quad.edge(Side::Left).is_some());
  let rebuilt = world.tile_at_cell(IVec2::new(15, 3)).unwrap();
  assert!(rebuilt.quad.edge(Side::Right).is_none());
  assert!(world.tile_at_cell(IVec2::new(16, 3)).unwrap().quad.edge(Side::Left).is_none());
  assert!(region(&world, ChunkId::new(0, 0)).mesh_revision() > revision);

  chunks().for_each(|id| assert_region_sound(region(&world, id)));
  assert_edges_symmetric(&world, IVec2::splat(-16), IVec2::splat(31));
}

#[test]
fn generation_next_to_untouched_ground_rebuilds_nothing() {
  let world = generated_world();
  // Seams of flat ground already agree, so no region was rebuilt.
  for id in chunks() {
    assert_eq!(region(&world, id).mesh_revision(), 1, "{id}");
  }
}
