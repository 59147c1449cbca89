//! Shared helpers for tile world integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bevy::math::{IVec2, Vec2};
use bevy::tasks::{AsyncComputeTaskPool, TaskPool};
use tile_world::{StreamingConfig, TerrainSource, TileWorld, TileWorldConfig};

/// Simulated frame length.
pub const FRAME: Duration = Duration::from_millis(50);

/// Config where every pass runs on every tick.
pub fn eager_config(active: f32, inactive: f32) -> TileWorldConfig {
  TileWorldConfig::default().with_streaming(
    StreamingConfig::default()
      .with_pass_rate(1000.0)
      .with_distances(active, inactive),
  )
}

pub fn world_with(config: TileWorldConfig, terrain: Arc<dyn TerrainSource>) -> TileWorld {
  AsyncComputeTaskPool::get_or_init(TaskPool::new);
  TileWorld::new(config, terrain).unwrap()
}

/// Ticks until `done` holds, sleeping briefly so workers make progress.
pub fn pump_until(
  world: &mut TileWorld,
  focus: Vec2,
  frame: Duration,
  mut done: impl FnMut(&mut TileWorld) -> bool,
) {
  for _ in 0..4000 {
    world.tick(frame, focus);
    if done(world) {
      return;
    }
    std::thread::sleep(Duration::from_millis(1));
  }
  panic!("condition not reached; stats: {:?}", world.stats());
}

/// Flat terrain that sleeps per column and records peak concurrency.
#[derive(Default)]
pub struct SlowTerrain {
  pub height: i32,
  pub delay: Duration,
  running: AtomicUsize,
  peak: AtomicUsize,
}

impl SlowTerrain {
  pub fn new(height: i32, delay: Duration) -> Self {
    Self {
      height,
      delay,
      ..Default::default()
    }
  }

  /// Most columns ever sampled at the same moment.
  pub fn peak(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }
}

impl TerrainSource for SlowTerrain {
  fn column_height(&self, _world_x: i32) -> i32 {
    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    std::thread::sleep(self.delay);
    self.running.fetch_sub(1, Ordering::SeqCst);
    self.height
  }

  fn dirt_depth(&self, _world_x: i32) -> i32 {
    3
  }
}

/// Cells from `min` to `max` inclusive.
pub fn cells(min: IVec2, max: IVec2) -> impl Iterator<Item = IVec2> {
  (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| IVec2::new(x, y)))
}
