//! Perlin-driven terrain with flatland and mountain bands.

use noise::{NoiseFn, Perlin};

use super::TerrainSource;
use crate::config::TerrainConfig;

/// Row each noise stream is sampled along. Separate rows keep the streams
/// uncorrelated while sharing one Perlin instance.
const STREAM_ROWS: [f64; 9] = [
  1000.5, 2000.5, 3000.5, 4000.5, 5000.5, 6000.5, 7000.5, 8000.5, 9000.5,
];

/// Column offsets per stream, so low-frequency streams do not start in
/// lockstep near the world origin.
const STREAM_OFFSETS: [f64; 9] = [
  1_100_000.0,
  1_200_000.0,
  1_300_000.0,
  1_400_000.0,
  1_500_000.0,
  1_600_000.0,
  1_700_000.0,
  1_100_000.0,
  4_000_000.0,
];

/// Procedural terrain.
///
/// Height is a blend between a flatlands band and a mountains band, where
/// the blend factor is itself the product of three noise samples. Products
/// of `[0, 1]` samples stay near zero most of the time, so mountains are
/// rare and their foothills ramp up noisily instead of at a fixed threshold.
#[derive(Clone)]
pub struct NoiseTerrain {
  perlin: Perlin,
  config: TerrainConfig,
}

impl NoiseTerrain {
  pub fn new(config: TerrainConfig) -> Self {
    Self {
      perlin: Perlin::new(config.seed),
      config,
    }
  }

  pub fn config(&self) -> &TerrainConfig {
    &self.config
  }

  /// Noise stream `stream` at column `x`, mapped to `[0, 1]`.
  fn sample(&self, stream: usize, x: i32, frequency: f64) -> f64 {
    let point = [
      STREAM_OFFSETS[stream] + x as f64 * frequency,
      STREAM_ROWS[stream],
    ];
    (self.perlin.get(point) * 0.5 + 0.5).clamp(0.0, 1.0)
  }

  /// Blend factor in `[0, 1]`: 0 is pure flatlands, 1 pure mountains.
  pub fn mountain_blend(&self, world_x: i32) -> f64 {
    let [a, b, c] = self.config.blend_frequencies;
    self.sample(4, world_x, a) * self.sample(5, world_x, b) * self.sample(6, world_x, c)
  }
}

impl TerrainSource for NoiseTerrain {
  fn column_height(&self, world_x: i32) -> i32 {
    let cfg = &self.config;
    let flat = cfg.flatlands.sample(
      self.sample(0, world_x, cfg.flatlands.primary_frequency),
      self.sample(1, world_x, cfg.flatlands.detail_frequency),
    );
    let mountain = cfg.mountains.sample(
      self.sample(2, world_x, cfg.mountains.primary_frequency),
      self.sample(3, world_x, cfg.mountains.detail_frequency),
    );
    let t = self.mountain_blend(world_x);
    ((1.0 - t) * flat + t * mountain).floor() as i32
  }

  fn dirt_depth(&self, world_x: i32) -> i32 {
    let cfg = &self.config;
    let [fine, coarse] = cfg.dirt_frequencies;
    let t = self.sample(7, world_x, fine) * 0.25 + self.sample(8, world_x, coarse) * 0.75;
    (cfg.dirt_depth_min + (cfg.dirt_depth_max - cfg.dirt_depth_min) * t).floor() as i32
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deterministic_per_seed() {
    let a = NoiseTerrain::new(TerrainConfig::default().with_seed(3));
    let b = NoiseTerrain::new(TerrainConfig::default().with_seed(3));
    for x in -200..200 {
      assert_eq!(a.column_height(x), b.column_height(x));
      assert_eq!(a.dirt_depth(x), b.dirt_depth(x));
    }
  }

  #[test]
  fn heights_stay_within_bands() {
    let terrain = NoiseTerrain::new(TerrainConfig::default());
    for x in (-5000..5000).step_by(7) {
      let h = terrain.column_height(x);
      assert!((0..=120).contains(&h), "column {x} height {h}");

      let d = terrain.dirt_depth(x);
      assert!((5..=15).contains(&d), "column {x} dirt depth {d}");
    }
  }

  #[test]
  fn flat_blend_gives_flatland_height() {
    let mut config = TerrainConfig::default();
    // A zero-width mountain band at the flatland floor isolates the flat band.
    config.mountains.min = 0.0;
    config.mountains.max = 0.0;
    let terrain = NoiseTerrain::new(config);
    for x in 0..500 {
      assert!(terrain.column_height(x) <= 15);
    }
  }
}
