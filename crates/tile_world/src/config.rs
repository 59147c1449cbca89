//! World configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it
//! overrides:
//!
//! ```toml
//! chunk_size = [32, 32]
//!
//! [streaming]
//! max_generation_tasks = 4
//!
//! [terrain]
//! seed = 7
//! ```

use std::path::Path;

use bevy::math::IVec2;
use serde::{Deserialize, Serialize};

use crate::coords::ChunkLayout;
use crate::error::ConfigError;

/// Top-level configuration for a [`crate::TileWorld`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileWorldConfig {
  /// Width and height of one region in tiles.
  pub chunk_size: [i32; 2],
  pub streaming: StreamingConfig,
  pub terrain: TerrainConfig,
}

impl Default for TileWorldConfig {
  fn default() -> Self {
    Self {
      chunk_size: [16, 16],
      streaming: StreamingConfig::default(),
      terrain: TerrainConfig::default(),
    }
  }
}

impl TileWorldConfig {
  /// Parses and validates a TOML document.
  pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  /// Reads, parses and validates a TOML file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let source = std::fs::read_to_string(path)?;
    Self::from_toml_str(&source)
  }

  pub fn layout(&self) -> ChunkLayout {
    ChunkLayout::new(IVec2::from_array(self.chunk_size))
  }

  pub fn with_chunk_size(mut self, size: IVec2) -> Self {
    self.chunk_size = size.to_array();
    self
  }

  pub fn with_streaming(mut self, streaming: StreamingConfig) -> Self {
    self.streaming = streaming;
    self
  }

  pub fn with_terrain(mut self, terrain: TerrainConfig) -> Self {
    self.terrain = terrain;
    self
  }

  /// Rejects values the scheduler cannot run with.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.chunk_size.iter().any(|&c| c <= 0) {
      return Err(ConfigError::Invalid(format!(
        "chunk_size must be positive, got {:?}",
        self.chunk_size
      )));
    }
    self.streaming.validate()?;
    self.terrain.validate()
  }
}

/// Scheduler rates, bands and limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
  /// Refresh passes per second.
  pub refresh_hz: f32,
  /// Instantiate passes per second.
  pub instantiate_hz: f32,
  /// Generate passes per second.
  pub generate_hz: f32,
  /// Destroy passes per second.
  pub destroy_hz: f32,
  /// Cap on concurrently running generation tasks.
  pub max_generation_tasks: usize,
  /// Regions whose center is within this distance are visible and collidable.
  pub active_distance: f32,
  /// Half-extent of the box of regions kept tracked around the focus.
  pub inactive_distance: f32,
  /// Seconds without being wanted before a region is retired.
  pub stale_after_secs: f32,
}

impl Default for StreamingConfig {
  fn default() -> Self {
    Self {
      refresh_hz: 2.0,
      instantiate_hz: 20.0,
      generate_hz: 15.0,
      destroy_hz: 10.0,
      max_generation_tasks: 10,
      active_distance: 20.0,
      inactive_distance: 50.0,
      stale_after_secs: 10.0,
    }
  }
}

impl StreamingConfig {
  /// Sets all four pass frequencies at once.
  pub fn with_pass_rate(mut self, hz: f32) -> Self {
    self.refresh_hz = hz;
    self.instantiate_hz = hz;
    self.generate_hz = hz;
    self.destroy_hz = hz;
    self
  }

  pub fn with_max_generation_tasks(mut self, max: usize) -> Self {
    self.max_generation_tasks = max;
    self
  }

  pub fn with_distances(mut self, active: f32, inactive: f32) -> Self {
    self.active_distance = active;
    self.inactive_distance = inactive;
    self
  }

  pub fn with_stale_after(mut self, secs: f32) -> Self {
    self.stale_after_secs = secs;
    self
  }

  fn validate(&self) -> Result<(), ConfigError> {
    let rates = [
      ("refresh_hz", self.refresh_hz),
      ("instantiate_hz", self.instantiate_hz),
      ("generate_hz", self.generate_hz),
      ("destroy_hz", self.destroy_hz),
    ];
    for (name, hz) in rates {
      if !(hz > 0.0 && hz.is_finite()) {
        return Err(ConfigError::Invalid(format!("{name} must be positive, got {hz}")));
      }
    }
    if self.max_generation_tasks == 0 {
      return Err(ConfigError::Invalid("max_generation_tasks must be at least 1".into()));
    }
    if self.active_distance < 0.0 || self.inactive_distance < self.active_distance {
      return Err(ConfigError::Invalid(format!(
        "expected 0 <= active_distance <= inactive_distance, got {} and {}",
        self.active_distance, self.inactive_distance
      )));
    }
    if self.stale_after_secs <= 0.0 {
      return Err(ConfigError::Invalid("stale_after_secs must be positive".into()));
    }
    Ok(())
  }
}

/// Height band of one terrain layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightBand {
  pub min: f64,
  pub max: f64,
  /// Weight of the primary sample; the detail sample gets the remainder.
  pub main_ratio: f64,
  pub primary_frequency: f64,
  pub detail_frequency: f64,
}

impl HeightBand {
  /// Height for two noise samples in `[0, 1]`.
  pub fn sample(&self, primary: f64, detail: f64) -> f64 {
    let range = self.max - self.min;
    primary * range * self.main_ratio + detail * range * (1.0 - self.main_ratio) + self.min
  }
}

/// Noise terrain parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
  pub seed: u32,
  /// Low, gentle layer.
  pub flatlands: HeightBand,
  /// High layer the blend selector lifts columns into.
  pub mountains: HeightBand,
  /// Frequencies of the three samples multiplied into the blend selector.
  pub blend_frequencies: [f64; 3],
  pub dirt_depth_min: f64,
  pub dirt_depth_max: f64,
  /// Frequencies of the two dirt-depth samples (mixed 1:3).
  pub dirt_frequencies: [f64; 2],
}

impl Default for TerrainConfig {
  fn default() -> Self {
    Self {
      seed: 0,
      flatlands: HeightBand {
        min: 0.0,
        max: 15.0,
        main_ratio: 0.8,
        primary_frequency: 0.005,
        detail_frequency: 0.005,
      },
      mountains: HeightBand {
        min: 90.0,
        max: 120.0,
        main_ratio: 0.9,
        primary_frequency: 0.03,
        detail_frequency: 0.006,
      },
      blend_frequencies: [0.01, 0.01, 0.005],
      dirt_depth_min: 5.0,
      dirt_depth_max: 15.0,
      dirt_frequencies: [0.2, 0.1],
    }
  }
}

impl TerrainConfig {
  pub fn with_seed(mut self, seed: u32) -> Self {
    self.seed = seed;
    self
  }

  fn validate(&self) -> Result<(), ConfigError> {
    for (name, band) in [("flatlands", &self.flatlands), ("mountains", &self.mountains)] {
      if band.max < band.min || !(0.0..=1.0).contains(&band.main_ratio) {
        return Err(ConfigError::Invalid(format!(
          "{name}: need min <= max and main_ratio in [0, 1]"
        )));
      }
    }
    if self.dirt_depth_max < self.dirt_depth_min || self.dirt_depth_min < 0.0 {
      return Err(ConfigError::Invalid(
        "dirt depth needs 0 <= dirt_depth_min <= dirt_depth_max".into(),
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let config = TileWorldConfig::from_toml_str(
      r#"
        chunk_size = [32, 8]

        [streaming]
        max_generation_tasks = 3
        active_distance = 40.0
        inactive_distance = 80.0
      "#,
    )
    .unwrap();

    assert_eq!(config.layout().size, IVec2::new(32, 8));
    assert_eq!(config.streaming.max_generation_tasks, 3);
    assert_eq!(config.streaming.refresh_hz, 2.0);
    assert_eq!(config.terrain, TerrainConfig::default());
  }

  #[test]
  fn rejects_inverted_bands() {
    let err = TileWorldConfig::from_toml_str(
      r#"
        [streaming]
        active_distance = 60.0
      "#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");

    let zero = TileWorldConfig::default().with_chunk_size(IVec2::new(0, 16));
    assert!(zero.validate().is_err());
  }

  #[test]
  fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("world.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[terrain]\nseed = 99").unwrap();

    let config = TileWorldConfig::load(&path).unwrap();
    assert_eq!(config.terrain.seed, 99);

    let missing = TileWorldConfig::load(dir.path().join("nope.toml"));
    assert!(matches!(missing, Err(ConfigError::Io(_))));
  }

  #[test]
  fn band_sample_spans_range() {
    let band = TerrainConfig::default().mountains;
    assert_eq!(band.sample(0.0, 0.0), 90.0);
    assert!((band.sample(1.0, 1.0) - 120.0).abs() < 1e-9);
  }
}
