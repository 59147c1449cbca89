//! The world service object.
//!
//! [`TileWorld`] bundles the streaming scheduler with the query and edit
//! interface gameplay code uses. Construct one per session and pass it
//! around (the plugin stores it as a resource).

mod tile_access;

use std::sync::Arc;
use std::time::Duration;

use bevy::log::info;
use bevy::math::Vec2;
use bevy::prelude::Resource;

use crate::config::TileWorldConfig;
use crate::coords::{ChunkId, ChunkLayout};
use crate::error::ConfigError;
use crate::region::Region;
use crate::streaming::{
  ChunkState, GenerationFailure, StreamingEvent, StreamingScheduler, StreamingStats,
};
use crate::terrain::{NoiseTerrain, TerrainSource};

/// A streamed, editable tile world.
#[derive(Resource)]
pub struct TileWorld {
  config: TileWorldConfig,
  streaming: StreamingScheduler,
}

impl TileWorld {
  /// Creates a world generating from `terrain`.
  pub fn new(config: TileWorldConfig, terrain: Arc<dyn TerrainSource>) -> Result<Self, ConfigError> {
    config.validate()?;
    let layout = config.layout();
    info!(
      "Tile world: {}x{} regions, {} generation tasks max",
      layout.size.x, layout.size.y, config.streaming.max_generation_tasks
    );
    let streaming = StreamingScheduler::new(layout, config.streaming.clone(), terrain);
    Ok(Self { config, streaming })
  }

  /// Creates a world using [`NoiseTerrain`] built from the config.
  pub fn with_noise(config: TileWorldConfig) -> Result<Self, ConfigError> {
    let terrain = Arc::new(NoiseTerrain::new(config.terrain.clone()));
    Self::new(config, terrain)
  }

  /// Advances streaming by `delta` with the focus at `focus`, then
  /// reconciles the seams of regions that finished generating.
  pub fn tick(&mut self, delta: Duration, focus: Vec2) {
    self.streaming.tick(delta, focus);
    for id in self.streaming.take_unstitched() {
      self.stitch_region(id);
    }
  }

  pub fn config(&self) -> &TileWorldConfig {
    &self.config
  }

  pub fn layout(&self) -> ChunkLayout {
    self.streaming.layout()
  }

  pub fn streaming(&self) -> &StreamingScheduler {
    &self.streaming
  }

  /// Direct access to the passes, for hosts that schedule them manually.
  ///
  /// Seams of regions generated by manually run passes are reconciled on
  /// the next [`Self::tick`].
  pub fn streaming_mut(&mut self) -> &mut StreamingScheduler {
    &mut self.streaming
  }

  /// Region of a tracked chunk. `None` if untracked, not yet instantiated,
  /// or currently owned by its generation task.
  pub fn region_at(&self, id: ChunkId) -> Option<&Region> {
    self.streaming.region(id)
  }

  pub fn state(&self, id: ChunkId) -> Option<ChunkState> {
    self.streaming.state(id)
  }

  pub fn stats(&self) -> StreamingStats {
    self.streaming.stats()
  }

  pub fn drain_events(&mut self) -> Vec<StreamingEvent> {
    self.streaming.drain_events()
  }

  pub fn drain_errors(&mut self) -> Vec<GenerationFailure> {
    self.streaming.drain_errors()
  }

  /// Retires every region and cancels running generation.
  pub fn shutdown(&mut self) {
    self.streaming.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::StreamingConfig;

  #[test]
  fn noise_world_uses_config_terrain() {
    let config = TileWorldConfig::default();
    let world = TileWorld::with_noise(config.clone()).unwrap();
    assert_eq!(world.config(), &config);
    assert_eq!(world.layout(), config.layout());
    assert_eq!(world.stats(), StreamingStats::default());
  }

  #[test]
  fn invalid_config_is_rejected() {
    let config = TileWorldConfig::default()
      .with_streaming(StreamingConfig::default().with_distances(30.0, 10.0));
    assert!(matches!(
      TileWorld::with_noise(config),
      Err(ConfigError::Invalid(_))
    ));
  }
}
