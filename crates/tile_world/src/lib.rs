//! Tile World - streamed 2D tile terrain for Bevy.
//!
//! Regions of tiles are generated on background tasks around a focus
//! point, meshed into surface and collision geometry, and patched in place
//! when single tiles are placed or removed, including across region
//! boundaries.
//!
//! The entry point is [`TileWorld`]; [`TileWorldPlugin`] drives it from a
//! Bevy app.

pub mod config;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod plugin;
pub mod region;
pub mod streaming;
pub mod terrain;
pub mod tile;
pub mod world;

pub use config::{HeightBand, StreamingConfig, TerrainConfig, TileWorldConfig};
pub use coords::{ChunkId, ChunkLayout};
pub use error::{ConfigError, EditError, GenerateError};
pub use geometry::{BufferKind, GeometryBuffer, Primitive, Slot};
pub use plugin::{
  RegionCollider, RegionEntities, RegionEntity, StreamingFocus, TileWorldPlugin, TileWorldSet,
};
pub use region::{Region, RegionMeshes};
pub use streaming::{
  CancelToken, ChunkLoadInfo, ChunkState, GenerationFailure, Pass, PassSchedule, StreamingEvent,
  StreamingScheduler, StreamingStats,
};
pub use terrain::{FlatTerrain, NoiseTerrain, TerrainSource};
pub use tile::{Quad, Side, Tile, TileKind};
pub use world::TileWorld;
