//! Bevy integration.
//!
//! Hosts a [`TileWorld`] as a resource, ticks it from the frame loop
//! around the [`StreamingFocus`] entity, and mirrors each generated region
//! as an entity carrying its meshes.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::config::TileWorldConfig;
use crate::coords::ChunkId;
use crate::streaming::StreamingEvent;
use crate::terrain::{NoiseTerrain, TerrainSource};
use crate::world::TileWorld;

/// Marker for the entity regions are streamed around.
#[derive(Component)]
pub struct StreamingFocus;

/// Entity mirroring one region.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionEntity(pub ChunkId);

/// Collision mesh of a region, for the physics layer to consume.
#[derive(Component, Debug, Clone, Default)]
pub struct RegionCollider {
  pub mesh: Option<Handle<Mesh>>,
  /// False while the region is outside the active band.
  pub enabled: bool,
}

/// Region entities by chunk.
#[derive(Resource, Default)]
pub struct RegionEntities(HashMap<ChunkId, Entity>);

impl RegionEntities {
  pub fn get(&self, id: ChunkId) -> Option<Entity> {
    self.0.get(&id).copied()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// System sets of the tile world, in order.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TileWorldSet {
  Stream,
  Sync,
}

/// Streams and meshes a tile world.
///
/// Without `Assets<Mesh>` (headless apps), region entities are still
/// spawned but carry no meshes.
pub struct TileWorldPlugin {
  config: TileWorldConfig,
  terrain: Option<Arc<dyn TerrainSource>>,
}

impl TileWorldPlugin {
  /// Uses [`NoiseTerrain`] from `config.terrain`.
  pub fn new(config: TileWorldConfig) -> Self {
    Self {
      config,
      terrain: None,
    }
  }

  pub fn with_terrain(config: TileWorldConfig, terrain: impl TerrainSource + 'static) -> Self {
    Self {
      config,
      terrain: Some(Arc::new(terrain)),
    }
  }
}

impl Default for TileWorldPlugin {
  fn default() -> Self {
    Self::new(TileWorldConfig::default())
  }
}

impl Plugin for TileWorldPlugin {
  fn build(&self, app: &mut App) {
    let terrain: Arc<dyn TerrainSource> = match &self.terrain {
      Some(terrain) => terrain.clone(),
      None => Arc::new(NoiseTerrain::new(self.config.terrain.clone())),
    };

    match TileWorld::new(self.config.clone(), terrain) {
      Ok(world) => {
        app.insert_resource(world);
      }
      Err(e) => {
        error!("Tile world disabled: {}", e);
        return;
      }
    }

    app
      .init_resource::<RegionEntities>()
      .configure_sets(Update, (TileWorldSet::Stream, TileWorldSet::Sync).chain())
      .add_systems(Update, tick_tile_world.in_set(TileWorldSet::Stream))
      .add_systems(Update, sync_region_entities.in_set(TileWorldSet::Sync));
  }
}

/// System: advances streaming around the focus entity.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
fn tick_tile_world(
  time: Res<Time>,
  focus: Query<&GlobalTransform, With<StreamingFocus>>,
  mut world: ResMut<TileWorld>,
) {
  let Some(transform) = focus.iter().next() else {
    return;
  };
  world.tick(time.delta(), transform.translation().truncate());
}

/// System: spawns, updates and despawns region entities.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
fn sync_region_entities(
  mut commands: Commands,
  mut world: ResMut<TileWorld>,
  mut entities: ResMut<RegionEntities>,
  mut meshes: Option<ResMut<Assets<Mesh>>>,
  mut regions: Query<(&RegionEntity, &mut Visibility, &mut RegionCollider)>,
) {
  for event in world.drain_events() {
    match event {
      StreamingEvent::MeshFinalized(id) => {
        let Some(region) = world.region_at(id) else {
          continue;
        };
        let entity = *entities.0.entry(id).or_insert_with(|| {
          let origin = region.origin().as_vec2();
          commands
            .spawn((
              Name::new(region.name()),
              RegionEntity(id),
              Transform::from_translation(origin.extend(0.0)),
              Visibility::Hidden,
              RegionCollider::default(),
            ))
            .id()
        });

        if let (Some(meshes), Some(built)) = (meshes.as_deref_mut(), region.meshes()) {
          let surface = meshes.add(built.surface.clone());
          let collision = meshes.add(built.collision.clone());
          commands.entity(entity).insert((
            Mesh3d(surface),
            RegionCollider {
              mesh: Some(collision),
              enabled: region.is_collidable(),
            },
          ));
        }
      }
      StreamingEvent::Retired(id) => {
        if let Some(entity) = entities.0.remove(&id) {
          commands.entity(entity).despawn();
        }
      }
      _ => {}
    }
  }

  for (tag, mut visibility, mut collider) in &mut regions {
    let Some(region) = world.region_at(tag.0) else {
      continue;
    };
    let wanted = if region.is_visible() {
      Visibility::Inherited
    } else {
      Visibility::Hidden
    };
    visibility.set_if_neq(wanted);
    if collider.enabled != region.is_collidable() {
      collider.enabled = region.is_collidable();
    }
  }
}
