//! Incremental quad storage for region meshes.
//!
//! A [`GeometryBuffer`] stores fixed-size runs of four vertices and four
//! indices. Removing a run zeroes its indices (a degenerate primitive) and
//! queues the run for reuse, so the slots held by every other quad stay
//! valid across edits. The arrays only ever grow.

use std::collections::VecDeque;

use bevy::asset::RenderAssetUsages;
use bevy::log::warn;
use bevy::math::Vec3;
use bevy::mesh::{Indices, Mesh, MeshVertexAttribute, PrimitiveTopology};
use bevy::render::render_resource::VertexFormat;

/// Vertices per primitive.
pub const QUAD_VERTICES: usize = 4;

/// Surface UVs with the texture array layer in the third component.
pub const ATTRIBUTE_LAYERED_UV: MeshVertexAttribute =
  MeshVertexAttribute::new("Vertex_LayeredUv", 988_540_917, VertexFormat::Float32x3);

/// Offset of the first vertex of a live or freed 4-vertex run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub(crate) u32);

impl Slot {
  /// Offset into the vertex and index arrays.
  #[inline]
  pub fn offset(self) -> usize {
    self.0 as usize
  }

  fn run(self) -> usize {
    self.offset() / QUAD_VERTICES
  }
}

/// One quad's worth of vertex data.
#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
  pub positions: [Vec3; 4],
  pub normal: Vec3,
  /// Texture coordinates; ignored by buffers without a UV channel.
  pub uvs: [Vec3; 4],
}

/// Which attributes a buffer carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
  /// Positions, normals, layered UVs.
  Surface,
  /// Positions and normals only.
  Collision,
}

/// Growable vertex/index storage with free-list slot reuse.
#[derive(Clone, Debug)]
pub struct GeometryBuffer {
  kind: BufferKind,
  positions: Vec<[f32; 3]>,
  normals: Vec<[f32; 3]>,
  uvs: Vec<[f32; 3]>,
  indices: Vec<u32>,
  free: VecDeque<Slot>,
  /// One flag per run, set while the run sits in `free`.
  freed: Vec<bool>,
}

impl GeometryBuffer {
  pub fn new(kind: BufferKind) -> Self {
    Self {
      kind,
      positions: Vec::new(),
      normals: Vec::new(),
      uvs: Vec::new(),
      indices: Vec::new(),
      free: VecDeque::new(),
      freed: Vec::new(),
    }
  }

  pub fn surface() -> Self {
    Self::new(BufferKind::Surface)
  }

  pub fn collision() -> Self {
    Self::new(BufferKind::Collision)
  }

  pub fn kind(&self) -> BufferKind {
    self.kind
  }

  /// Reserves a run, reusing a freed one before growing.
  ///
  /// The returned run is zeroed until [`Self::write`] fills it.
  pub fn allocate(&mut self) -> Slot {
    if let Some(slot) = self.free.pop_front() {
      self.freed[slot.run()] = false;
      return slot;
    }

    let slot = Slot(self.positions.len() as u32);
    self.positions.extend([[0.0; 3]; QUAD_VERTICES]);
    self.normals.extend([[0.0; 3]; QUAD_VERTICES]);
    if self.kind == BufferKind::Surface {
      self.uvs.extend([[0.0; 3]; QUAD_VERTICES]);
    }
    self.indices.extend([0; QUAD_VERTICES]);
    self.freed.push(false);
    slot
  }

  /// Writes a primitive into an allocated run and links its indices.
  pub fn write(&mut self, slot: Slot, primitive: &Primitive) {
    let base = slot.offset();
    debug_assert!(base + QUAD_VERTICES <= self.positions.len(), "slot out of range");
    debug_assert!(!self.is_free(slot), "write to freed slot {slot:?}");

    for i in 0..QUAD_VERTICES {
      self.positions[base + i] = primitive.positions[i].to_array();
      self.normals[base + i] = primitive.normal.to_array();
      if self.kind == BufferKind::Surface {
        self.uvs[base + i] = primitive.uvs[i].to_array();
      }
      self.indices[base + i] = (base + i) as u32;
    }
  }

  /// Allocates and writes in one step.
  pub fn insert(&mut self, primitive: &Primitive) -> Slot {
    let slot = self.allocate();
    self.write(slot, primitive);
    slot
  }

  /// Collapses a run to a degenerate primitive and queues it for reuse.
  pub fn free(&mut self, slot: Slot) {
    let base = slot.offset();
    if base + QUAD_VERTICES > self.indices.len() || self.is_free(slot) {
      debug_assert!(false, "invalid free of {slot:?}");
      warn!("Ignoring invalid free of geometry slot {:?}", slot);
      return;
    }

    self.indices[base..base + QUAD_VERTICES].fill(0);
    self.freed[slot.run()] = true;
    self.free.push_back(slot);
  }

  /// Returns true if the run is waiting in the free queue.
  pub fn is_free(&self, slot: Slot) -> bool {
    self.freed.get(slot.run()).copied().unwrap_or(false)
  }

  /// Freed runs in reuse order.
  pub fn free_slots(&self) -> impl Iterator<Item = Slot> + '_ {
    self.free.iter().copied()
  }

  /// Total runs ever allocated (live and freed).
  pub fn slot_count(&self) -> usize {
    self.positions.len() / QUAD_VERTICES
  }

  /// Runs currently referenced by a quad.
  pub fn live_count(&self) -> usize {
    self.slot_count() - self.free.len()
  }

  pub fn is_empty(&self) -> bool {
    self.live_count() == 0
  }

  pub fn positions(&self) -> &[[f32; 3]] {
    &self.positions
  }

  pub fn normals(&self) -> &[[f32; 3]] {
    &self.normals
  }

  pub fn uvs(&self) -> &[[f32; 3]] {
    &self.uvs
  }

  /// Quad index array, four entries per run.
  pub fn indices(&self) -> &[u32] {
    &self.indices
  }

  /// Drops all storage, returning the buffer to its initial state.
  pub fn clear(&mut self) {
    self.positions.clear();
    self.normals.clear();
    self.uvs.clear();
    self.indices.clear();
    self.free.clear();
    self.freed.clear();
  }

  /// Builds a triangle-list mesh, two triangles per run.
  ///
  /// Freed runs become zero-area triangles, matching the stored indices.
  pub fn to_mesh(&self) -> Mesh {
    let mut triangles = Vec::with_capacity(self.indices.len() / QUAD_VERTICES * 6);
    for quad in self.indices.chunks_exact(QUAD_VERTICES) {
      triangles.extend_from_slice(&[quad[0], quad[1], quad[2], quad[0], quad[2], quad[3]]);
    }

    let mut mesh = Mesh::new(
      PrimitiveTopology::TriangleList,
      RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, self.positions.clone())
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals.clone());

    if self.kind == BufferKind::Surface {
      let plain: Vec<[f32; 2]> = self.uvs.iter().map(|uv| [uv[0], uv[1]]).collect();
      mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, plain);
      mesh.insert_attribute(ATTRIBUTE_LAYERED_UV, self.uvs.clone());
    }

    mesh.with_inserted_indices(Indices::U32(triangles))
  }
}
