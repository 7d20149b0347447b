//! Drawable geometry packed into shared GPU buffers.
//!
//! Meshes are sub-allocated by byte offset into one device-local vertex
//! buffer and one device-local index buffer rather than one buffer pair per
//! mesh. Callers retain their vertex/index arrays; the GPU backing is owned
//! here.

use aether_gpu::memory::{GpuBuffer, MemoryManager};
use aether_gpu::Result;
use ash::vk;

use crate::vertex::Vertex;

/// Caller-owned mesh data to be uploaded.
#[derive(Clone, Copy)]
pub struct Mesh<'a> {
    pub vertices: &'a [Vertex],
    pub indices: &'a [u16],
}

/// A read-only range into the shared vertex/index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drawable {
    /// Byte offset of the mesh's first vertex in the shared vertex buffer.
    pub vertex_offset: vk::DeviceSize,
    /// Byte offset of the mesh's first index in the shared index buffer.
    pub index_offset: vk::DeviceSize,
    /// Number of indices to draw.
    pub index_count: u32,
}

/// Concatenate meshes into contiguous vertex/index byte streams.
///
/// Returns the two streams plus one [`Drawable`] per input mesh whose
/// offsets point at that mesh's range.
pub fn pack_meshes(meshes: &[Mesh<'_>]) -> (Vec<u8>, Vec<u8>, Vec<Drawable>) {
    let mut vertex_bytes = Vec::new();
    let mut index_bytes = Vec::new();
    let mut drawables = Vec::with_capacity(meshes.len());

    for mesh in meshes {
        let drawable = Drawable {
            vertex_offset: vertex_bytes.len() as vk::DeviceSize,
            index_offset: index_bytes.len() as vk::DeviceSize,
            index_count: mesh.indices.len() as u32,
        };

        vertex_bytes.extend_from_slice(bytemuck::cast_slice(mesh.vertices));
        index_bytes.extend_from_slice(bytemuck::cast_slice(mesh.indices));
        drawables.push(drawable);
    }

    (vertex_bytes, index_bytes, drawables)
}

/// The shared device-local vertex and index buffers.
pub struct GeometryBuffers {
    vertex: GpuBuffer,
    index: GpuBuffer,
}

impl GeometryBuffers {
    /// Pack and upload meshes through the staging protocol.
    pub fn upload(
        memory: &MemoryManager,
        meshes: &[Mesh<'_>],
    ) -> Result<(Self, Vec<Drawable>)> {
        let (vertex_bytes, index_bytes, drawables) = pack_meshes(meshes);

        let vertex = memory
            .create_device_local_buffer(&vertex_bytes, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index = match memory
            .create_device_local_buffer(&index_bytes, vk::BufferUsageFlags::INDEX_BUFFER)
        {
            Ok(index) => index,
            Err(e) => {
                memory.destroy_buffer(vertex);
                return Err(e);
            }
        };

        tracing::info!(
            "Uploaded {} meshes ({} vertex bytes, {} index bytes)",
            drawables.len(),
            vertex_bytes.len(),
            index_bytes.len()
        );

        Ok((Self { vertex, index }, drawables))
    }

    /// The shared vertex buffer handle.
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex.buffer
    }

    /// The shared index buffer handle.
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index.buffer
    }

    /// Destroy both buffers with their memory.
    pub fn destroy(self, memory: &MemoryManager) {
        memory.destroy_buffer(self.vertex);
        memory.destroy_buffer(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> Vertex {
        Vertex {
            pos: [x, 0.0],
            color: [1.0, 1.0, 1.0],
            uv: [0.0, 0.0],
        }
    }

    #[test]
    fn single_mesh_starts_at_zero() {
        let vertices = [vertex(0.0), vertex(1.0), vertex(2.0), vertex(3.0)];
        let indices = [0u16, 1, 2, 2, 3, 0];
        let meshes = [Mesh {
            vertices: &vertices,
            indices: &indices,
        }];

        let (vertex_bytes, index_bytes, drawables) = pack_meshes(&meshes);

        assert_eq!(vertex_bytes.len(), 4 * Vertex::STRIDE as usize);
        assert_eq!(index_bytes.len(), 6 * 2);
        assert_eq!(
            drawables,
            vec![Drawable {
                vertex_offset: 0,
                index_offset: 0,
                index_count: 6,
            }]
        );
    }

    #[test]
    fn offsets_accumulate_across_meshes() {
        let quad_vertices = [vertex(0.0), vertex(1.0), vertex(2.0), vertex(3.0)];
        let quad_indices = [0u16, 1, 2, 2, 3, 0];
        let tri_vertices = [vertex(4.0), vertex(5.0), vertex(6.0)];
        let tri_indices = [0u16, 1, 2];

        let meshes = [
            Mesh {
                vertices: &quad_vertices,
                indices: &quad_indices,
            },
            Mesh {
                vertices: &tri_vertices,
                indices: &tri_indices,
            },
        ];

        let (vertex_bytes, index_bytes, drawables) = pack_meshes(&meshes);

        assert_eq!(drawables[1].vertex_offset, 4 * Vertex::STRIDE as u64);
        assert_eq!(drawables[1].index_offset, 12);
        assert_eq!(drawables[1].index_count, 3);
        assert_eq!(vertex_bytes.len(), 7 * Vertex::STRIDE as usize);
        assert_eq!(index_bytes.len(), 18);
    }

    #[test]
    fn packed_bytes_round_trip() {
        let vertices = [vertex(1.5), vertex(-2.5)];
        let indices = [1u16, 0];
        let meshes = [Mesh {
            vertices: &vertices,
            indices: &indices,
        }];

        let (vertex_bytes, index_bytes, _) = pack_meshes(&meshes);

        let unpacked: &[Vertex] = bytemuck::cast_slice(&vertex_bytes);
        assert_eq!(unpacked, &vertices);

        let unpacked_indices: &[u16] = bytemuck::cast_slice(&index_bytes);
        assert_eq!(unpacked_indices, &indices);
    }
}
