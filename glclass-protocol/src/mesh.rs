use std::{
    io::{
        Read,
        Write,
    },
    mem::{
        offset_of,
        size_of,
    },
};

use bytemuck::{
    Pod,
    Zeroable,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::ProtocolError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub primitive_topology: PrimitiveTopology,
    pub winding_order: WindingOrder,
    pub indices: Vec<u32>,
    pub vertices: Vec<Vertex>,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangle_count(&self) -> usize {
        match self.primitive_topology {
            PrimitiveTopology::TriangleList => self.indices.len() / 3,
            PrimitiveTopology::TriangleStrip => self.indices.len().saturating_sub(2),
            _ => 0,
        }
    }

    /// Iterates over the vertices of each triangle of a triangle list.
    /// Triangles with an index past the vertex buffer are `None`.
    pub fn triangles(&self) -> impl Iterator<Item = Option<[&Vertex; 3]>> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            Some([
                self.vertices.get(t[0] as usize)?,
                self.vertices.get(t[1] as usize)?,
                self.vertices.get(t[2] as usize)?,
            ])
        })
    }

    pub fn write_to(&self, writer: impl Write) -> Result<(), ProtocolError> {
        let mut writer = writer;
        rmp_serde::encode::write(&mut writer, self)?;
        Ok(())
    }

    pub fn read_from(reader: impl Read) -> Result<Self, ProtocolError> {
        Ok(rmp_serde::from_read(reader)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindingOrder {
    Clockwise,
    #[default]
    CounterClockwise,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod, Serialize, Deserialize)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    /// Interleaved layout of [`Vertex`] in a vertex buffer.
    ///
    /// Attribute locations match the shader inputs: 0 = position, 1 = normal,
    /// 2 = texture coordinates.
    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: size_of::<Vertex>(),
        attributes: &[
            VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x3,
                offset: offset_of!(Vertex, position),
            },
            VertexAttribute {
                location: 1,
                format: VertexFormat::Float32x3,
                offset: offset_of!(Vertex, normal),
            },
            VertexAttribute {
                location: 2,
                format: VertexFormat::Float32x2,
                offset: offset_of!(Vertex, tex_coords),
            },
        ],
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: usize,
    pub attributes: &'static [VertexAttribute],
}

impl VertexLayout {
    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.location == location)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

impl VertexFormat {
    pub const fn components(&self) -> usize {
        match self {
            Self::Float32x2 => 2,
            Self::Float32x3 => 3,
        }
    }

    pub const fn size(&self) -> usize {
        self.components() * size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshData {
        let vertex = |x: f32, y: f32| {
            Vertex {
                position: [x, y, 0.0],
                normal: [0.0, 0.0, 1.0],
                tex_coords: [x, y],
            }
        };
        MeshData {
            primitive_topology: PrimitiveTopology::TriangleList,
            winding_order: WindingOrder::CounterClockwise,
            indices: vec![0, 1, 2, 0, 2, 3],
            vertices: vec![
                vertex(0.0, 0.0),
                vertex(1.0, 0.0),
                vertex(1.0, 1.0),
                vertex(0.0, 1.0),
            ],
        }
    }

    #[test]
    fn it_lays_out_vertices_interleaved() {
        let layout = Vertex::LAYOUT;
        assert_eq!(layout.stride, 32);

        let offsets = layout
            .attributes
            .iter()
            .map(|attribute| (attribute.location, attribute.offset))
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![(0, 0), (1, 12), (2, 24)]);

        let covered: usize = layout
            .attributes
            .iter()
            .map(|attribute| attribute.format.size())
            .sum();
        assert_eq!(covered, layout.stride);

        assert_eq!(
            layout.attribute(2).map(|attribute| attribute.format),
            Some(VertexFormat::Float32x2)
        );
        assert!(layout.attribute(3).is_none());
    }

    #[test]
    fn it_exposes_buffer_bytes() {
        let mesh = quad();
        assert_eq!(mesh.vertex_bytes().len(), 4 * 32);
        assert_eq!(mesh.index_bytes().len(), 6 * 4);

        let floats: &[f32] = bytemuck::cast_slice(mesh.vertex_bytes());
        // second vertex, position x
        assert_eq!(floats[8], 1.0);
        // second vertex, normal z
        assert_eq!(floats[13], 1.0);
    }

    #[test]
    fn it_counts_triangles() {
        let mut mesh = quad();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.triangles().count(), 2);
        assert!(mesh.triangles().all(|triangle| triangle.is_some()));

        mesh.primitive_topology = PrimitiveTopology::TriangleStrip;
        mesh.indices = vec![0, 1, 3, 2];
        assert_eq!(mesh.triangle_count(), 2);

        mesh.primitive_topology = PrimitiveTopology::PointList;
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn it_skips_triangles_with_dangling_indices() {
        let mut mesh = quad();
        mesh.indices[4] = 17;

        let triangles = mesh.triangles().collect::<Vec<_>>();
        assert_eq!(triangles.len(), 2);
        assert_eq!(
            triangles[0].map(|[a, _, _]| a.position),
            Some([0.0, 0.0, 0.0])
        );
        assert!(triangles[1].is_none());
    }

    #[test]
    fn it_reads_back_written_meshes() {
        let mesh = quad();
        let mut buf = vec![];
        mesh.write_to(&mut buf).unwrap();
        let read = MeshData::read_from(&buf[..]).unwrap();
        assert_eq!(read, mesh);
    }

    #[test]
    fn it_rejects_garbage_mesh_files() {
        let result = MeshData::read_from(&b"\xc1\xc1\xc1"[..]);
        assert!(matches!(result, Err(ProtocolError::MessagePackDecode(_))));
    }
}
