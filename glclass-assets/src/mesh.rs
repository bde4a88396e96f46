//! Expands parsed OBJ data into an interleaved, GPU-ready [`MeshData`].
//!
//! OBJ corners index positions, texture coordinates and normals separately,
//! while a vertex buffer has a single index per vertex. Each corner is
//! resolved to a full [`Vertex`], computing normals and texture coordinates
//! when the file doesn't provide them, and the vertices are either emitted
//! once per corner or deduplicated.

use std::{
    collections::HashMap,
    f32::consts::PI,
    str::FromStr,
};

use glclass_protocol::mesh::{
    MeshData,
    PrimitiveTopology,
    Vertex,
    WindingOrder,
};
use nalgebra::{
    Point3,
    Vector2,
    Vector3,
};
use serde::Deserialize;

use crate::obj::{
    ObjData,
    Stream,
};

const FALLBACK_NORMAL: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalMode {
    /// Use the normals from the file if every corner has one, otherwise
    /// compute smooth normals.
    #[default]
    Auto,
    File,
    Flat,
    Smooth,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TexCoordMode {
    /// Use the texture coordinates from the file if every corner has one,
    /// otherwise use a spherical projection.
    #[default]
    Auto,
    File,
    Zero,
    Spherical,
    Planar,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Indexing {
    /// One vertex per face corner.
    Flat,
    /// Corners that resolve to identical vertices share one.
    #[default]
    Deduplicated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MeshOptions {
    pub normals: NormalMode,
    pub tex_coords: TexCoordMode,
    pub indexing: Indexing,
    /// Center the mesh at the origin and scale its longest side to 2.
    pub normalize: bool,
    pub winding_order: WindingOrder,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    pub fn from_points(points: impl IntoIterator<Item = Point3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |bounds, point| {
                Self {
                    min: bounds.min.inf(&point),
                    max: bounds.max.sup(&point),
                }
            },
        ))
    }

    /// Bounds of the positions referenced by faces.
    pub fn of_obj(obj: &ObjData) -> Option<Self> {
        Self::from_points(
            obj.corners()
                .filter_map(|corner| obj.positions.get(corner.position as usize))
                .map(|position| Point3::from(*position)),
        )
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn longest_side(&self) -> f32 {
        self.extent().max()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MeshBuilder {
    pub options: MeshOptions,
}

impl MeshBuilder {
    pub fn new(options: MeshOptions) -> Self {
        Self { options }
    }

    pub fn build(&self, obj: &ObjData) -> Result<MeshData, MeshError> {
        if obj.faces.is_empty() {
            return Err(MeshError::Empty);
        }
        validate_indices(obj)?;

        let bounds = Bounds::of_obj(obj).ok_or(MeshError::Empty)?;
        let normals = self.normal_source(obj)?;
        let tex_coords = self.tex_coord_source(obj)?;
        tracing::debug!(?normals, ?tex_coords, options = ?self.options, "building mesh");

        let transform = if self.options.normalize {
            let longest_side = bounds.longest_side();
            let scale = if longest_side > 0.0 {
                2.0 / longest_side
            }
            else {
                1.0
            };
            Some((bounds.center(), scale))
        }
        else {
            None
        };

        let smooth_normals = match normals {
            NormalSource::Smooth => smooth_normals(obj),
            _ => vec![],
        };

        let corner_order = match self.options.winding_order {
            WindingOrder::CounterClockwise => [0, 1, 2],
            WindingOrder::Clockwise => [0, 2, 1],
        };

        let mut emitter = Emitter::new(self.options.indexing, obj.corner_count());

        for face in &obj.faces {
            let face_positions = obj.face_positions(face);
            let face_normal = flat_normal(&face_positions);

            for i in corner_order {
                let corner = &face.corners[i];
                let position = face_positions[i];

                let normal = match normals {
                    NormalSource::File => {
                        corner
                            .normal
                            .map(|index| obj.normals[index as usize])
                            .unwrap_or(FALLBACK_NORMAL)
                    }
                    NormalSource::Flat => face_normal,
                    NormalSource::Smooth => smooth_normals[corner.position as usize],
                };

                let tex_coord = match tex_coords {
                    TexCoordSource::File => {
                        corner
                            .tex_coord
                            .map(|index| obj.tex_coords[index as usize])
                            .unwrap_or_else(Vector2::zeros)
                    }
                    TexCoordSource::Zero => Vector2::zeros(),
                    TexCoordSource::Spherical => spherical_tex_coord(&bounds, &position),
                    TexCoordSource::Planar => planar_tex_coord(&bounds, &position),
                };

                let position = match transform {
                    Some((center, scale)) => (Point3::from(position) - center) * scale,
                    None => position,
                };

                emitter.emit(Vertex {
                    position: position.into(),
                    normal: normal.into(),
                    tex_coords: tex_coord.into(),
                })?;
            }
        }

        let (vertices, indices) = emitter.finish();
        tracing::debug!(
            vertices = vertices.len(),
            indices = indices.len(),
            "built mesh"
        );

        Ok(MeshData {
            primitive_topology: PrimitiveTopology::TriangleList,
            winding_order: self.options.winding_order,
            indices,
            vertices,
        })
    }

    fn normal_source(&self, obj: &ObjData) -> Result<NormalSource, MeshError> {
        let missing = || obj.corners().filter(|corner| corner.normal.is_none()).count();

        match self.options.normals {
            NormalMode::Auto => {
                if obj.has_normals() {
                    Ok(NormalSource::File)
                }
                else {
                    tracing::warn!(missing = missing(), "obj lacks normals. computing smooth normals.");
                    Ok(NormalSource::Smooth)
                }
            }
            NormalMode::File => {
                match missing() {
                    0 => Ok(NormalSource::File),
                    missing => Err(MeshError::MissingNormals { missing }),
                }
            }
            NormalMode::Flat => Ok(NormalSource::Flat),
            NormalMode::Smooth => Ok(NormalSource::Smooth),
        }
    }

    fn tex_coord_source(&self, obj: &ObjData) -> Result<TexCoordSource, MeshError> {
        let missing = || {
            obj.corners()
                .filter(|corner| corner.tex_coord.is_none())
                .count()
        };

        match self.options.tex_coords {
            TexCoordMode::Auto => {
                if obj.has_tex_coords() {
                    Ok(TexCoordSource::File)
                }
                else {
                    tracing::warn!(
                        missing = missing(),
                        "obj lacks texture coordinates. using spherical projection."
                    );
                    Ok(TexCoordSource::Spherical)
                }
            }
            TexCoordMode::File => {
                match missing() {
                    0 => Ok(TexCoordSource::File),
                    missing => Err(MeshError::MissingTexCoords { missing }),
                }
            }
            TexCoordMode::Zero => Ok(TexCoordSource::Zero),
            TexCoordMode::Spherical => Ok(TexCoordSource::Spherical),
            TexCoordMode::Planar => Ok(TexCoordSource::Planar),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum NormalSource {
    File,
    Flat,
    Smooth,
}

#[derive(Clone, Copy, Debug)]
enum TexCoordSource {
    File,
    Zero,
    Spherical,
    Planar,
}

struct Emitter {
    indexing: Indexing,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    seen: HashMap<[u32; 8], u32>,
}

impl Emitter {
    fn new(indexing: Indexing, corner_count: usize) -> Self {
        let vertex_capacity = match indexing {
            Indexing::Flat => corner_count,
            Indexing::Deduplicated => corner_count / 2,
        };
        Self {
            indexing,
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(corner_count),
            seen: HashMap::new(),
        }
    }

    fn emit(&mut self, vertex: Vertex) -> Result<(), MeshError> {
        let index = match self.indexing {
            Indexing::Flat => self.push(vertex)?,
            Indexing::Deduplicated => {
                let key = vertex_key(&vertex);
                match self.seen.get(&key) {
                    Some(&index) => index,
                    None => {
                        let index = self.push(vertex)?;
                        self.seen.insert(key, index);
                        index
                    }
                }
            }
        };
        self.indices.push(index);
        Ok(())
    }

    fn push(&mut self, vertex: Vertex) -> Result<u32, MeshError> {
        let index = u32::try_from(self.vertices.len()).map_err(|_| MeshError::TooManyVertices)?;
        self.vertices.push(vertex);
        Ok(index)
    }

    fn finish(self) -> (Vec<Vertex>, Vec<u32>) {
        (self.vertices, self.indices)
    }
}

/// Vertices are only merged if they are bit-identical, so `-0.0` and `0.0`
/// stay distinct.
fn vertex_key(vertex: &Vertex) -> [u32; 8] {
    let floats = vertex
        .position
        .iter()
        .chain(&vertex.normal)
        .chain(&vertex.tex_coords);
    let mut key = [0; 8];
    for (k, f) in key.iter_mut().zip(floats) {
        *k = f.to_bits();
    }
    key
}

fn validate_indices(obj: &ObjData) -> Result<(), MeshError> {
    let check = |index: u32, len: usize, stream: Stream| {
        if index as usize >= len {
            Err(MeshError::IndexOutOfRange { stream, index, len })
        }
        else {
            Ok(())
        }
    };

    for corner in obj.corners() {
        check(corner.position, obj.positions.len(), Stream::Position)?;
        if let Some(index) = corner.tex_coord {
            check(index, obj.tex_coords.len(), Stream::TexCoord)?;
        }
        if let Some(index) = corner.normal {
            check(index, obj.normals.len(), Stream::Normal)?;
        }
    }

    Ok(())
}

/// Unnormalized face normal. Its length is twice the triangle's area.
fn face_cross(positions: &[Vector3<f32>; 3]) -> Vector3<f32> {
    (positions[1] - positions[0]).cross(&(positions[2] - positions[0]))
}

fn flat_normal(positions: &[Vector3<f32>; 3]) -> Vector3<f32> {
    face_cross(positions)
        .try_normalize(f32::MIN_POSITIVE)
        .unwrap_or(FALLBACK_NORMAL)
}

/// Area-weighted average of the normals of all faces sharing a position.
fn smooth_normals(obj: &ObjData) -> Vec<Vector3<f32>> {
    let mut sums = vec![Vector3::zeros(); obj.positions.len()];

    for face in &obj.faces {
        let cross = face_cross(&obj.face_positions(face));
        for corner in &face.corners {
            sums[corner.position as usize] += cross;
        }
    }

    sums.into_iter()
        .map(|sum| sum.try_normalize(f32::MIN_POSITIVE).unwrap_or(FALLBACK_NORMAL))
        .collect()
}

fn spherical_tex_coord(bounds: &Bounds, position: &Vector3<f32>) -> Vector2<f32> {
    let offset = Point3::from(*position) - bounds.center();
    let Some(direction) = offset.try_normalize(f32::MIN_POSITIVE)
    else {
        return Vector2::new(0.5, 0.5);
    };

    Vector2::new(
        0.5 + direction.z.atan2(direction.x) / (2.0 * PI),
        0.5 + direction.y.clamp(-1.0, 1.0).asin() / PI,
    )
}

fn planar_tex_coord(bounds: &Bounds, position: &Vector3<f32>) -> Vector2<f32> {
    let extent = bounds.extent();
    let axis = |value: f32, min: f32, extent: f32| {
        if extent > 0.0 {
            (value - min) / extent
        }
        else {
            0.0
        }
    };
    Vector2::new(
        axis(position.x, bounds.min.x, extent.x),
        axis(position.y, bounds.min.y, extent.y),
    )
}

macro_rules! impl_from_str {
    ($ty:ident { $($name:literal => $variant:ident,)* }) => {
        impl FromStr for $ty {
            type Err = UnknownMode;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)*
                    _ => Err(UnknownMode {
                        value: s.to_owned(),
                        expected: &[$($name),*],
                    }),
                }
            }
        }
    };
}

impl_from_str!(NormalMode {
    "auto" => Auto,
    "file" => File,
    "flat" => Flat,
    "smooth" => Smooth,
});

impl_from_str!(TexCoordMode {
    "auto" => Auto,
    "file" => File,
    "zero" => Zero,
    "spherical" => Spherical,
    "planar" => Planar,
});

impl_from_str!(Indexing {
    "flat" => Flat,
    "deduplicated" => Deduplicated,
});

#[derive(Debug, thiserror::Error)]
#[error("unknown mode {value:?}, expected one of {}", .expected.join(", "))]
pub struct UnknownMode {
    pub value: String,
    pub expected: &'static [&'static str],
}

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("mesh has no faces")]
    Empty,
    #[error("normals must come from the file, but {missing} corners have none")]
    MissingNormals { missing: usize },
    #[error("texture coordinates must come from the file, but {missing} corners have none")]
    MissingTexCoords { missing: usize },
    #[error("{stream} index {index} is out of range ({len} defined)")]
    IndexOutOfRange {
        stream: Stream,
        index: u32,
        len: usize,
    },
    #[error("mesh has more than {} vertices", u32::MAX)]
    TooManyVertices,
}
