//! Wavefront OBJ parsing.
//!
//! Only the geometry subset is understood: `v`, `vt`, `vn` and `f`. Faces
//! with more than three corners are fan-triangulated while parsing, so every
//! [`Face`] is a triangle.

use std::{
    fmt::Display,
    fs::File,
    io::{
        BufRead,
        BufReader,
    },
    path::Path,
    str::FromStr,
};

use nalgebra::{
    Vector2,
    Vector3,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjData {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub faces: Vec<Face>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    pub corners: [Corner; 3],
}

/// Zero-based indices into the attribute streams of [`ObjData`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Corner {
    pub position: u32,
    pub tex_coord: Option<u32>,
    pub normal: Option<u32>,
}

impl ObjData {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ObjError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading obj");

        let file = File::open(path).map_err(|error| ObjError::new(0, error))?;
        Self::parse(BufReader::new(file))
    }

    pub fn parse(reader: impl BufRead) -> Result<Self, ObjError> {
        let mut parser = Parser::default();

        for (i, line) in reader.lines().enumerate() {
            let line_number = i + 1;
            let line = line.map_err(|error| ObjError::new(line_number, error))?;
            parser
                .parse_line(&line)
                .map_err(|kind| ObjError::new(line_number, kind))?;
        }

        let data = parser.data;
        tracing::debug!(
            positions = data.positions.len(),
            normals = data.normals.len(),
            tex_coords = data.tex_coords.len(),
            faces = data.faces.len(),
            "parsed obj"
        );

        Ok(data)
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    pub fn corner_count(&self) -> usize {
        self.faces.len() * 3
    }

    pub fn corners(&self) -> impl Iterator<Item = &Corner> {
        self.faces.iter().flat_map(|face| face.corners.iter())
    }

    pub fn has_normals(&self) -> bool {
        self.corners().all(|corner| corner.normal.is_some())
    }

    pub fn has_tex_coords(&self) -> bool {
        self.corners().all(|corner| corner.tex_coord.is_some())
    }

    pub fn face_positions(&self, face: &Face) -> [Vector3<f32>; 3] {
        face.corners
            .map(|corner| self.positions[corner.position as usize])
    }
}

impl FromStr for ObjData {
    type Err = ObjError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

#[derive(Debug, Default)]
struct Parser {
    data: ObjData,
    corners: Vec<Corner>,
}

impl Parser {
    fn parse_line(&mut self, line: &str) -> Result<(), ObjErrorKind> {
        let line = match line.split_once('#') {
            Some((content, _comment)) => content,
            None => line,
        };

        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next()
        else {
            return Ok(());
        };

        match keyword {
            "v" => {
                let [x, y, z] = parse_floats::<3>(&mut tokens, 3)?;
                self.data.positions.push(Vector3::new(x, y, z));
            }
            "vn" => {
                let [x, y, z] = parse_floats::<3>(&mut tokens, 3)?;
                self.data.normals.push(Vector3::new(x, y, z));
            }
            "vt" => {
                let [u, v] = parse_floats::<2>(&mut tokens, 1)?;
                self.data.tex_coords.push(Vector2::new(u, v));
            }
            "f" => self.parse_face(tokens)?,
            _ => {
                tracing::trace!(keyword, "ignoring obj statement");
            }
        }

        Ok(())
    }

    fn parse_face<'a>(&mut self, tokens: impl Iterator<Item = &'a str>) -> Result<(), ObjErrorKind> {
        self.corners.clear();
        for token in tokens {
            let corner = self.parse_corner(token)?;
            self.corners.push(corner);
        }

        if self.corners.len() < 3 {
            return Err(ObjErrorKind::DegenerateFace(self.corners.len()));
        }

        let first = self.corners[0];
        for pair in self.corners[1..].windows(2) {
            self.data.faces.push(Face {
                corners: [first, pair[0], pair[1]],
            });
        }

        Ok(())
    }

    fn parse_corner(&self, token: &str) -> Result<Corner, ObjErrorKind> {
        let malformed = || ObjErrorKind::MalformedCorner(token.to_owned());

        let mut parts = token.split('/');
        let position = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let tex_coord = parts.next();
        let normal = parts.next();
        if parts.next().is_some() {
            return Err(malformed());
        }

        let tex_coord = match (tex_coord, normal) {
            (Some(""), None) => return Err(malformed()),
            (Some(""), Some(_)) | (None, _) => None,
            (Some(index), _) => {
                Some(resolve_index(
                    index,
                    self.data.tex_coords.len(),
                    Stream::TexCoord,
                )?)
            }
        };

        let normal = match normal {
            Some("") => return Err(malformed()),
            Some(index) => Some(resolve_index(index, self.data.normals.len(), Stream::Normal)?),
            None => None,
        };

        Ok(Corner {
            position: resolve_index(position, self.data.positions.len(), Stream::Position)?,
            tex_coord,
            normal,
        })
    }
}

/// Parses up to `N` floats, requiring at least `required`. Missing optional
/// components are 0. Anything past `N` is ignored.
fn parse_floats<'a, const N: usize>(
    tokens: &mut impl Iterator<Item = &'a str>,
    required: usize,
) -> Result<[f32; N], ObjErrorKind> {
    let mut values = [0.0; N];
    let mut found = 0;

    for (value, token) in values.iter_mut().zip(tokens) {
        *value = token
            .parse()
            .map_err(|_| ObjErrorKind::InvalidNumber(token.to_owned()))?;
        found += 1;
    }

    if found < required {
        return Err(ObjErrorKind::MissingComponent {
            expected: required,
            found,
        });
    }

    Ok(values)
}

fn resolve_index(token: &str, len: usize, stream: Stream) -> Result<u32, ObjErrorKind> {
    let index: i64 = token
        .parse()
        .map_err(|_| ObjErrorKind::InvalidIndex(token.to_owned()))?;

    let out_of_range = || ObjErrorKind::IndexOutOfRange { stream, index, len };

    let resolved = match index {
        0 => return Err(ObjErrorKind::ZeroIndex),
        1.. => index - 1,
        _ => len as i64 + index,
    };

    if resolved < 0 || resolved >= len as i64 {
        return Err(out_of_range());
    }

    u32::try_from(resolved).map_err(|_| out_of_range())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Position,
    TexCoord,
    Normal,
}

impl Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position => write!(f, "position"),
            Self::TexCoord => write!(f, "texture coordinate"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("obj error {}", location(.line))]
pub struct ObjError {
    /// 1-based line number. 0 if the file couldn't be opened.
    pub line: usize,
    #[source]
    pub kind: ObjErrorKind,
}

impl ObjError {
    fn new(line: usize, kind: impl Into<ObjErrorKind>) -> Self {
        Self {
            line,
            kind: kind.into(),
        }
    }
}

fn location(line: &usize) -> String {
    if *line == 0 {
        "opening file".to_owned()
    }
    else {
        format!("on line {line}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObjErrorKind {
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("expected at least {expected} components, found {found}")]
    MissingComponent { expected: usize, found: usize },
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error("indices start at 1")]
    ZeroIndex,
    #[error("{stream} index {index} is out of range ({len} defined so far)")]
    IndexOutOfRange {
        stream: Stream,
        index: i64,
        len: usize,
    },
    #[error("face has only {0} corners")]
    DegenerateFace(usize),
    #[error("malformed face corner: {0}")]
    MalformedCorner(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "
# a single triangle
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
";

    fn corner(position: u32, tex_coord: Option<u32>, normal: Option<u32>) -> Corner {
        Corner {
            position,
            tex_coord,
            normal,
        }
    }

    #[test]
    fn it_parses_attribute_streams() {
        let obj: ObjData = TRIANGLE.parse().unwrap();

        assert_eq!(obj.positions.len(), 3);
        assert_eq!(obj.positions[1], Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(obj.tex_coords[2], Vector2::new(0.0, 1.0));
        assert_eq!(obj.normals, vec![Vector3::new(0.0, 0.0, 1.0)]);
        assert_eq!(obj.triangle_count(), 1);
        assert_eq!(obj.corner_count(), 3);
        assert!(obj.has_normals());
        assert!(obj.has_tex_coords());
    }

    #[test]
    fn it_converts_indices_to_zero_based() {
        let obj: ObjData = TRIANGLE.parse().unwrap();
        assert_eq!(
            obj.faces[0].corners,
            [
                corner(0, Some(0), Some(0)),
                corner(1, Some(1), Some(0)),
                corner(2, Some(2), Some(0)),
            ]
        );
    }

    #[test]
    fn it_parses_all_corner_forms() {
        let obj: ObjData = "
v 0 0 0
v 1 0 0
v 0 1 0
vt 0.5 0.5
vn 0 0 1
f 1 2 3
f 1/1 2/1 3/1
f 1//1 2//1 3//1
f 1/1/1 2/1/1 3/1/1
"
        .parse()
        .unwrap();

        let first_corners = obj
            .faces
            .iter()
            .map(|face| face.corners[0])
            .collect::<Vec<_>>();

        assert_eq!(
            first_corners,
            vec![
                corner(0, None, None),
                corner(0, Some(0), None),
                corner(0, None, Some(0)),
                corner(0, Some(0), Some(0)),
            ]
        );
        assert!(!obj.has_normals());
        assert!(!obj.has_tex_coords());
    }

    #[test]
    fn it_resolves_negative_indices() {
        let obj: ObjData = "
v 0 0 0
v 1 0 0
v 0 1 0
f -3 -2 -1
v 5 5 5
f -1 -2 -3
"
        .parse()
        .unwrap();

        let positions = |i: usize| obj.faces[i].corners.map(|c| c.position);
        assert_eq!(positions(0), [0, 1, 2]);
        assert_eq!(positions(1), [3, 2, 1]);
    }

    #[test]
    fn it_fan_triangulates_polygons() {
        let obj: ObjData = "
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v -1 1 0
f 1 2 3 4 5
"
        .parse()
        .unwrap();

        let triangles = obj
            .faces
            .iter()
            .map(|face| face.corners.map(|c| c.position))
            .collect::<Vec<_>>();
        assert_eq!(triangles, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn it_ignores_comments_and_unsupported_statements() {
        let obj: ObjData = "
mtllib bunny.mtl
o bunny
g body
s 1
usemtl fur
v 0 0 0 # origin
v 1 0 0 1.0
v 0 1 0
vt 0.25
l 1 2
f 1 2 3 # trailing comment
"
        .parse()
        .unwrap();

        assert_eq!(obj.positions.len(), 3);
        assert_eq!(obj.tex_coords, vec![Vector2::new(0.25, 0.0)]);
        assert_eq!(obj.faces.len(), 1);
    }

    #[test]
    fn it_reports_line_numbers() {
        let error = "v 0 0 0\nv 1 0 0\nv 0 1\n".parse::<ObjData>().unwrap_err();
        assert_eq!(error.line, 3);
        assert_eq!(error.to_string(), "obj error on line 3");
        assert!(matches!(
            error.kind,
            ObjErrorKind::MissingComponent {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn it_rejects_bad_numbers() {
        let error = "v 0 zero 0".parse::<ObjData>().unwrap_err();
        assert!(matches!(error.kind, ObjErrorKind::InvalidNumber(s) if s == "zero"));

        let error = "v 0 0 0\nf 1 1 x".parse::<ObjData>().unwrap_err();
        assert!(matches!(error.kind, ObjErrorKind::InvalidIndex(s) if s == "x"));
    }

    #[test]
    fn it_rejects_bad_indices() {
        let error = "v 0 0 0\nf 0 1 1".parse::<ObjData>().unwrap_err();
        assert!(matches!(error.kind, ObjErrorKind::ZeroIndex));

        // indices only refer to vertices defined before the face
        let error = "v 0 0 0\nv 1 0 0\nf 1 2 3\nv 0 1 0"
            .parse::<ObjData>()
            .unwrap_err();
        assert_eq!(error.line, 3);
        assert!(matches!(
            error.kind,
            ObjErrorKind::IndexOutOfRange {
                stream: Stream::Position,
                index: 3,
                len: 2
            }
        ));

        let error = "v 0 0 0\nf 1/1 1/1 1/1".parse::<ObjData>().unwrap_err();
        assert!(matches!(
            error.kind,
            ObjErrorKind::IndexOutOfRange {
                stream: Stream::TexCoord,
                ..
            }
        ));

        let error = "v 0 0 0\nf -2 1 1".parse::<ObjData>().unwrap_err();
        assert!(matches!(error.kind, ObjErrorKind::IndexOutOfRange { .. }));
    }

    #[test]
    fn it_rejects_malformed_faces() {
        let error = "v 0 0 0\nf 1 1".parse::<ObjData>().unwrap_err();
        assert!(matches!(error.kind, ObjErrorKind::DegenerateFace(2)));

        for face in ["f /1 1 1", "f 1/ 1 1", "f 1/1/1/1 1 1", "f 1// 1 1"] {
            let source = format!("v 0 0 0\nvt 0 0\nvn 0 0 1\n{face}");
            let error = source.parse::<ObjData>().unwrap_err();
            assert!(
                matches!(error.kind, ObjErrorKind::MalformedCorner(_)),
                "{face}: {error:?}"
            );
        }
    }

    #[test]
    fn it_reports_missing_files() {
        let error = ObjData::open("/nonexistent/bunny.obj").unwrap_err();
        assert_eq!(error.line, 0);
        assert_eq!(error.to_string(), "obj error opening file");
        assert!(matches!(error.kind, ObjErrorKind::Io(_)));
    }
}
