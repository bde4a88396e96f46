use std::{
    collections::HashSet,
    fmt::Display,
    str::FromStr,
};

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    pub fn generate() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    #[doc(hidden)]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

#[macro_export]
macro_rules! asset_id {
    ($lit:literal) => {
        ::glclass_protocol::assets::AssetId::from_uuid(::glclass_protocol::uuid::uuid!($lit))
    };
}

/// Index of everything a build wrote into the dist directory.
///
/// Serialized as `assets.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub build_time: DateTime<Utc>,

    #[serde(default)]
    pub meshes: Vec<Mesh>,

    #[serde(default)]
    pub textures: Vec<Texture>,
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            build_time: Utc::now(),
            meshes: vec![],
            textures: vec![],
        }
    }

    pub fn mesh(&self, id: AssetId) -> Option<&Mesh> {
        self.meshes.iter().find(|mesh| mesh.id == id)
    }

    pub fn texture(&self, id: AssetId) -> Option<&Texture> {
        self.textures.iter().find(|texture| texture.id == id)
    }

    pub fn all_files(&self) -> HashSet<&str> {
        self.meshes
            .iter()
            .map(|mesh| &*mesh.mesh)
            .chain(self.textures.iter().map(|texture| &*texture.image))
            .collect()
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mesh {
    pub id: AssetId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub build_time: DateTime<Utc>,

    pub mesh: String,

    pub vertex_count: usize,

    pub index_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Texture {
    pub id: AssetId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub build_time: DateTime<Utc>,

    pub image: String,

    pub size: TextureSize,

    /// Whether the first row of `image` is the bottom row, as OpenGL samples
    /// it.
    #[serde(default)]
    pub flipped: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSize {
    pub w: u32,
    pub h: u32,
}
