use std::path::PathBuf;

use glclass_protocol::assets::AssetId;
use serde::Deserialize;

use crate::mesh::MeshOptions;

/// Contents of an `Assets.toml` file.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub mesh: Vec<Asset<Mesh>>,

    #[serde(default)]
    pub texture: Vec<Asset<Texture>>,
}

#[derive(Debug, Deserialize)]
pub struct Asset<T> {
    pub id: AssetId,

    pub label: Option<String>,

    #[serde(flatten)]
    pub inner: T,
}

#[derive(Debug, Deserialize)]
pub struct Mesh {
    pub path: Option<PathBuf>,

    #[serde(flatten)]
    pub options: MeshOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Texture {
    pub path: Option<PathBuf>,

    #[serde(default = "default_flip_vertical")]
    pub flip_vertical: bool,
}

fn default_flip_vertical() -> bool {
    true
}
