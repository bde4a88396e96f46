pub mod mesh;
pub mod obj;
pub mod ppm;
pub mod processor;
pub mod source;

use std::path::Path;

pub use glclass_protocol::assets::{
    self as dist,
    AssetId,
};
use glclass_protocol::ProtocolError;

pub use crate::{
    mesh::{
        MeshBuilder,
        MeshError,
        MeshOptions,
    },
    obj::{
        ObjData,
        ObjError,
    },
    ppm::{
        Pixmap,
        PpmError,
    },
    processor::{
        texture::load_texture,
        Processor,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("image error")]
    Image(#[from] image::ImageError),
    #[error("json error")]
    Json(#[from] serde_json::Error),
    #[error("could not parse asset manifest")]
    TomlDecode(#[from] toml::de::Error),
    #[error("could not walk source directory")]
    WalkDir(#[from] walkdir::Error),
    #[error("could not parse obj file")]
    Obj(#[from] ObjError),
    #[error("could not read netpbm image")]
    Ppm(#[from] PpmError),
    #[error("could not build mesh")]
    Mesh(#[from] MeshError),
    #[error("could not write mesh")]
    Protocol(#[from] ProtocolError),
    #[error("filename for asset {id} could not be determined")]
    FileNotFound { id: AssetId },
    #[error("asset id {id} is used more than once")]
    DuplicateId { id: AssetId },
}

/// Processes all `Assets.toml` manifests below `source_path` into
/// `dist_path`.
pub fn process(
    source_path: impl AsRef<Path>,
    dist_path: impl AsRef<Path>,
) -> Result<dist::Manifest, Error> {
    let mut processor = Processor::new(dist_path)?;
    processor.process_directory(source_path)?;
    processor.finalize()
}
