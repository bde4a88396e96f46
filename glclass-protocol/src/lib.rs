pub mod assets;
pub mod camera;
pub mod mesh;

pub use uuid;

#[derive(Debug, thiserror::Error)]
#[error("protocol error")]
pub enum ProtocolError {
    Io(#[from] std::io::Error),
    MessagePackDecode(#[from] rmp_serde::decode::Error),
    MessagePackEncode(#[from] rmp_serde::encode::Error),
}
