pub mod mesh;
pub mod texture;

use std::{
    collections::HashSet,
    fs::File,
    io::{
        BufWriter,
        Write,
    },
    path::{
        Path,
        PathBuf,
    },
};

use chrono::{
    DateTime,
    Utc,
};
use glclass_protocol::assets::{
    self as dist,
    AssetId,
};
use walkdir::WalkDir;

use crate::{
    source::Manifest,
    Error,
};

pub const MANIFEST_FILENAME: &str = "Assets.toml";
pub const DIST_MANIFEST_FILENAME: &str = "assets.json";

#[derive(Debug)]
pub struct Processor {
    dist_path: PathBuf,
    dist_manifest: dist::Manifest,
    processed_ids: HashSet<AssetId>,
}

impl Processor {
    pub fn new(dist_path: impl AsRef<Path>) -> Result<Self, Error> {
        let dist_path = dist_path.as_ref();
        std::fs::create_dir_all(dist_path)?;

        Ok(Self {
            dist_path: dist_path.to_owned(),
            dist_manifest: dist::Manifest::new(),
            processed_ids: HashSet::new(),
        })
    }

    pub fn build_time(&self) -> DateTime<Utc> {
        self.dist_manifest.build_time
    }

    pub fn process_directory(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "processing assets");

        for result in WalkDir::new(path).sort_by_file_name() {
            let entry = result?;

            if entry.file_name() == MANIFEST_FILENAME {
                self.process_manifest(entry.path())?;
            }
        }

        Ok(())
    }

    pub fn process_manifest(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "processing manifest");

        let toml = std::fs::read_to_string(path)?;
        let manifest: Manifest = toml::from_str(&toml)?;

        macro_rules! process {
            ($($field:ident),*) => {
                $(
                    for asset in &manifest.$field {
                        if !self.processed_ids.insert(asset.id) {
                            return Err(Error::DuplicateId { id: asset.id });
                        }
                        asset.process(self, path)?;
                    }
                )*
            };
        }

        process!(mesh, texture);

        Ok(())
    }

    /// Writes the dist manifest and returns it.
    pub fn finalize(self) -> Result<dist::Manifest, Error> {
        let mut writer = BufWriter::new(File::create(
            self.dist_path.join(DIST_MANIFEST_FILENAME),
        )?);
        serde_json::to_writer_pretty(&mut writer, &self.dist_manifest)?;
        writer.flush()?;

        tracing::info!(
            meshes = self.dist_manifest.meshes.len(),
            textures = self.dist_manifest.textures.len(),
            "finished build"
        );

        Ok(self.dist_manifest)
    }
}

pub trait Process {
    fn process(&self, processor: &mut Processor, manifest_path: &Path) -> Result<(), Error>;
}

/// Resolves the source file of an asset.
///
/// An explicit path is relative to the manifest. Otherwise a file named after
/// the asset's id or label, with one of `extensions`, is looked up next to the
/// manifest.
fn or_default_filename(
    path: Option<impl AsRef<Path>>,
    id: AssetId,
    label: Option<&str>,
    manifest_path: &Path,
    extensions: &[&str],
) -> Result<PathBuf, Error> {
    let dir = manifest_path.parent().unwrap_or(Path::new("."));

    if let Some(path) = path {
        return Ok(dir.join(path));
    }

    let derive_path = |prefix: &str, ext: &str| {
        let path = dir.join(format!("{prefix}.{ext}"));
        path.exists().then_some(path)
    };

    let id_str = id.to_string();

    for &ext in extensions {
        if let Some(id_path) = derive_path(&id_str, ext) {
            return Ok(id_path);
        }
        if let Some(label) = label {
            if let Some(label_path) = derive_path(label, ext) {
                return Ok(label_path);
            }
        }
    }

    Err(Error::FileNotFound { id })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use glclass_protocol::mesh::MeshData;

    use super::*;

    const TRIANGLE: &str = "
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
";

    const BUNNY_ID: &str = "1d5bb0a5-4f6f-4b2e-9d0e-5b0f6d0b8d3a";
    const FUR_ID: &str = "8f2a6c1e-7d3b-4a9f-b5e0-2c1d4e6f8a9b";

    fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn it_builds_a_directory() {
        let source = tempfile::tempdir().unwrap();
        let dist = tempfile::tempdir().unwrap();

        write(source.path().join("models/bunny.obj"), TRIANGLE);
        write(source.path().join("models/fur.ppm"), "P3 1 2 255 255 0 0 0 0 255");
        write(
            source.path().join("models/Assets.toml"),
            format!(
                r#"
[[mesh]]
id = "{BUNNY_ID}"
label = "bunny"
indexing = "flat"

[[texture]]
id = "{FUR_ID}"
path = "fur.ppm"
"#
            ),
        );

        let mut processor = Processor::new(dist.path()).unwrap();
        processor.process_directory(source.path()).unwrap();
        let manifest = processor.finalize().unwrap();

        let bunny_id: AssetId = BUNNY_ID.parse().unwrap();
        let mesh = manifest.mesh(bunny_id).unwrap();
        assert_eq!(mesh.label.as_deref(), Some("bunny"));
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.index_count, 3);

        let reader = File::open(dist.path().join(&mesh.mesh)).unwrap();
        let data = MeshData::read_from(reader).unwrap();
        assert_eq!(data.vertices.len(), 3);

        let fur_id: AssetId = FUR_ID.parse().unwrap();
        let texture = manifest.texture(fur_id).unwrap();
        assert_eq!(texture.size, dist::TextureSize { w: 1, h: 2 });
        assert!(texture.flipped);

        let image = image::open(dist.path().join(&texture.image))
            .unwrap()
            .to_rgb8();
        // flipped, so the blue bottom row comes first
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [255, 0, 0]);

        let reader = File::open(dist.path().join(DIST_MANIFEST_FILENAME)).unwrap();
        let written: dist::Manifest = serde_json::from_reader(reader).unwrap();
        assert_eq!(written.meshes.len(), 1);
        assert_eq!(written.textures.len(), 1);
    }

    #[test]
    fn it_rejects_duplicate_ids() {
        let source = tempfile::tempdir().unwrap();
        let dist = tempfile::tempdir().unwrap();

        write(source.path().join("a.obj"), TRIANGLE);
        write(
            source.path().join(MANIFEST_FILENAME),
            format!(
                r#"
[[mesh]]
id = "{BUNNY_ID}"
path = "a.obj"

[[mesh]]
id = "{BUNNY_ID}"
path = "a.obj"
"#
            ),
        );

        let mut processor = Processor::new(dist.path()).unwrap();
        let result = processor.process_directory(source.path());
        assert!(matches!(result, Err(Error::DuplicateId { .. })));
    }

    #[test]
    fn it_derives_filenames_from_id_or_label() {
        let source = tempfile::tempdir().unwrap();
        let manifest_path = source.path().join(MANIFEST_FILENAME);
        let id: AssetId = BUNNY_ID.parse().unwrap();

        write(source.path().join(format!("{BUNNY_ID}.obj")), TRIANGLE);
        write(source.path().join("bunny.ppm"), "P3 1 1 255 0 0 0");

        let path = or_default_filename(None::<&Path>, id, None, &manifest_path, &["obj"]).unwrap();
        assert_eq!(path, source.path().join(format!("{BUNNY_ID}.obj")));

        let path = or_default_filename(
            None::<&Path>,
            id,
            Some("bunny"),
            &manifest_path,
            &["ppm", "png"],
        )
        .unwrap();
        assert_eq!(path, source.path().join("bunny.ppm"));

        let path =
            or_default_filename(Some("x/y.obj"), id, None, &manifest_path, &["obj"]).unwrap();
        assert_eq!(path, source.path().join("x/y.obj"));

        let result = or_default_filename(None::<&Path>, id, Some("cat"), &manifest_path, &["png"]);
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }

    #[test]
    fn it_reports_broken_meshes() {
        let source = tempfile::tempdir().unwrap();
        let dist = tempfile::tempdir().unwrap();

        write(source.path().join("broken.obj"), "v 0 0 0\nf 1 2 3\n");
        write(
            source.path().join(MANIFEST_FILENAME),
            format!(
                r#"
[[mesh]]
id = "{BUNNY_ID}"
label = "broken"
"#
            ),
        );

        let mut processor = Processor::new(dist.path()).unwrap();
        let result = processor.process_directory(source.path());
        match result {
            Err(Error::Obj(error)) => assert_eq!(error.line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
