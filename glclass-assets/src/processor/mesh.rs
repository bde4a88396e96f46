use std::{
    fs::File,
    io::{
        BufWriter,
        Write,
    },
    path::Path,
};

use crate::{
    dist,
    mesh::MeshBuilder,
    obj::ObjData,
    processor::{
        or_default_filename,
        Process,
        Processor,
    },
    source::{
        Asset,
        Mesh,
    },
    Error,
};

impl Process for Asset<Mesh> {
    fn process(&self, processor: &mut Processor, manifest_path: &Path) -> Result<(), Error> {
        let path = or_default_filename(
            self.inner.path.as_deref(),
            self.id,
            self.label.as_deref(),
            manifest_path,
            &["obj"],
        )?;

        tracing::debug!(id = %self.id, label = ?self.label, path = %path.display(), "processing mesh");

        let obj = ObjData::open(&path)?;
        let mesh = MeshBuilder::new(self.inner.options).build(&obj)?;

        let filename = format!("{}.mesh", self.id);
        let mut writer = BufWriter::new(File::create(processor.dist_path.join(&filename))?);
        mesh.write_to(&mut writer)?;
        writer.flush()?;

        processor.dist_manifest.meshes.push(dist::Mesh {
            id: self.id,
            label: self.label.clone(),
            build_time: processor.build_time(),
            mesh: filename,
            vertex_count: mesh.vertices.len(),
            index_count: mesh.indices.len(),
        });

        Ok(())
    }
}
