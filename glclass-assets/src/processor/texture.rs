use std::{
    fs::File,
    io::{
        BufWriter,
        Write,
    },
    path::Path,
};

use image::{
    DynamicImage,
    ImageFormat,
    ImageReader,
};

use crate::{
    dist,
    ppm::Pixmap,
    processor::{
        or_default_filename,
        Process,
        Processor,
    },
    source::{
        Asset,
        Texture,
    },
    Error,
};

const NETPBM_EXTENSIONS: &[&str] = &["ppm", "pgm", "pnm"];

impl Process for Asset<Texture> {
    fn process(&self, processor: &mut Processor, manifest_path: &Path) -> Result<(), Error> {
        let path = or_default_filename(
            self.inner.path.as_deref(),
            self.id,
            self.label.as_deref(),
            manifest_path,
            &["ppm", "pgm", "pnm", "png", "jpg", "jpeg"],
        )?;

        tracing::debug!(id = %self.id, label = ?self.label, path = %path.display(), "processing image");

        let image = load_texture(&path, self.inner.flip_vertical)?;

        let filename = format!("{}.png", self.id);
        let mut writer = BufWriter::new(File::create(processor.dist_path.join(&filename))?);
        image.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush()?;

        processor.dist_manifest.textures.push(dist::Texture {
            id: self.id,
            label: self.label.clone(),
            build_time: processor.build_time(),
            image: filename,
            size: dist::TextureSize {
                w: image.width(),
                h: image.height(),
            },
            flipped: self.inner.flip_vertical,
        });

        Ok(())
    }
}

/// Loads a texture image, optionally flipped so that the first row is the
/// bottom one.
///
/// Netpbm files are read with [`Pixmap`], anything else is handed to the
/// `image` crate.
pub fn load_texture(path: impl AsRef<Path>, flip_vertical: bool) -> Result<DynamicImage, Error> {
    let path = path.as_ref();

    let is_netpbm = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            NETPBM_EXTENSIONS
                .iter()
                .any(|netpbm| ext.eq_ignore_ascii_case(netpbm))
        });

    if is_netpbm {
        let mut pixmap = Pixmap::open(path)?;
        if flip_vertical {
            pixmap.flip_vertical();
        }
        Ok(DynamicImage::ImageRgb8(pixmap.into()))
    }
    else {
        let image = ImageReader::open(path)?.decode()?;
        if flip_vertical {
            Ok(image.flipv())
        }
        else {
            Ok(image)
        }
    }
}
