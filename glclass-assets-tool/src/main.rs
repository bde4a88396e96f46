mod inspect;

use std::{
    fs::File,
    io::{
        BufWriter,
        Write,
    },
    path::PathBuf,
};

use clap::Parser;
use color_eyre::eyre::{
    Error,
    WrapErr,
};
use glclass_assets::{
    load_texture,
    mesh::{
        Indexing,
        NormalMode,
        TexCoordMode,
    },
    process,
    AssetId,
    MeshBuilder,
    MeshOptions,
    ObjData,
};
use glclass_protocol::mesh::WindingOrder;

#[derive(Debug, Parser)]
pub enum Args {
    /// Print fresh asset ids.
    Id {
        #[arg(short, default_value = "1")]
        n: usize,
    },
    /// Process all `Assets.toml` manifests into the dist directory.
    Build {
        #[arg(long, env = "ASSETS", default_value = "./assets/source")]
        assets: PathBuf,

        #[arg(long, env = "DIST", default_value = "./assets/dist")]
        dist: PathBuf,
    },
    /// Print a summary of an OBJ file.
    Inspect { path: PathBuf },
    /// Convert an OBJ file into a mesh file.
    Convert {
        input: PathBuf,

        output: PathBuf,

        #[arg(long, default_value = "auto")]
        normals: NormalMode,

        #[arg(long, default_value = "auto")]
        tex_coords: TexCoordMode,

        /// Emit one vertex per face corner instead of deduplicating.
        #[arg(long)]
        flat: bool,

        /// Center the mesh and scale it to fit into [-1, 1].
        #[arg(long)]
        normalize: bool,

        #[arg(long)]
        clockwise: bool,
    },
    /// Convert a texture image (e.g. PPM) into PNG.
    Texture {
        input: PathBuf,

        output: PathBuf,

        /// Keep the first row at the top.
        #[arg(long)]
        no_flip: bool,
    },
}

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match args {
        Args::Id { n } => {
            for _ in 0..n {
                println!("{}", AssetId::generate());
            }
        }
        Args::Build { assets, dist } => {
            let manifest = process(&assets, &dist)
                .wrap_err_with(|| format!("failed to build assets in {}", assets.display()))?;
            println!(
                "built {} meshes and {} textures into {}",
                manifest.meshes.len(),
                manifest.textures.len(),
                dist.display()
            );
        }
        Args::Inspect { path } => {
            let obj = ObjData::open(&path)
                .wrap_err_with(|| format!("failed to load {}", path.display()))?;
            print!("{}", inspect::Summary::new(&obj));
        }
        Args::Convert {
            input,
            output,
            normals,
            tex_coords,
            flat,
            normalize,
            clockwise,
        } => {
            let options = MeshOptions {
                normals,
                tex_coords,
                indexing: if flat {
                    Indexing::Flat
                }
                else {
                    Indexing::Deduplicated
                },
                normalize,
                winding_order: if clockwise {
                    WindingOrder::Clockwise
                }
                else {
                    WindingOrder::CounterClockwise
                },
            };

            let obj = ObjData::open(&input)
                .wrap_err_with(|| format!("failed to load {}", input.display()))?;
            let mesh = MeshBuilder::new(options).build(&obj)?;

            let mut writer = BufWriter::new(File::create(&output)?);
            mesh.write_to(&mut writer)?;
            writer.flush()?;

            tracing::info!(
                vertices = mesh.vertices.len(),
                indices = mesh.indices.len(),
                output = %output.display(),
                "wrote mesh"
            );
        }
        Args::Texture {
            input,
            output,
            no_flip,
        } => {
            let image = load_texture(&input, !no_flip)
                .wrap_err_with(|| format!("failed to load {}", input.display()))?;
            image.save(&output)?;

            tracing::info!(
                width = image.width(),
                height = image.height(),
                output = %output.display(),
                "wrote texture"
            );
        }
    }

    Ok(())
}
