use std::fmt::Display;

use glclass_assets::{
    mesh::Bounds,
    ObjData,
};

#[derive(Debug)]
pub struct Summary<'a> {
    obj: &'a ObjData,
    bounds: Option<Bounds>,
}

impl<'a> Summary<'a> {
    pub fn new(obj: &'a ObjData) -> Self {
        Self {
            obj,
            bounds: Bounds::of_obj(obj),
        }
    }
}

impl<'a> Display for Summary<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let obj = self.obj;

        writeln!(f, "positions:           {}", obj.positions.len())?;
        writeln!(f, "normals:             {}", obj.normals.len())?;
        writeln!(f, "texture coordinates: {}", obj.tex_coords.len())?;
        writeln!(f, "triangles:           {}", obj.triangle_count())?;
        writeln!(
            f,
            "corner normals:      {}",
            if obj.has_normals() { "yes" } else { "no" }
        )?;
        writeln!(
            f,
            "corner tex coords:   {}",
            if obj.has_tex_coords() { "yes" } else { "no" }
        )?;

        if let Some(bounds) = &self.bounds {
            writeln!(
                f,
                "bounds:              ({}, {}, {}) .. ({}, {}, {})",
                bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
            )?;
        }

        if let Some(face) = obj.faces.first() {
            writeln!(f, "first triangle:")?;
            for position in obj.face_positions(face) {
                writeln!(f, "  ({}, {}, {})", position.x, position.y, position.z)?;
            }
        }

        Ok(())
    }
}
