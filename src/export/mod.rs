//! Writing the optimized mesh, its textures and the light probe.

pub use crate::{
    distributed::Replica,
    error::Error,
    function::*,
    guidance::Guidance,
    render::{Renderer, UvMaps},
    scene::*,
    train::Trainer,
};

use image::{codecs::hdr::HdrEncoder, Rgb};
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub const MATERIAL_NAME: &str = "defaultMat";

impl<AB, G, R, S, P> Trainer<AB, G, R, S, P>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
    R: Renderer<AB, G>,
    S: Guidance<AB>,
    P: Replica,
{
    /// Exporting to `out_dir/mesh/`.
    pub fn export(
        &self,
        out_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, Error> {
        let directory = out_dir.as_ref().join("mesh");
        fs::create_dir_all(&directory)?;

        let maps = self.renderer.render_uv(
            &self.geometry,
            &self.material,
            self.config.texture_resolution,
            self.config.uv_padding_block,
        );
        let material = bake_material(maps).clamp(&self.config.material_bounds);
        let mesh = self.geometry.to_mesh()?;

        let mut obj = BufWriter::new(fs::File::create(directory.join("mesh.obj"))?);
        write_obj(&mut obj, &mesh, "mesh.mtl")?;
        obj.flush()?;

        let mut mtl = BufWriter::new(fs::File::create(directory.join("mesh.mtl"))?);
        write_mtl(&mut mtl)?;
        mtl.flush()?;

        save_textures(&directory, &material)?;
        save_probe(
            directory.join("probe.hdr"),
            &self.light,
            self.config.probe_resolution,
        )?;

        log::info!(
            target: "textmesh::trainer::export",
            "Trainer::export > {} vertices > {} triangles",
            mesh.positions.len(),
            mesh.triangles.len(),
        );

        Ok(directory)
    }
}

/// A material holding baked texture maps.
pub fn bake_material<B: Backend>(maps: UvMaps<B>) -> Material<B> {
    Material {
        kd: Some(Texture2d::new(maps.kd.detach())),
        ks: Some(Texture2d::new(maps.ks.detach())),
        normal: Some(Texture2d::new(maps.normal.detach())),
    }
}

/// Writing a Wavefront OBJ with 1-based face indices.
pub fn write_obj(
    writer: &mut impl Write,
    mesh: &Mesh,
    mtl_file_name: &str,
) -> Result<(), Error> {
    writeln!(writer, "mtllib {mtl_file_name}")?;
    writeln!(writer, "g default")?;
    for [x, y, z] in &mesh.positions {
        writeln!(writer, "v {x} {y} {z}")?;
    }
    for [u, v] in &mesh.uvs {
        writeln!(writer, "vt {u} {v}")?;
    }
    for [x, y, z] in &mesh.normals {
        writeln!(writer, "vn {x} {y} {z}")?;
    }

    writeln!(writer, "s 1")?;
    writeln!(writer, "g pMesh1")?;
    writeln!(writer, "usemtl {MATERIAL_NAME}")?;

    let has_uvs = !mesh.uvs.is_empty();
    let has_normals = !mesh.normals.is_empty();
    for triangle in &mesh.triangles {
        write!(writer, "f")?;
        for index in triangle.map(|index| index + 1) {
            match (has_uvs, has_normals) {
                (true, true) => write!(writer, " {index}/{index}/{index}")?,
                (true, false) => write!(writer, " {index}/{index}")?,
                (false, true) => write!(writer, " {index}//{index}")?,
                (false, false) => write!(writer, " {index}")?,
            }
        }
        writeln!(writer)?;
    }

    Ok(())
}

pub fn write_mtl(writer: &mut impl Write) -> Result<(), Error> {
    writeln!(writer, "newmtl {MATERIAL_NAME}")?;
    writeln!(writer, "bsdf pbr")?;
    writeln!(writer, "map_Kd texture_kd.png")?;
    writeln!(writer, "map_Ks texture_ks.png")?;
    writeln!(writer, "bump texture_n.png")?;
    Ok(())
}

/// Saving the present channels of `material` as PNG files in `directory`.
///
/// The diffuse channel is encoded to sRGB and normals to `[0, 1]`.
pub fn save_textures<B: Backend>(
    directory: impl AsRef<Path>,
    material: &Material<B>,
) -> Result<(), Error> {
    let directory = directory.as_ref();

    if let Some(kd) = &material.kd {
        let kd = kd.value();
        let [height, width, channel_count] = kd.dims();
        let rgb = rgb_to_srgb(kd.to_owned().slice([0..height, 0..width, 0..3]));
        let kd = if channel_count > 3 {
            Tensor::cat(vec![rgb, kd.slice([0..height, 0..width, 3..4])], 2)
        } else {
            rgb
        };
        get_image_from_tensor(kd)?.save(directory.join("texture_kd.png"))?;
    }
    if let Some(ks) = &material.ks {
        get_image_from_tensor(ks.value())?.save(directory.join("texture_ks.png"))?;
    }
    if let Some(normal) = &material.normal {
        get_image_from_tensor(normal_to_display(normal.value()))?
            .save(directory.join("texture_n.png"))?;
    }

    Ok(())
}

/// Saving the light unrolled to a latlong map of `[height, width]` as Radiance HDR.
pub fn save_probe<B: Backend>(
    path: impl AsRef<Path>,
    light: &EnvironmentLight<B>,
    [height, width]: [usize; 2],
) -> Result<(), Error> {
    let values = get_values_from_tensor(light.to_latlong([height, width])?)?;
    let pixels = values
        .chunks_exact(3)
        .map(|texel| Rgb([texel[0], texel[1], texel[2]]))
        .collect::<Vec<_>>();

    let writer = BufWriter::new(fs::File::create(path)?);
    HdrEncoder::new(writer).encode(&pixels, width, height)?;

    Ok(())
}
