//! The rasterizer interface.

pub use crate::{
    batch::Batch,
    scene::{Geometry, LightMips, Material},
};
pub use burn::tensor::{
    backend::{AutodiffBackend, Backend},
    Tensor,
};

use serde::{Deserialize, Serialize};

/// A shading model overriding the full PBR shading.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bsdf {
    Pbr,
    Diffuse,
    Kd,
    Ks,
    Normal,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RenderOptions {
    /// `None` for the full PBR shading
    pub bsdf: Option<Bsdf>,
    pub coarse: bool,
    pub use_bump: bool,
    pub flip_normal: bool,
}

#[derive(Clone, Debug)]
pub struct RenderBuffers<B: Backend> {
    /// RGB and alpha, `[N, H, W, 4]`
    pub shaded: Tensor<B, 4>,
}

/// Material channels baked to the texture space of a mesh.
#[derive(Clone, Debug)]
pub struct UvMaps<B: Backend> {
    /// `[H, W, 1]`
    pub mask: Tensor<B, 3>,
    /// `[H, W, 3]` or `[H, W, 4]`
    pub kd: Tensor<B, 3>,
    /// `[H, W, 3]`
    pub ks: Tensor<B, 3>,
    /// `[H, W, 3]`
    pub normal: Tensor<B, 3>,
}

pub trait Renderer<AB: AutodiffBackend, G: Geometry<AB>> {
    fn render(
        &self,
        batch: &Batch<AB>,
        geometry: &G,
        light: &LightMips<AB>,
        material: &Material<AB>,
        options: &RenderOptions,
    ) -> RenderBuffers<AB>;

    /// Baking the material to textures of `resolution` on the extracted mesh.
    ///
    /// Charts are dilated by `padding` texels.
    fn render_uv(
        &self,
        geometry: &G,
        material: &Material<AB>,
        resolution: [usize; 2],
        padding: usize,
    ) -> UvMaps<AB>;
}

impl Bsdf {
    /// The file-name friendly name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pbr => "pbr",
            Self::Diffuse => "diffuse",
            Self::Kd => "kd",
            Self::Ks => "ks",
            Self::Normal => "normal",
        }
    }
}
