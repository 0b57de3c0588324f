pub use super::*;
pub use crate::error::Error;

use crate::function::{
    cubemap_to_latlong, get_tensor_from_values, get_values_from_tensor,
    latlong_to_cubemap,
};
use burn::tensor::{module::avg_pool2d, Distribution, TensorData};
use std::path::Path;

/// The smallest mip resolution of an environment light.
pub const LIGHT_MIP_RESOLUTION_MIN: usize = 16;

/// A split-sum environment light stored as a cubemap of shape `[6, R, R, 3]`.
#[derive(Module, Debug)]
pub struct EnvironmentLight<B: Backend> {
    pub base: Param<Tensor<B, 4>>,
}

/// The prefiltered levels of an [`EnvironmentLight`].
#[derive(Clone, Debug)]
pub struct LightMips<B: Backend> {
    /// Levels from the base resolution down to [`LIGHT_MIP_RESOLUTION_MIN`].
    pub levels: Vec<Tensor<B, 4>>,
    /// The model-view matrices `[N, 4, 4]` of a camera-space lookup.
    pub transform: Option<Tensor<B, 3>>,
}

impl<B: Backend> EnvironmentLight<B> {
    #[inline]
    pub fn new(base: Tensor<B, 4>) -> Self {
        Self {
            base: Param::from_tensor(base),
        }
    }

    /// A light with a constant radiance in all directions.
    pub fn uniform(
        resolution: usize,
        value: f32,
        device: &B::Device,
    ) -> Self {
        Self::new(Tensor::full([6, resolution, resolution, 3], value, device))
    }

    /// A light initialized to `uniform(0, 1) * scale + bias`.
    pub fn init_random(
        resolution: usize,
        scale: f64,
        bias: f64,
        device: &B::Device,
    ) -> Self {
        Self::new(
            Tensor::random(
                [6, resolution, resolution, 3],
                Distribution::Uniform(0.0, 1.0),
                device,
            )
            .mul_scalar(scale)
            .add_scalar(bias),
        )
    }

    /// Projecting a latlong map of shape `[H, W, 3]` onto a cubemap.
    pub fn from_latlong(
        latlong: &[f32],
        [height, width]: [usize; 2],
        resolution: usize,
        scale: f32,
        device: &B::Device,
    ) -> Self {
        let cubemap = latlong_to_cubemap(latlong, [height, width], resolution)
            .into_iter()
            .map(|value| value * scale)
            .collect::<Vec<_>>();

        Self::new(Tensor::from_data(
            TensorData::new(cubemap, [6, resolution, resolution, 3]),
            device,
        ))
    }

    /// Loading a latlong HDR probe from `path`.
    pub fn load(
        path: impl AsRef<Path>,
        resolution: usize,
        scale: f32,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let path = path.as_ref();

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "textmesh::trainer::scene",
            "EnvironmentLight::load > {path:?}",
        );

        let image = image::open(path)?.to_rgb32f();
        let (width, height) = image.dimensions();

        Ok(Self::from_latlong(
            image.as_raw(),
            [height as usize, width as usize],
            resolution,
            scale,
            device,
        ))
    }

    #[inline]
    pub fn resolution(&self) -> usize {
        self.base.val().dims()[1]
    }

    /// Box-filtering the base cubemap down to [`LIGHT_MIP_RESOLUTION_MIN`].
    pub fn build_mips(&self) -> LightMips<B> {
        let mut levels = vec![self.base.val()];

        while let Some(level) = levels
            .last()
            .filter(|level| level.dims()[1] > LIGHT_MIP_RESOLUTION_MIN)
        {
            let level = avg_pool2d(
                level.to_owned().permute([0, 3, 1, 2]),
                [2, 2],
                [2, 2],
                [0, 0],
                true,
            )
            .permute([0, 2, 3, 1]);
            levels.push(level);
        }

        LightMips {
            levels,
            transform: None,
        }
    }

    /// Clamping the radiance to at least `min` outside of the autodiff graph.
    pub fn clamp_min(
        mut self,
        min: f64,
    ) -> Self {
        self.base = map_param_detached(self.base, |base| base.clamp_min(min));
        self
    }

    /// Unrolling the base cubemap to a latlong map of shape `[H, W, 3]`.
    pub fn to_latlong(
        &self,
        [height, width]: [usize; 2],
    ) -> Result<Tensor<B, 3>, Error> {
        let base = self.base.val();
        let device = base.device();
        let resolution = base.dims()[1];
        let latlong = cubemap_to_latlong(
            &get_values_from_tensor(base)?,
            resolution,
            [height, width],
        );

        Ok(get_tensor_from_values(latlong, [height, width, 3], &device))
    }
}

impl<B: Backend> LightMips<B> {
    /// Expressing the lookups in the camera space of `view`.
    #[inline]
    pub fn transform(
        mut self,
        view: Tensor<B, 3>,
    ) -> Self {
        self.transform = Some(view);
        self
    }
}
