//! Differentiable stand-ins for the rasterizer, the guidance and the geometry.

use crate::{
    batch::Batch,
    error::Error,
    guidance::{Guidance, GuidanceRequest},
    render::{Bsdf, RenderBuffers, RenderOptions, Renderer, UvMaps},
    scene::*,
};
use std::{cell::RefCell, rc::Rc};

/// A geometry whose only parameters are three offsets.
#[derive(Module, Debug)]
pub struct MockGeometry<B: Backend> {
    pub offsets: Param<Tensor<B, 2>>,
}

/// Shading every pixel with the mean diffuse color times the mean radiance.
#[derive(Clone, Debug, Default)]
pub struct MockRenderer {
    /// Shared by the clones
    pub calls: Rc<RefCell<Vec<RenderCall>>>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderCall {
    pub options: RenderOptions,
    pub has_light_transform: bool,
}

#[derive(Clone, Copy, Debug)]
pub enum MockGuidance {
    Constant(f32),
    /// The mean of the image
    MeanIntensity,
    /// The mean of the image times the factor
    Scaled(f32),
    /// The upper bound of the requested time steps
    TimeStepMax,
}

impl<B: Backend> MockGeometry<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            offsets: Param::from_tensor(Tensor::zeros([1, 3], device)),
        }
    }

    pub fn values(&self) -> Vec<f32> {
        self.offsets.val().into_data().to_vec::<f32>().unwrap_or_default()
    }
}

impl<AB: AutodiffBackend> Geometry<AB> for MockGeometry<AB> {
    fn pretrain_loss(
        &self,
        _iteration: u64,
    ) -> Tensor<AB, 1> {
        self.offsets.val().sub_scalar(1.0).powf_scalar(2.0).mean()
    }

    fn regularization_loss(
        &self,
        _iteration: u64,
    ) -> Tensor<AB, 1> {
        self.offsets.val().powf_scalar(2.0).mean().mul_scalar(1e-3)
    }

    fn to_mesh(&self) -> Result<Mesh, Error> {
        let offsets = self.values();
        let offset = [offsets[0], offsets[1], offsets[2]];
        let position = |[x, y, z]: [f32; 3]| [x + offset[0], y + offset[1], z + offset[2]];

        Ok(Mesh {
            positions: vec![
                position([0.0, 0.0, 0.0]),
                position([1.0, 0.0, 0.0]),
                position([0.0, 1.0, 0.0]),
            ],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            triangles: vec![[0, 1, 2]],
        })
    }
}

impl<AB: AutodiffBackend> Renderer<AB, MockGeometry<AB>> for MockRenderer {
    fn render(
        &self,
        batch: &Batch<AB>,
        geometry: &MockGeometry<AB>,
        light: &LightMips<AB>,
        material: &Material<AB>,
        options: &RenderOptions,
    ) -> RenderBuffers<AB> {
        self.calls.borrow_mut().push(RenderCall {
            options: *options,
            has_light_transform: light.transform.is_some(),
        });

        let device = batch.device();
        let count = batch.len();
        let [height, width] = batch.resolution;

        let color = match (options.bsdf, material.kd.as_ref()) {
            (Some(Bsdf::Normal), _) | (_, None) => geometry.offsets.val().tanh(),
            (_, Some(kd)) => {
                let kd = kd.value();
                let [kd_height, kd_width, _] = kd.dims();
                let radiance = light.levels[0].to_owned().mean().reshape([1, 1]);
                kd.slice([0..kd_height, 0..kd_width, 0..3])
                    .mean_dim(0)
                    .mean_dim(1)
                    .reshape([1, 3])
                    .mul(radiance)
            },
        };

        let rgb = color
            .reshape([1, 1, 1, 3])
            .repeat_dim(0, count)
            .repeat_dim(1, height)
            .repeat_dim(2, width);
        let alpha = Tensor::ones([count, height, width, 1], &device);

        RenderBuffers {
            shaded: Tensor::cat(vec![rgb, alpha], 3),
        }
    }

    fn render_uv(
        &self,
        _geometry: &MockGeometry<AB>,
        material: &Material<AB>,
        [height, width]: [usize; 2],
        _padding: usize,
    ) -> UvMaps<AB> {
        let device = material
            .kd
            .as_ref()
            .map(|kd| kd.value().device())
            .unwrap_or_default();
        let channel = |texture: Option<&Texture2d<AB>>, value: f32| match texture {
            Some(texture) => texture.value(),
            None => Tensor::full([height, width, 3], value, &device),
        };

        UvMaps {
            mask: Tensor::ones([height, width, 1], &device),
            kd: channel(material.kd.as_ref(), 0.5),
            ks: channel(material.ks.as_ref(), 0.5),
            normal: channel(material.normal.as_ref(), 0.0),
        }
    }
}

impl<B: Backend> Guidance<B> for MockGuidance {
    fn score(
        &self,
        request: GuidanceRequest<B>,
    ) -> Tensor<B, 1> {
        match self {
            Self::Constant(value) => {
                Tensor::full([1], *value, &request.image.device())
            },
            Self::MeanIntensity => request.image.mean(),
            Self::Scaled(factor) => request.image.mean().mul_scalar(*factor),
            Self::TimeStepMax => {
                Tensor::full([1], request.time_steps.max, &request.image.device())
            },
        }
    }
}
