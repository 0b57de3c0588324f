pub use super::*;
pub use crate::config::{Config, Validate};
pub use crate::error::Error;

use burn::tensor::{Distribution, TensorData};

/// A trainable texture of shape `[H, W, C]`.
#[derive(Module, Debug)]
pub struct Texture2d<B: Backend> {
    pub data: Param<Tensor<B, 3>>,
}

/// The semantic channels of a PBR material.
///
/// Each present channel is clamped to its [`MaterialBounds`] after every
/// optimizer step.
#[derive(Module, Debug)]
pub struct Material<B: Backend> {
    /// Diffuse albedo.
    pub kd: Option<Texture2d<B>>,
    /// Specular parameters (occlusion, roughness, metalness).
    pub ks: Option<Texture2d<B>>,
    /// Tangent-space normals.
    pub normal: Option<Texture2d<B>>,
}

/// Per-component bounds of one texture channel.
#[derive(Config, Debug, PartialEq)]
pub struct ChannelBounds {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

#[derive(Config, Debug, PartialEq)]
pub struct MaterialBounds {
    #[config(default = "ChannelBounds::new(vec![0.0; 4], vec![1.0; 4])")]
    pub kd: ChannelBounds,

    #[config(default = "ChannelBounds::new(vec![0.0, 0.08, 0.0], vec![1.0; 3])")]
    pub ks: ChannelBounds,

    #[config(default = "ChannelBounds::new(vec![-1.0, -1.0, 0.0], vec![1.0; 3])")]
    pub normal: ChannelBounds,
}

impl<B: Backend> Texture2d<B> {
    #[inline]
    pub fn new(value: Tensor<B, 3>) -> Self {
        Self {
            data: Param::from_tensor(value),
        }
    }

    #[inline]
    pub fn value(&self) -> Tensor<B, 3> {
        self.data.val()
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.data.val().dims()
    }

    /// Clamping each component to its bounds.
    ///
    /// Components beyond the bounds are left unchanged.
    pub fn clamp(
        mut self,
        bounds: &ChannelBounds,
    ) -> Self {
        self.data = map_param_detached(self.data, |value| {
            let [height, width, channel_count] = value.dims();
            let channels = (0..channel_count)
                .map(|c| {
                    let channel =
                        value.to_owned().slice([0..height, 0..width, c..c + 1]);
                    match (bounds.min.get(c), bounds.max.get(c)) {
                        (Some(&min), Some(&max)) => channel.clamp(min, max),
                        _ => channel,
                    }
                })
                .collect();
            Tensor::cat(channels, 2)
        });
        self
    }

    /// Scaling every texel to unit length.
    pub fn normalize(mut self) -> Self {
        self.data = map_param_detached(self.data, safe_normalize);
        self
    }
}

impl<B: Backend> Material<B> {
    /// Initializing the channels uniformly at random within `bounds`.
    ///
    /// Normals start facing `+z`.
    pub fn init(
        bounds: &MaterialBounds,
        [height, width]: [usize; 2],
        device: &B::Device,
    ) -> Self {
        let random_within = |bounds: &ChannelBounds, channel_count: usize| {
            let channel_count = channel_count.min(bounds.min.len());
            let min = Tensor::<B, 3>::from_data(
                TensorData::new(bounds.min[..channel_count].to_vec(), [1, 1, channel_count]),
                device,
            );
            let max = Tensor::<B, 3>::from_data(
                TensorData::new(bounds.max[..channel_count].to_vec(), [1, 1, channel_count]),
                device,
            );

            Tensor::random(
                [height, width, channel_count],
                Distribution::Uniform(0.0, 1.0),
                device,
            )
            .mul(max.sub(min.to_owned()))
            .add(min)
        };

        let normal = Tensor::cat(
            vec![
                Tensor::zeros([height, width, 2], device),
                Tensor::ones([height, width, 1], device),
            ],
            2,
        );

        Self {
            kd: Some(Texture2d::new(random_within(&bounds.kd, 3))),
            ks: Some(Texture2d::new(random_within(&bounds.ks, 3))),
            normal: Some(Texture2d::new(normal)),
        }
    }

    /// Clamping every present channel to its box.
    pub fn clamp(
        mut self,
        bounds: &MaterialBounds,
    ) -> Self {
        self.kd = self.kd.map(|kd| kd.clamp(&bounds.kd));
        self.ks = self.ks.map(|ks| ks.clamp(&bounds.ks));
        self.normal = self.normal.map(|normal| normal.clamp(&bounds.normal));
        self
    }

    /// Re-normalizing the normal channel to unit length.
    pub fn normalize(mut self) -> Self {
        self.normal = self.normal.map(Texture2d::normalize);
        self
    }

    /// The total variation of the diffuse channel.
    ///
    /// It is `None` without a diffuse channel.
    pub fn smoothness(&self) -> Option<Tensor<B, 1>> {
        let kd = self.kd.as_ref()?.value();
        let [height, width, channel_count] = kd.dims();
        let device = kd.device();
        let mut loss = Tensor::zeros([1], &device);

        if height > 1 {
            loss = loss.add(
                kd.to_owned()
                    .slice([1..height, 0..width, 0..channel_count])
                    .sub(kd.to_owned().slice([
                        0..height - 1,
                        0..width,
                        0..channel_count,
                    ]))
                    .abs()
                    .mean(),
            );
        }
        if width > 1 {
            loss = loss.add(
                kd.to_owned()
                    .slice([0..height, 1..width, 0..channel_count])
                    .sub(kd.slice([0..height, 0..width - 1, 0..channel_count]))
                    .abs()
                    .mean(),
            );
        }

        Some(loss)
    }
}

impl Validate for ChannelBounds {
    fn validate(&self) -> Result<(), Error> {
        if self.min.is_empty() || self.min.len() != self.max.len() {
            return Err(Error::InvalidConfig(format!(
                "Channel bounds should have equal non-zero lengths: {:?} and {:?}",
                self.min, self.max
            )));
        }
        if self.min.iter().zip(&self.max).any(|(min, max)| min > max) {
            return Err(Error::InvalidConfig(format!(
                "Channel bounds should have min <= max: {:?} and {:?}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

impl Validate for MaterialBounds {
    fn validate(&self) -> Result<(), Error> {
        self.kd.validate()?;
        self.ks.validate()?;
        self.normal.validate()
    }
}

impl Default for MaterialBounds {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// `x / sqrt(max(dot(x, x), 1e-20))` along the last dimension.
pub fn safe_normalize<B: Backend>(value: Tensor<B, 3>) -> Tensor<B, 3> {
    let length = value
        .to_owned()
        .powf_scalar(2.0)
        .sum_dim(2)
        .clamp_min(1e-20)
        .sqrt();
    value.div(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn material_out_of_bounds(device: &<NdArray as Backend>::Device) -> Material<NdArray> {
        Material {
            kd: Some(Texture2d::new(Tensor::from_floats(
                [[[-0.5, 0.5, 1.5], [0.2, 2.0, -3.0]]],
                device,
            ))),
            ks: Some(Texture2d::new(Tensor::from_floats(
                [[[0.5, 0.0, 0.5], [1.5, 0.5, 0.2]]],
                device,
            ))),
            normal: Some(Texture2d::new(Tensor::from_floats(
                [[[3.0, 0.0, -1.0], [0.1, -0.2, 0.3]]],
                device,
            ))),
        }
    }

    #[test]
    fn clamp_and_normalize_within_bounds() {
        let device = Default::default();
        let bounds = MaterialBounds::default();

        let material = material_out_of_bounds(&device).clamp(&bounds).normalize();

        let kd = material.kd.unwrap().value().into_data();
        let kd_target = Tensor::<NdArray, 3>::from_floats(
            [[[0.0, 0.5, 1.0], [0.2, 1.0, 0.0]]],
            &device,
        )
        .into_data();
        kd.assert_approx_eq(&kd_target, 6);

        let ks = material.ks.unwrap().value().into_data();
        let ks_target = Tensor::<NdArray, 3>::from_floats(
            [[[0.5, 0.08, 0.5], [1.0, 0.5, 0.2]]],
            &device,
        )
        .into_data();
        ks.assert_approx_eq(&ks_target, 6);

        let normal = material.normal.unwrap().value();
        let lengths = normal
            .to_owned()
            .powf_scalar(2.0)
            .sum_dim(2)
            .sqrt()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert!(lengths.iter().all(|l| (l - 1.0).abs() < 1e-4), "{lengths:?}");

        let values = normal.into_data().to_vec::<f32>().unwrap();
        for texel in values.chunks(3) {
            assert!((-1.0..=1.0).contains(&texel[0]), "{texel:?}");
            assert!((-1.0..=1.0).contains(&texel[1]), "{texel:?}");
            assert!((0.0..=1.0).contains(&texel[2]), "{texel:?}");
        }
    }

    #[test]
    fn clamp_is_idempotent() {
        let device = Default::default();
        let bounds = MaterialBounds::default();

        let once = material_out_of_bounds(&device).clamp(&bounds).normalize();
        let twice = once.clone().clamp(&bounds).normalize();

        for (once, twice) in [
            (once.kd.unwrap(), twice.kd.unwrap()),
            (once.ks.unwrap(), twice.ks.unwrap()),
            (once.normal.unwrap(), twice.normal.unwrap()),
        ] {
            twice
                .value()
                .into_data()
                .assert_approx_eq(&once.value().into_data(), 5);
        }
    }

    #[test]
    fn clamp_keeps_param_id() {
        let device = Default::default();
        let material = material_out_of_bounds(&device);
        let id = material.kd.as_ref().unwrap().data.id.to_owned();

        let material = material.clamp(&MaterialBounds::default());
        assert_eq!(material.kd.unwrap().data.id, id);
    }

    #[test]
    fn clamp_on_autodiff_keeps_params_trainable() {
        type AB = burn::backend::Autodiff<NdArray>;
        let device = Default::default();
        let bounds = MaterialBounds::default();

        let kd = Tensor::<AB, 3>::from_floats([[[-0.5, 0.5, 1.5], [0.2, 2.0, -3.0]]], &device);
        let material = Material {
            kd: Some(Texture2d::new(kd)),
            ks: None,
            normal: Some(Texture2d::new(Tensor::ones([1, 2, 3], &device))),
        }
        .clamp(&bounds)
        .normalize();

        let kd = material.kd.as_ref().unwrap().value();
        assert!(kd.is_require_grad());
        assert_eq!(
            kd.to_owned().into_data().to_vec::<f32>().unwrap(),
            [0.0, 0.5, 1.0, 0.2, 1.0, 0.0]
        );
        let normal = material.normal.as_ref().unwrap().value();
        assert!(normal.is_require_grad());

        let grads = kd.to_owned().sum().add(normal.to_owned().sum()).backward();
        assert!(kd.grad(&grads).is_some());
        assert!(normal.grad(&grads).is_some());
    }

    #[test]
    fn init_within_bounds() {
        let device = Default::default();
        let bounds = MaterialBounds::default();

        let material = Material::<NdArray>::init(&bounds, [8, 8], &device);
        assert_eq!(material.kd.as_ref().unwrap().dims(), [8, 8, 3]);
        assert_eq!(material.ks.as_ref().unwrap().dims(), [8, 8, 3]);
        assert_eq!(material.normal.as_ref().unwrap().dims(), [8, 8, 3]);

        let clamped = material.clone().clamp(&bounds);
        clamped
            .ks
            .unwrap()
            .value()
            .into_data()
            .assert_approx_eq(&material.ks.unwrap().value().into_data(), 6);
    }

    #[test]
    fn smoothness() {
        let device = Default::default();

        let flat = Material::<NdArray> {
            kd: Some(Texture2d::new(Tensor::ones([4, 4, 3], &device))),
            ks: None,
            normal: None,
        };
        assert_eq!(flat.smoothness().unwrap().into_scalar(), 0.0);

        let striped = Material::<NdArray> {
            kd: Some(Texture2d::new(Tensor::from_floats(
                [[[0.0], [1.0]], [[0.0], [1.0]]],
                &device,
            ))),
            ks: None,
            normal: None,
        };
        assert_eq!(striped.smoothness().unwrap().into_scalar(), 1.0);

        let empty = Material::<NdArray> {
            kd: None,
            ks: None,
            normal: None,
        };
        assert!(empty.smoothness().is_none());
    }

    #[test]
    fn bounds_validate() {
        MaterialBounds::default().validate().unwrap();
        ChannelBounds::new(vec![0.0], vec![1.0, 1.0]).validate().unwrap_err();
        ChannelBounds::new(vec![1.0], vec![0.0]).validate().unwrap_err();
        ChannelBounds::new(vec![], vec![]).validate().unwrap_err();
    }
}
