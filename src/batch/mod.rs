//! Moving collated cameras to the device with a background.

pub use crate::dataset::{RawBatch, ViewDirection};
pub use burn::tensor::{backend::Backend, Tensor, TensorData};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    Black,
    White,
    /// Supplied by the dataset
    Checker,
    /// Supplied by the dataset
    Reference,
}

/// A batch of cameras on the device.
#[derive(Clone, Debug)]
pub struct Batch<B: Backend> {
    /// `[N, 4, 4]`
    pub mv: Tensor<B, 3>,
    /// `[N, 4, 4]`
    pub mvp: Tensor<B, 3>,
    /// `[N, 3]`
    pub campos: Tensor<B, 2>,
    /// `[N, 4, 4]`
    pub normal_rotate: Tensor<B, 3>,
    /// `[height, width]`
    pub resolution: [usize; 2],
    pub spp: usize,
    pub directions: Vec<ViewDirection>,
    /// `[N, H, W, 3]`
    pub background: Option<Tensor<B, 4>>,
}

impl RawBatch {
    pub fn prepare<B: Backend>(
        self,
        background: BackgroundMode,
        device: &B::Device,
    ) -> Batch<B> {
        let count = self.len();
        let [height, width] = self.resolution;
        let matrices = |values: Vec<f32>| -> Tensor<B, 3> {
            Tensor::from_data(TensorData::new(values, [count, 4, 4]), device)
        };

        let background = match background {
            BackgroundMode::White => Some(Tensor::ones([count, height, width, 3], device)),
            BackgroundMode::Black => Some(Tensor::zeros([count, height, width, 3], device)),
            BackgroundMode::Checker | BackgroundMode::Reference => {
                self.background.map(|values| {
                    Tensor::from_data(
                        TensorData::new(values, [count, height, width, 3]),
                        device,
                    )
                })
            },
        };

        Batch {
            mv: matrices(self.mv),
            mvp: matrices(self.mvp),
            campos: Tensor::from_data(TensorData::new(self.campos, [count, 3]), device),
            normal_rotate: matrices(self.normal_rotate),
            resolution: self.resolution,
            spp: self.spp,
            directions: self.directions,
            background,
        }
    }
}

impl<B: Backend> Batch<B> {
    #[inline]
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    #[inline]
    pub fn device(&self) -> B::Device {
        self.mv.device()
    }
}
