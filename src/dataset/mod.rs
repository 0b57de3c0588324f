pub mod orbit;

pub use crate::error::Error;
pub use nalgebra::Matrix4;
pub use orbit::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The coarse direction a camera looks at the object from.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewDirection {
    #[default]
    Front,
    Side,
    Back,
}

/// A camera sampled on the host.
#[derive(Clone, PartialEq)]
pub struct CameraSample {
    pub mv: Matrix4<f32>,
    pub mvp: Matrix4<f32>,
    pub normal_rotate: Matrix4<f32>,
    pub campos: [f32; 3],
    /// `[height, width]`
    pub resolution: [usize; 2],
    pub spp: usize,
    pub direction: ViewDirection,
    /// A background of shape `[H, W, 3]`.
    pub background: Option<Vec<f32>>,
}

/// The collated host form of a batch of camera samples.
///
/// Matrices are flattened row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBatch {
    pub mv: Vec<f32>,
    pub mvp: Vec<f32>,
    pub normal_rotate: Vec<f32>,
    pub campos: Vec<f32>,
    pub resolution: [usize; 2],
    pub spp: usize,
    pub directions: Vec<ViewDirection>,
    /// Present only if every sample carries a background.
    pub background: Option<Vec<f32>>,
}

/// A fixed-size, indexable set of camera samples.
pub trait Dataset {
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(
        &self,
        index: usize,
    ) -> CameraSample;

    #[inline]
    fn collate(
        &self,
        samples: Vec<CameraSample>,
    ) -> Result<RawBatch, Error> {
        RawBatch::collate(samples)
    }

    /// Collating the samples at `indices`.
    fn batch(
        &self,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<RawBatch, Error>
    where
        Self: Sized,
    {
        self.collate(indices.into_iter().map(|index| self.get(index)).collect())
    }
}

/// A wrap-around index over a fixed-size dataset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ValidationCursor {
    pub index: usize,
    pub len: usize,
}

impl ViewDirection {
    /// The text appended to a prompt for this direction.
    pub const fn prompt_suffix(&self) -> &'static str {
        match self {
            Self::Front => "front view",
            Self::Side => "side view",
            Self::Back => "back view",
        }
    }
}

impl RawBatch {
    pub fn collate(samples: Vec<CameraSample>) -> Result<Self, Error> {
        let first = samples.first().ok_or(Error::EmptyBatch)?;
        let resolution = first.resolution;
        let spp = first.spp;
        let count = samples.len();
        let has_background =
            samples.iter().all(|sample| sample.background.is_some());

        let mut batch = Self {
            mv: Vec::with_capacity(count * 16),
            mvp: Vec::with_capacity(count * 16),
            normal_rotate: Vec::with_capacity(count * 16),
            campos: Vec::with_capacity(count * 3),
            resolution,
            spp,
            directions: Vec::with_capacity(count),
            background: has_background.then(Vec::new),
        };

        for sample in samples {
            if sample.resolution != resolution {
                return Err(Error::MismatchedResolution(
                    resolution,
                    sample.resolution,
                ));
            }

            batch.mv.extend(sample.mv.transpose().as_slice());
            batch.mvp.extend(sample.mvp.transpose().as_slice());
            batch
                .normal_rotate
                .extend(sample.normal_rotate.transpose().as_slice());
            batch.campos.extend(sample.campos);
            batch.directions.push(sample.direction);
            if let (Some(background), Some(sample_background)) =
                (batch.background.as_mut(), sample.background)
            {
                background.extend(sample_background);
            }
        }

        Ok(batch)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }
}

impl ValidationCursor {
    #[inline]
    pub const fn new(len: usize) -> Self {
        Self { index: 0, len }
    }
}

impl Iterator for ValidationCursor {
    type Item = usize;

    /// The current index, advancing with wrap-around.
    ///
    /// It is `None` only for an empty dataset.
    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let index = self.index % self.len;
        self.index = (index + 1) % self.len;
        Some(index)
    }
}

impl fmt::Debug for CameraSample {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CameraSample")
            .field("campos", &self.campos)
            .field("direction", &self.direction)
            .field("resolution", &self.resolution)
            .field("spp", &self.spp)
            .field("background.is_some()", &self.background.is_some())
            .finish()
    }
}
