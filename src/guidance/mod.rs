//! The score distillation interface.

pub use crate::{
    config::{Config, Validate},
    dataset::ViewDirection,
    error::Error,
};
pub use burn::tensor::{backend::Backend, Tensor};

/// A range of normalized diffusion time steps.
#[derive(Config, Copy, Debug, PartialEq)]
pub struct TimeStepRange {
    pub min: f32,
    pub max: f32,
}

#[derive(Config, Debug, PartialEq)]
pub struct GuidanceConfig {
    #[config(default = "String::new()")]
    pub text: String,

    #[config(default = "String::new()")]
    pub negative_text: String,

    /// Appending the view direction to the prompt
    #[config(default = false)]
    pub add_directional_text: bool,

    /// The classifier-free guidance scale, read by the [`Guidance`] implementation
    #[config(default = 100.0)]
    pub guidance_scale: f32,

    /// The time step weighting of the distillation loss,
    /// read by the [`Guidance`] implementation
    #[config(default = 0)]
    pub weight_strategy: u32,

    /// Used in pretraining and the coarse stage
    #[config(default = "TimeStepRange::new(0.02, 0.5)")]
    pub early_time_steps: TimeStepRange,

    /// Used in the fine stage
    #[config(default = "TimeStepRange::new(0.02, 0.5)")]
    pub late_time_steps: TimeStepRange,
}

/// The prompts for each view of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct TextCondition {
    pub texts: Vec<String>,
    pub negative_text: String,
}

#[derive(Clone, Debug)]
pub struct GuidanceRequest<B: Backend> {
    /// `[N, 3, H, W]` in `[0, 1]`
    pub image: Tensor<B, 4>,
    pub condition: TextCondition,
    pub time_steps: TimeStepRange,
    pub iteration: u64,
}

/// A frozen diffusion model scoring renders against a text prompt.
pub trait Guidance<B: Backend> {
    /// The score distillation loss of a batch.
    fn score(
        &self,
        request: GuidanceRequest<B>,
    ) -> Tensor<B, 1>;
}

impl TextCondition {
    pub fn for_views(
        config: &GuidanceConfig,
        directions: &[ViewDirection],
    ) -> Self {
        let texts = directions
            .iter()
            .map(|direction| {
                if config.add_directional_text {
                    format!("{}, {}", config.text, direction.prompt_suffix())
                } else {
                    config.text.to_owned()
                }
            })
            .collect();

        Self {
            texts,
            negative_text: config.negative_text.to_owned(),
        }
    }
}

impl Validate for TimeStepRange {
    fn validate(&self) -> Result<(), Error> {
        let is_valid = (0.0..=1.0).contains(&self.min)
            && (0.0..=1.0).contains(&self.max)
            && self.min <= self.max;

        if !is_valid {
            return Err(Error::InvalidConfig(format!(
                "Time step range should be ordered within [0, 1]: {self:?}"
            )));
        }
        Ok(())
    }
}

impl Validate for GuidanceConfig {
    fn validate(&self) -> Result<(), Error> {
        self.early_time_steps.validate()?;
        self.late_time_steps.validate()
    }
}

impl Default for GuidanceConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
