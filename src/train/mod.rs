pub mod clamp;
pub mod config;
pub mod history;
pub mod optimize;
pub mod score;

pub use crate::{
    batch::{BackgroundMode, Batch},
    config::{Config, Validate},
    dataset::{Dataset, RawBatch, ValidationCursor},
    distributed::{Replica, SingleReplica},
    error::Error,
    function::*,
    guidance::{Guidance, GuidanceConfig, GuidanceRequest, TextCondition},
    optimize::{
        take_module_grads, AdamWOptimizer, GradScaler, GradScalerConfig, OptimizerConfig,
    },
    render::{Bsdf, RenderOptions, Renderer},
    scene::*,
    schedule::*,
    validate::DisplayLayer,
};
pub use burn::tensor::backend::SyncType;
pub use config::*;
pub use history::*;
pub use optimize::*;
pub use score::*;

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Optimizing a geometry, a material and a light against a text prompt.
pub struct Trainer<AB, G, R, S, P = SingleReplica>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
{
    pub config: TrainerConfig,
    pub device: AB::Device,
    pub geometry: G,
    pub guidance: S,
    pub history: LossHistory,
    pub iteration: u64,
    pub light: EnvironmentLight<AB>,
    /// Built from [`Trainer::light`] whenever it may have changed.
    pub light_mips: LightMips<AB>,
    pub material: Material<AB>,
    pub optimizer_geometry: Option<AdamWOptimizer<AB, G>>,
    pub optimizer_light: Option<AdamWOptimizer<AB, EnvironmentLight<AB>>>,
    pub optimizer_material: AdamWOptimizer<AB, Material<AB>>,
    pub renderer: R,
    pub replica: P,
    pub scaler: GradScaler,
}

/// The outcome of one training iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    pub duration: Duration,
    pub iteration: u64,
    pub losses: LossValues,
    pub phase: TrainingPhase,
    pub stage: Stage,
    /// `None` if no optimizer stepped.
    pub stepped: Option<OptimizerHandle>,
}

impl<AB, G, R, S, P> Trainer<AB, G, R, S, P>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
    R: Renderer<AB, G>,
    S: Guidance<AB>,
    P: Replica,
{
    /// Running one iteration on `raw`.
    pub fn train(
        &mut self,
        raw: RawBatch,
    ) -> Result<StepReport, Error> {
        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "textmesh::trainer::train", "Trainer::train");

        let batch = raw.prepare::<AB>(self.config.train_background, &self.device);
        let iteration = self.iteration;
        let stage = self.config.schedule.stage(iteration);
        let phase = self.config.schedule.phase(iteration);
        let time = Instant::now();

        let losses = self.score(&batch, phase, stage);
        let values = losses.values()?;

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "textmesh::trainer::train", "Trainer::train > score");

        let stepped = self.optimize(losses, phase);

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "textmesh::trainer::train", "Trainer::train > optimize");

        self.clamp();

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "textmesh::trainer::train", "Trainer::train > clamp");

        AB::sync(&self.device, SyncType::Wait);
        let duration = time.elapsed();

        self.history.record(phase, values, duration);
        self.iteration += 1;

        Ok(StepReport {
            duration,
            iteration,
            losses: values,
            phase,
            stage,
            stepped,
        })
    }

    /// Training until the configured iteration count.
    ///
    /// Samples are drawn in order from `train_set` and previews cycle
    /// through `validation_set`.
    pub fn run(
        &mut self,
        train_set: &impl Dataset,
        validation_set: &impl Dataset,
    ) -> Result<&mut Self, Error> {
        if train_set.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let batch_size = self.config.batch_size;
        let out_dir = PathBuf::from(&self.config.out_dir);
        let mut cursor = ValidationCursor::new(validation_set.len());
        let mut preview_count = 0_u64;
        let mut sample_index = 0;

        while self.iteration < self.config.iteration_count {
            if self.replica.is_primary_replica()
                && self.config.save_interval.has(self.iteration)
            {
                if let Some(index) = cursor.next() {
                    let path = out_dir.join(format!(
                        "img_{}_{preview_count:06}.png",
                        self.config.schedule.mode
                    ));
                    self.preview(validation_set.batch([index])?, &path)?;
                    preview_count += 1;
                }
            }

            let indices = (0..batch_size)
                .map(|offset| (sample_index + offset) % train_set.len())
                .collect::<Vec<_>>();
            sample_index = (sample_index + batch_size) % train_set.len();

            let report = self.train(train_set.batch(indices)?)?;

            let log_interval = self.config.log_interval;
            if self.replica.is_primary_replica()
                && report.phase != TrainingPhase::Pretrain
                && log_interval != 0
                && report.iteration % log_interval == 0
            {
                let summary = self.history.summary(log_interval as usize);
                let remaining = summary
                    .duration
                    .mul_f64((self.config.iteration_count - self.iteration) as f64);

                log::info!(
                    target: "textmesh::trainer::train",
                    "iteration={:5}, image_loss={:.6}, regularization_loss={:.6}, time={:.1} ms, remaining={}",
                    report.iteration,
                    summary.image,
                    summary.regularization,
                    summary.duration.as_secs_f64() * 1e3,
                    duration_to_text(remaining),
                );
            }
        }

        Ok(self)
    }

    /// Validating the views of `gif_set` and exporting the textured mesh.
    ///
    /// It does nothing on other than the primary replica.
    pub fn finish(
        &mut self,
        gif_set: &impl Dataset,
        relight: Option<&EnvironmentLight<AB>>,
    ) -> Result<Option<crate::validate::ValidationSummary>, Error> {
        if !self.replica.is_primary_replica() {
            return Ok(None);
        }

        let out_dir = PathBuf::from(&self.config.out_dir);
        let summary = if self.config.validate {
            Some(self.validate(gif_set, out_dir.join("validate"), relight)?)
        } else {
            None
        };
        self.export(&out_dir)?;

        log::info!(
            target: "textmesh::trainer::train",
            "Trainer::finish > {:?}",
            out_dir,
        );

        Ok(summary)
    }

    /// Saving the composite of a validation view to `path`.
    pub fn preview(
        &self,
        raw: RawBatch,
        path: &Path,
    ) -> Result<&Self, Error> {
        let batch = raw.prepare::<AB>(self.config.train_background, &self.device);
        let output = self.validate_view(&batch, None)?;

        if let Some(directory) = path.parent() {
            fs::create_dir_all(directory)?;
        }
        get_image_from_tensor(output.composite)?.save(path)?;

        Ok(self)
    }

    /// The render options shared by every pass of `stage`.
    pub fn render_options(
        &self,
        bsdf: Option<Bsdf>,
        stage: Stage,
    ) -> RenderOptions {
        RenderOptions {
            bsdf,
            coarse: stage == Stage::Coarse && self.config.coarse_render,
            use_bump: self.config.use_bump,
            flip_normal: self.config.flip_normal,
        }
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.config.schedule.stage(self.iteration)
    }
}

impl<AB, G, R, S, P> fmt::Debug for Trainer<AB, G, R, S, P>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Trainer")
            .field("config", &self.config)
            .field("iteration", &self.iteration)
            .field("geometry", &self.geometry)
            .field("material", &self.material)
            .field("light", &self.light)
            .field(
                "optimizer_geometry",
                &self
                    .optimizer_geometry
                    .as_ref()
                    .map(|_| format!("AdamW<{}>", AB::name())),
            )
            .field(
                "optimizer_light",
                &self
                    .optimizer_light
                    .as_ref()
                    .map(|_| format!("AdamW<{}>", AB::name())),
            )
            .field("optimizer_material", &format!("AdamW<{}>", AB::name()))
            .field("scaler", &self.scaler)
            .finish()
    }
}
