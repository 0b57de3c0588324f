pub use super::*;

/// The losses of an iteration, each of shape `[1]`.
#[derive(Clone, Debug)]
pub struct Losses<B: Backend> {
    pub guidance: Tensor<B, 1>,
    pub image: Tensor<B, 1>,
    pub regularization: Tensor<B, 1>,
}

/// The host values of [`Losses`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LossValues {
    pub guidance: f64,
    pub image: f64,
    pub regularization: f64,
}

impl<B: Backend> Losses<B> {
    #[inline]
    pub fn total(self) -> Tensor<B, 1> {
        self.guidance.add(self.image).add(self.regularization)
    }

    pub fn values(&self) -> Result<LossValues, Error> {
        let value = |loss: &Tensor<B, 1>| -> Result<f64, Error> {
            Ok(get_values_from_tensor(loss.to_owned().sum())?
                .first()
                .map(|value| *value as f64)
                .unwrap_or_default())
        };

        Ok(LossValues {
            guidance: value(&self.guidance)?,
            image: value(&self.image)?,
            regularization: value(&self.regularization)?,
        })
    }
}

impl<AB, G, R, S, P> Trainer<AB, G, R, S, P>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
    R: Renderer<AB, G>,
    S: Guidance<AB>,
    P: Replica,
{
    /// Rendering the batch and scoring it against the prompt.
    pub fn score(
        &mut self,
        batch: &Batch<AB>,
        phase: TrainingPhase,
        stage: Stage,
    ) -> Losses<AB> {
        let device = batch.device();
        let zeros = || Tensor::<AB, 1>::zeros([1], &device);

        if phase == TrainingPhase::Pretrain {
            return Losses {
                guidance: zeros(),
                image: zeros(),
                regularization: self.geometry.pretrain_loss(self.iteration),
            };
        }

        let mips = self.prepare_light(batch);
        let bsdf = (phase == TrainingPhase::GeometryRefine).then_some(Bsdf::Normal);
        let options = self.render_options(bsdf, stage);
        let shaded = self
            .renderer
            .render(batch, &self.geometry, &mips, &self.material, &options)
            .shaded;

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(target: "textmesh::trainer::train", "Trainer::score > render");

        let guidance_config = &self.config.guidance;
        let request = GuidanceRequest {
            image: encode_for_guidance(shaded, phase),
            condition: TextCondition::for_views(guidance_config, &batch.directions),
            time_steps: match stage {
                Stage::Fine => guidance_config.late_time_steps,
                Stage::Pretrain | Stage::Coarse => guidance_config.early_time_steps,
            },
            iteration: self.iteration,
        };
        let guidance = self.guidance.score(request);

        let mut regularization = self.geometry.regularization_loss(self.iteration);
        let weight = self.config.material_smoothness_weight;
        if weight > 0.0 {
            if let Some(smoothness) = self.material.smoothness() {
                regularization = regularization.add(smoothness.mul_scalar(weight));
            }
        }

        Losses {
            guidance,
            image: zeros(),
            regularization,
        }
    }

    /// The mips to render the batch with.
    pub fn prepare_light(
        &mut self,
        batch: &Batch<AB>,
    ) -> LightMips<AB> {
        if self.config.optimize_light {
            self.light_mips = self.light.build_mips();
        }

        let mips = self.light_mips.to_owned();
        if self.config.camera_space_light {
            mips.transform(batch.mv.to_owned())
        } else {
            mips
        }
    }
}

/// Cropping `[N, H, W, 4]` renders to display RGB of shape `[N, 3, H, W]`.
pub fn encode_for_guidance<B: Backend>(
    shaded: Tensor<B, 4>,
    phase: TrainingPhase,
) -> Tensor<B, 4> {
    let [count, height, width, _] = shaded.dims();
    let rgb = shaded.slice([0..count, 0..height, 0..width, 0..3]);
    let rgb = match phase {
        TrainingPhase::GeometryRefine => normal_to_display(rgb),
        TrainingPhase::Pretrain | TrainingPhase::AppearanceRefine => rgb_to_srgb(rgb),
    };

    rgb.permute([0, 3, 1, 2])
}
