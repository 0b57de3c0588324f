pub use super::*;
pub use burn::optim::{GradientsParams, Optimizer};

impl<AB, G, R, S, P> Trainer<AB, G, R, S, P>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
    R: Renderer<AB, G>,
    S: Guidance<AB>,
    P: Replica,
{
    /// Back-propagating the scaled total loss and stepping the group of `phase`.
    ///
    /// The gradients of the other group are dropped.
    pub fn optimize(
        &mut self,
        losses: Losses<AB>,
        phase: TrainingPhase,
    ) -> Option<OptimizerHandle> {
        let handle = select_optimizer(phase);
        let mut grads = self.scaler.scale(losses.total()).backward();

        let has_stepped = match handle {
            OptimizerHandle::Geometry => self.optimize_geometry(&mut grads),
            OptimizerHandle::Appearance => self.optimize_appearance(&mut grads),
        };
        self.scaler.update();

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "textmesh::trainer::train",
            "Trainer::optimize > {handle:?} > {has_stepped}",
        );

        has_stepped.then_some(handle)
    }

    fn optimize_geometry(
        &mut self,
        grads: &mut AB::Gradients,
    ) -> bool {
        let Some(optimizer) = self.optimizer_geometry.as_mut() else {
            return false;
        };

        let grads = take_module_grads(grads, &self.geometry);
        let mut grads = self.replica.all_reduce_gradients(grads);
        self.scaler.unscale(&self.geometry, &mut grads);
        if !self.scaler.should_step() {
            return false;
        }

        self.geometry = optimizer.step(
            self.config.optimizer.learning_rate_geometry,
            self.geometry.to_owned(),
            grads,
        );

        true
    }

    fn optimize_appearance(
        &mut self,
        grads: &mut AB::Gradients,
    ) -> bool {
        let learning_rate = self.config.optimizer.learning_rate_appearance;

        let material_grads = take_module_grads(grads, &self.material);
        let mut material_grads = self.replica.all_reduce_gradients(material_grads);
        self.scaler.unscale(&self.material, &mut material_grads);

        let light_grads = match self.optimizer_light {
            Some(_) => {
                let light_grads = take_module_grads(grads, &self.light);
                let mut light_grads = self.replica.all_reduce_gradients(light_grads);
                self.scaler.unscale(&self.light, &mut light_grads);
                Some(light_grads)
            },
            None => None,
        };

        if !self.scaler.should_step() {
            return false;
        }

        self.material = self.optimizer_material.step(
            learning_rate,
            self.material.to_owned(),
            material_grads,
        );
        if let (Some(optimizer), Some(light_grads)) =
            (self.optimizer_light.as_mut(), light_grads)
        {
            self.light = optimizer.step(learning_rate, self.light.to_owned(), light_grads);
        }

        true
    }
}
