pub mod scaler;

pub use burn::{
    config::Config,
    module::{AutodiffModule, Module, ModuleVisitor, ParamId},
    optim::{adaptor::OptimizerAdaptor, AdamW, AdamWConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, Tensor},
    LearningRate,
};
pub use scaler::*;

use std::fmt;

/// An AdamW optimizer updating every parameter of a module `M`.
pub type AdamWOptimizer<AB, M> =
    OptimizerAdaptor<AdamW<<AB as AutodiffBackend>::InnerBackend>, M, AB>;

#[derive(Config)]
pub struct OptimizerConfig {
    #[config(
        default = "AdamWConfig::new().with_beta_1(0.9).with_beta_2(0.99).with_epsilon(1e-15).with_weight_decay(1e-2)"
    )]
    pub adamw: AdamWConfig,

    /// The learning rate of the geometry group.
    #[config(default = "1e-3")]
    pub learning_rate_geometry: LearningRate,

    /// The learning rate of the material and the light.
    #[config(default = "1e-2")]
    pub learning_rate_appearance: LearningRate,
}

struct GradsCollector<'a, AB: AutodiffBackend> {
    grads: &'a mut AB::Gradients,
    grads_params: GradientsParams,
}

impl OptimizerConfig {
    #[inline]
    pub fn init<AB: AutodiffBackend, M: AutodiffModule<AB>>(&self) -> AdamWOptimizer<AB, M> {
        self.adamw.init()
    }
}

/// Moving the gradients of the parameters in `module` out of `grads`.
///
/// The gradients of other modules stay in `grads`.
pub fn take_module_grads<AB: AutodiffBackend, M: Module<AB>>(
    grads: &mut AB::Gradients,
    module: &M,
) -> GradientsParams {
    let mut collector = GradsCollector::<AB> {
        grads,
        grads_params: GradientsParams::new(),
    };
    module.visit(&mut collector);

    collector.grads_params
}

impl<AB: AutodiffBackend> ModuleVisitor<AB> for GradsCollector<'_, AB> {
    fn visit_float<const D: usize>(
        &mut self,
        id: &ParamId,
        tensor: &Tensor<AB, D>,
    ) {
        if let Some(grad) = tensor.grad_remove(self.grads) {
            self.grads_params.register(id.to_owned(), grad);
        }
    }
}

impl fmt::Debug for OptimizerConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("OptimizerConfig")
            .field("adamw", &self.adamw.to_string())
            .field("learning_rate_geometry", &self.learning_rate_geometry)
            .field("learning_rate_appearance", &self.learning_rate_appearance)
            .finish()
    }
}

impl Default for OptimizerConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
