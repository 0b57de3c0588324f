//! Dynamic loss scaling for mixed-precision training.

pub use super::*;
pub use burn::{
    module::{Module, ModuleVisitor, ParamId},
    tensor::{backend::Backend, ElementConversion, Tensor},
};

use std::marker::PhantomData;

#[derive(Config, Copy, Debug, PartialEq)]
pub struct GradScalerConfig {
    #[config(default = "65536.0")]
    pub init_scale: f64,

    #[config(default = "2.0")]
    pub growth_factor: f64,

    #[config(default = "0.5")]
    pub backoff_factor: f64,

    /// The count of consecutive finite steps before growing the scale.
    #[config(default = "2000")]
    pub growth_interval: u64,

    /// Pinning the scale to one if disabled.
    #[config(default = "true")]
    pub enabled: bool,
}

/// A loss scaler skipping the steps whose gradients overflow.
#[derive(Clone, Debug, PartialEq)]
pub struct GradScaler {
    pub config: GradScalerConfig,
    pub growth_tracker: u64,
    pub has_overflow: bool,
    pub scale: f64,
}

struct GradUnscaler<'a, AB: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    has_overflow: bool,
    inverse_scale: f64,
    phantom: PhantomData<AB>,
}

impl GradScalerConfig {
    pub fn init(&self) -> GradScaler {
        GradScaler {
            config: *self,
            growth_tracker: 0,
            has_overflow: false,
            scale: if self.enabled { self.init_scale } else { 1.0 },
        }
    }
}

impl GradScaler {
    #[inline]
    pub fn scale<AB: AutodiffBackend, const D: usize>(
        &self,
        loss: Tensor<AB, D>,
    ) -> Tensor<AB, D> {
        loss.mul_scalar(self.scale)
    }

    /// Dividing the gradients of `module` by the scale in place.
    ///
    /// Any non-finite gradient marks the current step as overflowed.
    pub fn unscale<AB: AutodiffBackend, M: Module<AB>>(
        &mut self,
        module: &M,
        grads: &mut GradientsParams,
    ) -> &mut Self {
        let mut unscaler = GradUnscaler::<AB> {
            grads,
            has_overflow: false,
            inverse_scale: self.scale.recip(),
            phantom: PhantomData,
        };
        module.visit(&mut unscaler);

        self.has_overflow |= unscaler.has_overflow;
        self
    }

    #[inline]
    pub fn should_step(&self) -> bool {
        !self.has_overflow
    }

    /// Adjusting the scale after a step and resetting the overflow state.
    pub fn update(&mut self) -> &mut Self {
        let has_overflow = std::mem::take(&mut self.has_overflow);

        if !self.config.enabled {
            return self;
        }

        if has_overflow {
            self.scale *= self.config.backoff_factor;
            self.growth_tracker = 0;

            #[cfg(all(debug_assertions, not(test)))]
            log::debug!(
                target: "textmesh::trainer::optimize",
                "GradScaler::update > backoff > {}",
                self.scale,
            );
        } else {
            self.growth_tracker += 1;
            if self.growth_tracker >= self.config.growth_interval {
                self.scale *= self.config.growth_factor;
                self.growth_tracker = 0;
            }
        }

        self
    }
}

impl<'a, AB: AutodiffBackend> ModuleVisitor<AB> for GradUnscaler<'a, AB> {
    fn visit_float<const D: usize>(
        &mut self,
        id: &ParamId,
        _tensor: &Tensor<AB, D>,
    ) {
        if let Some(grad) = self.grads.remove::<AB::InnerBackend, D>(id) {
            let grad = grad.mul_scalar(self.inverse_scale);
            self.has_overflow |= !is_finite(grad.to_owned());
            self.grads.register(id.to_owned(), grad);
        }
    }
}

/// Checking that no element is infinite or NaN.
pub fn is_finite<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> bool {
    let has_nan = !tensor
        .to_owned()
        .equal(tensor.to_owned())
        .all()
        .into_scalar();
    let max = tensor.abs().max().into_scalar().elem::<f64>();

    !has_nan && max.is_finite()
}

impl Default for GradScalerConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Default for GradScaler {
    #[inline]
    fn default() -> Self {
        GradScalerConfig::default().init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        module::Param,
    };

    type AB = Autodiff<NdArray>;

    fn grads_of(
        param: &Param<Tensor<AB, 1>>,
        loss: Tensor<AB, 1>,
    ) -> GradientsParams {
        let mut grads = loss.backward();
        take_module_grads(&mut grads, param)
    }

    #[test]
    fn unscale_divides_by_scale() {
        let device = Default::default();
        let mut scaler = GradScalerConfig::new().with_init_scale(8.0).init();
        let param = Param::from_tensor(Tensor::<AB, 1>::from_floats([1.0, 2.0], &device));

        let loss = scaler.scale(param.val().mul_scalar(3.0).sum());
        let mut grads = grads_of(&param, loss);
        scaler.unscale(&param, &mut grads);

        let grad = grads
            .get::<NdArray, 1>(&param.id)
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(grad, [3.0, 3.0]);
        assert!(scaler.should_step());
    }

    #[test]
    fn backoff_on_overflow() {
        let device = Default::default();
        let mut scaler = GradScalerConfig::new().with_init_scale(4.0).init();
        let param = Param::from_tensor(Tensor::<AB, 1>::from_floats([1.0, 2.0], &device));

        let loss = scaler.scale(param.val().mul_scalar(f32::INFINITY).sum());
        let mut grads = grads_of(&param, loss);
        scaler.unscale(&param, &mut grads);
        assert!(!scaler.should_step());

        scaler.update();
        assert_eq!(scaler.scale, 2.0);
        assert_eq!(scaler.growth_tracker, 0);
        assert!(scaler.should_step());
    }

    #[test]
    fn large_finite_grads_step() {
        let device = Default::default();
        let mut scaler = GradScalerConfig::new().with_init_scale(1.0).init();
        let param = Param::from_tensor(Tensor::<AB, 1>::from_floats([1.0, 2.0, 3.0], &device));

        let loss = scaler.scale(param.val().mul_scalar(3e38).sum());
        let mut grads = grads_of(&param, loss);
        scaler.unscale(&param, &mut grads);
        assert!(scaler.should_step());
    }

    #[test]
    fn skip_on_nan_grads() {
        let device = Default::default();
        let mut scaler = GradScalerConfig::new().with_init_scale(1.0).init();
        let param = Param::from_tensor(Tensor::<AB, 1>::from_floats([1.0, 2.0], &device));

        let loss = scaler.scale(param.val().mul_scalar(f32::NAN).sum());
        let mut grads = grads_of(&param, loss);
        scaler.unscale(&param, &mut grads);
        assert!(!scaler.should_step());
    }

    #[test]
    fn is_finite_per_element() {
        let device = Default::default();
        let tensor = |values: [f32; 3]| Tensor::<NdArray, 1>::from_floats(values, &device);

        assert!(is_finite(tensor([3e38, 3e38, -3e38])));
        assert!(!is_finite(tensor([1.0, f32::INFINITY, 0.0])));
        assert!(!is_finite(tensor([f32::NAN, 1.0, 0.0])));
        assert!(!is_finite(tensor([0.0, 1.0, f32::NEG_INFINITY])));
    }

    #[test]
    fn growth_after_interval() {
        let mut scaler = GradScalerConfig::new()
            .with_init_scale(1.0)
            .with_growth_interval(3)
            .init();

        scaler.update().update();
        assert_eq!(scaler.scale, 1.0);
        scaler.update();
        assert_eq!(scaler.scale, 2.0);
        assert_eq!(scaler.growth_tracker, 0);

        scaler.update().update();
        scaler.has_overflow = true;
        scaler.update();
        assert_eq!(scaler.scale, 1.0);
        assert_eq!(scaler.growth_tracker, 0);
    }

    #[test]
    fn disabled_pins_scale() {
        let mut scaler = GradScalerConfig::new()
            .with_enabled(false)
            .with_growth_interval(1)
            .init();
        assert_eq!(scaler.scale, 1.0);

        scaler.has_overflow = true;
        scaler.update();
        scaler.update();
        assert_eq!(scaler.scale, 1.0);
        assert!(scaler.should_step());
    }
}
