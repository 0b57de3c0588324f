pub mod geometry;
pub mod light;
pub mod material;

pub use geometry::*;
pub use light::*;
pub use material::*;

pub use burn::{
    module::{AutodiffModule, Module, Param},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};

/// Replacing the value of `param` outside of the autodiff graph.
///
/// The parameter keeps its id and whether it requires gradients.
pub fn map_param_detached<B: Backend, const D: usize>(
    param: Param<Tensor<B, D>>,
    func: impl FnOnce(Tensor<B, D>) -> Tensor<B, D>,
) -> Param<Tensor<B, D>> {
    let (id, value) = param.consume();
    let is_require_grad = value.is_require_grad();
    let value = func(value.set_require_grad(false)).set_require_grad(is_require_grad);
    Param::initialized(id, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        module::ParamId,
    };

    type AB = Autodiff<NdArray>;

    #[test]
    fn map_param_detached_on_autodiff() {
        let device = Default::default();
        let param = Param::from_tensor(Tensor::<AB, 1>::from_floats([-1.0, 2.0], &device));
        let id = param.id.to_owned();

        let param = map_param_detached(param, |value| value.clamp_min(0.0).mul_scalar(2.0));
        assert_eq!(param.id, id);
        assert!(param.val().is_require_grad());
        assert_eq!(param.val().into_data().to_vec::<f32>().unwrap(), [0.0, 4.0]);

        let param = map_param_detached(param, |value| value.add_scalar(1.0));
        let grads = param.val().mul_scalar(3.0).sum().backward();
        let grad = param.val().grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        assert_eq!(grad, [3.0, 3.0]);
    }

    #[test]
    fn map_param_detached_keeps_frozen_params_frozen() {
        let device = Default::default();
        let param = Param::initialized(ParamId::new(), Tensor::<AB, 1>::ones([2], &device));

        let param = map_param_detached(param, |value| value.neg());
        assert!(!param.val().is_require_grad());
        assert_eq!(param.val().into_data().to_vec::<f32>().unwrap(), [-1.0, -1.0]);
    }
}
