//! Color transfer functions on tensors.

pub use burn::tensor::{backend::Backend, Tensor};

/// The linear value below which sRGB encoding is linear.
pub const SRGB_LINEAR_THRESHOLD: f64 = 0.0031308;

/// Encoding linear radiance to display-gamma (sRGB) values.
pub fn rgb_to_srgb<B: Backend, const D: usize>(
    value: Tensor<B, D>
) -> Tensor<B, D> {
    let is_linear = value.to_owned().lower_equal_elem(SRGB_LINEAR_THRESHOLD);
    let linear = value.to_owned().mul_scalar(12.92);

    value
        .clamp_min(SRGB_LINEAR_THRESHOLD)
        .powf_scalar(1.0 / 2.4)
        .mul_scalar(1.055)
        .sub_scalar(0.055)
        .mask_where(is_linear, linear)
}

/// Mapping unit vectors from `[-1, 1]` to displayable `[0, 1]`.
#[inline]
pub fn normal_to_display<B: Backend, const D: usize>(
    value: Tensor<B, D>
) -> Tensor<B, D> {
    value.add_scalar(1.0).mul_scalar(0.5)
}

#[cfg(test)]
mod tests {
    #[test]
    fn rgb_to_srgb() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let value = Tensor::<NdArray, 1>::from_floats(
            [0.0, 0.001, SRGB_LINEAR_THRESHOLD as f32, 0.5, 1.0],
            &device,
        );

        let output = super::rgb_to_srgb(value).into_data();
        let target = Tensor::<NdArray, 1>::from_floats(
            [0.0, 0.01292, 0.040449936, 0.7353570, 1.0],
            &device,
        )
        .into_data();
        output.assert_approx_eq(&target, 4);
    }

    #[test]
    fn normal_to_display() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let value = Tensor::<NdArray, 1>::from_floats([-1.0, 0.0, 1.0], &device);

        let output = super::normal_to_display(value).into_data();
        let target =
            Tensor::<NdArray, 1>::from_floats([0.0, 0.5, 1.0], &device).into_data();
        output.assert_approx_eq(&target, 6);
    }
}
