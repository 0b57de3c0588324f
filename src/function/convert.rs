pub use crate::error::Error;
pub use burn::tensor::{backend::Backend, Tensor, TensorData};
pub use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

/// Reading the values of a tensor back to the host as `f32`.
pub fn get_values_from_tensor<B: Backend, const D: usize>(
    tensor: Tensor<B, D>
) -> Result<Vec<f32>, Error> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| Error::TensorData(format!("{err:?}")))
}

/// Creating a tensor of shape `[H, W, C]` from host values.
pub fn get_tensor_from_values<B: Backend>(
    values: Vec<f32>,
    [height, width, channel_count]: [usize; 3],
    device: &B::Device,
) -> Tensor<B, 3> {
    Tensor::from_data(
        TensorData::new(values, [height, width, channel_count]),
        device,
    )
}

/// Quantizing a tensor of shape `[H, W, C]` in `[0, 1]` to an 8-bit image.
///
/// `C` should be 1, 3 or 4.
pub fn get_image_from_tensor<B: Backend>(
    tensor: Tensor<B, 3>
) -> Result<DynamicImage, Error> {
    let [height, width, channel_count] = tensor.dims();
    let values = get_values_from_tensor(tensor)?
        .into_iter()
        .map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect::<Vec<_>>();
    let (width, height) = (width as u32, height as u32);

    let image = match channel_count {
        1 => GrayImage::from_raw(width, height, values).map(DynamicImage::from),
        3 => RgbImage::from_raw(width, height, values).map(DynamicImage::from),
        4 => RgbaImage::from_raw(width, height, values).map(DynamicImage::from),
        _ => None,
    };

    image.ok_or_else(|| {
        Error::TensorData(format!(
            "Unsupported image shape: [{height}, {width}, {channel_count}]"
        ))
    })
}
