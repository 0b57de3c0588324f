#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Empty batch: at least one camera sample is required")]
    EmptyBatch,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mismatched resolution in batch: expected {0:?}, found {1:?}")]
    MismatchedResolution([usize; 2], [usize; 2]),

    #[error("Tensor data error: {0}")]
    TensorData(String),
}
