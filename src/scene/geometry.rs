pub use super::*;
pub use crate::error::Error;

use std::fmt;

/// A differentiable surface representation.
///
/// It is optimized only by the geometry optimizer.
pub trait Geometry<AB: AutodiffBackend>: AutodiffModule<AB> + fmt::Debug {
    /// The loss fitting the geometry to its prior shape.
    fn pretrain_loss(
        &self,
        iteration: u64,
    ) -> Tensor<AB, 1>;

    /// The regularization added to the guidance loss.
    fn regularization_loss(
        &self,
        iteration: u64,
    ) -> Tensor<AB, 1>;

    /// Extracting a triangle mesh with per-vertex normals and texture coordinates.
    fn to_mesh(&self) -> Result<Mesh, Error>;
}

/// A host-side triangle mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// Zero-based vertex indices shared by positions, normals and uvs.
    pub triangles: Vec<[u32; 3]>,
}
