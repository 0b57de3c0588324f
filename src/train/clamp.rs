pub use super::*;

impl<AB, G, R, S, P> Trainer<AB, G, R, S, P>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
{
    /// Projecting the material and the light back to their valid ranges.
    pub fn clamp(&mut self) -> &mut Self {
        self.material = self
            .material
            .to_owned()
            .clamp(&self.config.material_bounds)
            .normalize();
        self.light = self.light.to_owned().clamp_min(0.0);

        self
    }
}
