//! Cameras orbiting an object at the origin.

pub use super::*;

use crate::config::Validate;
use burn::config::Config;
use nalgebra::{Matrix3, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// The number of validation views.
pub const VALIDATION_VIEW_COUNT: usize = 4;

/// The number of views in an orbit animation.
pub const ANIMATION_VIEW_COUNT: usize = 100;

#[derive(Config, Debug, PartialEq)]
pub struct CameraConfig {
    /// Degrees
    #[config(default = "[25.71, 45.0]")]
    pub fovy_range: [f32; 2],

    /// Degrees, within `[-90, 90]`
    #[config(default = "[-10.0, 45.0]")]
    pub elevation_range: [f32; 2],

    /// The look-at offset range on x and y.
    #[config(default = 0.4)]
    pub jitter: f32,

    #[config(default = 3.0)]
    pub radius: f32,

    #[config(default = "[1.0, 50.0]")]
    pub near_far: [f32; 2],

    /// Views within this azimuth (degrees) from `+z` face the front.
    #[config(default = 45.0)]
    pub front_threshold: f32,

    /// `[height, width]`
    #[config(default = "[512, 512]")]
    pub resolution: [usize; 2],

    #[config(default = 1)]
    pub spp: usize,

    /// Degrees
    #[config(default = 45.0)]
    pub validation_fovy: f32,

    /// Degrees
    #[config(default = 20.0)]
    pub validation_elevation: f32,

    /// The tile count along the longer side of a checker background.
    #[config(default = 8)]
    pub checker_tile_count: usize,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OrbitKind {
    /// Random views
    Train,
    /// Evenly spaced views at a fixed elevation
    Validate,
    /// Evenly spaced views at a fixed elevation
    Animation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrbitDataset {
    pub config: CameraConfig,
    pub has_checker_background: bool,
    pub kind: OrbitKind,
    pub len: usize,
    pub rank: usize,
    pub seed: u64,
}

impl OrbitDataset {
    pub fn train(
        config: CameraConfig,
        len: usize,
        seed: u64,
        rank: usize,
    ) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            has_checker_background: false,
            kind: OrbitKind::Train,
            len,
            rank,
            seed,
        })
    }

    pub fn validate(config: CameraConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            has_checker_background: false,
            kind: OrbitKind::Validate,
            len: VALIDATION_VIEW_COUNT,
            rank: 0,
            seed: 0,
        })
    }

    pub fn animation(config: CameraConfig) -> Result<Self, Error> {
        Ok(Self {
            len: ANIMATION_VIEW_COUNT,
            kind: OrbitKind::Animation,
            ..Self::validate(config)?
        })
    }

    #[inline]
    pub fn with_checker_background(
        mut self,
        has_checker_background: bool,
    ) -> Self {
        self.has_checker_background = has_checker_background;
        self
    }

    /// Placing a camera.
    ///
    /// All angles are in degrees.
    pub fn sample(
        &self,
        azimuth: f32,
        elevation: f32,
        fovy: f32,
        offset: [f32; 2],
    ) -> CameraSample {
        let [height, width] = self.config.resolution;
        let [near, far] = self.config.near_far;
        let aspect = width as f32 / height as f32;

        let rotation = rotate_x(-elevation.to_radians()) * rotate_y(azimuth.to_radians());
        let mv = translate(offset[0], offset[1], -self.config.radius) * rotation;
        let mvp = perspective(fovy.to_radians(), aspect, near, far) * mv;

        // The inverse of a rigid transform
        let rotation_3d: Matrix3<f32> = rotation.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = Vector3::new(offset[0], offset[1], -self.config.radius);
        let campos = -(rotation_3d.transpose() * translation);

        CameraSample {
            mv,
            mvp,
            normal_rotate: rotation,
            campos: [campos.x, campos.y, campos.z],
            resolution: self.config.resolution,
            spp: self.config.spp,
            direction: self.direction(azimuth),
            background: self.has_checker_background.then(|| {
                checkerboard(self.config.resolution, self.config.checker_tile_count)
            }),
        }
    }

    /// Labeling the azimuth in `[-180, 180]` degrees.
    pub fn direction(
        &self,
        azimuth: f32,
    ) -> ViewDirection {
        let azimuth = azimuth.abs();
        let threshold = self.config.front_threshold;

        if azimuth <= threshold {
            ViewDirection::Front
        } else if azimuth >= 180.0 - threshold {
            ViewDirection::Back
        } else {
            ViewDirection::Side
        }
    }

    fn rng(
        &self,
        index: usize,
    ) -> StdRng {
        StdRng::seed_from_u64(
            self.seed
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add((self.rank as u64) << 32)
                .wrapping_add(index as u64),
        )
    }
}

impl Dataset for OrbitDataset {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn get(
        &self,
        index: usize,
    ) -> CameraSample {
        match self.kind {
            OrbitKind::Train => {
                let mut rng = self.rng(index);
                let [fovy_min, fovy_max] = self.config.fovy_range;
                let [elevation_min, elevation_max] = self.config.elevation_range;
                let jitter = self.config.jitter * 0.5;

                let fovy = rng.gen_range(fovy_min..=fovy_max);
                let azimuth = rng.gen_range(-180.0..180.0);
                let elevation = rng.gen_range(elevation_min..=elevation_max);
                let offset = if jitter > 0.0 {
                    [rng.gen_range(-jitter..=jitter), rng.gen_range(-jitter..=jitter)]
                } else {
                    [0.0; 2]
                };

                #[cfg(all(debug_assertions, not(test)))]
                log::debug!(
                    target: "textmesh::trainer::dataset",
                    "OrbitDataset::get > train {index} > azimuth {azimuth}",
                );

                self.sample(azimuth, elevation, fovy, offset)
            },
            OrbitKind::Validate | OrbitKind::Animation => {
                let mut azimuth = index as f32 / self.len.max(1) as f32 * 360.0;
                if azimuth > 180.0 {
                    azimuth -= 360.0;
                }

                self.sample(
                    azimuth,
                    self.config.validation_elevation,
                    self.config.validation_fovy,
                    [0.0; 2],
                )
            },
        }
    }
}

impl Validate for CameraConfig {
    fn validate(&self) -> Result<(), Error> {
        let ordered = [
            ("fovy_range", self.fovy_range),
            ("elevation_range", self.elevation_range),
            ("near_far", self.near_far),
        ];
        if let Some((name, [min, max])) = ordered
            .into_iter()
            .find(|(_, [min, max])| !min.is_finite() || !max.is_finite() || min > max)
        {
            return Err(Error::InvalidConfig(format!(
                "{name} should be an ordered range: [{min}, {max}]"
            )));
        }

        let fovys = [self.fovy_range[0], self.fovy_range[1], self.validation_fovy];
        if fovys.iter().any(|fovy| *fovy <= 0.0 || *fovy >= 180.0) {
            return Err(Error::InvalidConfig(format!(
                "Field of view should be in (0, 180) degrees: {fovys:?}"
            )));
        }

        let elevations = [
            self.elevation_range[0],
            self.elevation_range[1],
            self.validation_elevation,
        ];
        if elevations.iter().any(|elevation| elevation.abs() > 90.0) {
            return Err(Error::InvalidConfig(format!(
                "Elevation should be in [-90, 90] degrees: {elevations:?}"
            )));
        }

        let [near, far] = self.near_far;
        if near <= 0.0 || near >= far {
            return Err(Error::InvalidConfig(format!(
                "near_far should satisfy 0 < near < far: [{near}, {far}]"
            )));
        }

        if self.resolution.contains(&0) || self.spp == 0 {
            return Err(Error::InvalidConfig(format!(
                "Resolution and spp should be positive: {:?}, {}",
                self.resolution, self.spp
            )));
        }

        if !self.jitter.is_finite()
            || !self.radius.is_finite()
            || self.jitter < 0.0
            || self.radius <= 0.0
        {
            return Err(Error::InvalidConfig(format!(
                "jitter should be non-negative and radius positive: {}, {}",
                self.jitter, self.radius
            )));
        }

        Ok(())
    }
}

impl Default for CameraConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// A perspective projection with the OpenGL convention and a flipped y.
pub fn perspective(
    fovy: f32,
    aspect: f32,
    near: f32,
    far: f32,
) -> Matrix4<f32> {
    let y = (fovy * 0.5).tan();
    #[rustfmt::skip]
    let projection = Matrix4::new(
        1.0 / (y * aspect), 0.0, 0.0, 0.0,
        0.0, -1.0 / y, 0.0, 0.0,
        0.0, 0.0, -(far + near) / (far - near), -(2.0 * far * near) / (far - near),
        0.0, 0.0, -1.0, 0.0,
    );
    projection
}

pub fn translate(
    x: f32,
    y: f32,
    z: f32,
) -> Matrix4<f32> {
    Matrix4::new_translation(&Vector3::new(x, y, z))
}

pub fn rotate_x(angle: f32) -> Matrix4<f32> {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let rotation = Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, c, s, 0.0,
        0.0, -s, c, 0.0,
        0.0, 0.0, 0.0, 1.0,
    );
    rotation
}

pub fn rotate_y(angle: f32) -> Matrix4<f32> {
    let (s, c) = angle.sin_cos();
    #[rustfmt::skip]
    let rotation = Matrix4::new(
        c, 0.0, s, 0.0,
        0.0, 1.0, 0.0, 0.0,
        -s, 0.0, c, 0.0,
        0.0, 0.0, 0.0, 1.0,
    );
    rotation
}

/// A grey checkerboard of shape `[height, width, 3]`.
pub fn checkerboard(
    [height, width]: [usize; 2],
    tile_count: usize,
) -> Vec<f32> {
    let tile_size = (height.max(width) / tile_count.max(1)).max(1);

    (0..height * width)
        .flat_map(|index| {
            let (row, col) = (index / width, index % width);
            let value = if (row / tile_size + col / tile_size) % 2 == 0 {
                0.0
            } else {
                1.0
            };
            [value; 3]
        })
        .collect()
}
