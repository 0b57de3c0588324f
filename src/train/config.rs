pub use super::*;

/// The bias of a trainable light initialized without a probe.
pub const LIGHT_INIT_BIAS: f64 = 1.0;

/// The scale of a trainable light initialized without a probe.
pub const LIGHT_INIT_SCALE: f64 = 0.0;

#[derive(Config, Debug)]
pub struct TrainerConfig {
    #[config(default = "5000")]
    pub iteration_count: u64,

    #[config(default = "1")]
    pub batch_size: usize,

    #[config(default = "PhaseSchedule::new()")]
    pub schedule: PhaseSchedule,

    #[config(default = "true")]
    pub optimize_geometry: bool,

    #[config(default = "false")]
    pub optimize_light: bool,

    /// Looking the light up in camera space
    #[config(default = "false")]
    pub camera_space_light: bool,

    /// Rendering coarsely before the fine stage
    #[config(default = "false")]
    pub coarse_render: bool,

    #[config(default = "false")]
    pub use_bump: bool,

    #[config(default = "false")]
    pub flip_normal: bool,

    #[config(default = "BackgroundMode::Black")]
    pub train_background: BackgroundMode,

    /// `[height, width]`
    #[config(default = "[1024, 1024]")]
    pub texture_resolution: [usize; 2],

    #[config(default = "4")]
    pub uv_padding_block: usize,

    #[config(default = "MaterialBounds::new()")]
    pub material_bounds: MaterialBounds,

    /// The weight of the diffuse total variation, disabled if zero
    #[config(default = "0.0")]
    pub material_smoothness_weight: f64,

    #[config(default = "512")]
    pub light_resolution: usize,

    /// A latlong HDR probe to initialize the light from
    #[config(default = "None")]
    pub envmap: Option<String>,

    #[config(default = "1.0")]
    pub env_scale: f32,

    /// `[height, width]` of the exported probe
    #[config(default = "[512, 1024]")]
    pub probe_resolution: [usize; 2],

    #[config(default = "GuidanceConfig::new()")]
    pub guidance: GuidanceConfig,

    #[config(default = "OptimizerConfig::new()")]
    pub optimizer: OptimizerConfig,

    #[config(default = "GradScalerConfig::new()")]
    pub grad_scaler: GradScalerConfig,

    /// Iterations saving a preview
    #[config(default = "IterationRange::every(1000)")]
    pub save_interval: IterationRange,

    /// Iterations reporting the progress, disabled if zero
    #[config(default = "100")]
    pub log_interval: u64,

    /// Frames per second of validation animations
    #[config(default = "30")]
    pub frame_rate: u32,

    #[config(default = "Vec::new()")]
    pub display: Vec<DisplayLayer>,

    #[config(default = "\"out\".into()")]
    pub out_dir: String,

    /// Rendering the animation views when finishing
    #[config(default = "true")]
    pub validate: bool,
}

impl TrainerConfig {
    /// Loading the configuration from a JSON file overriding the defaults.
    #[inline]
    pub fn load_with_overrides(path: impl AsRef<Path>) -> Result<Self, Error> {
        crate::config::load_with_overrides(path)
    }

    pub fn init<AB, G, R, S, P>(
        &self,
        device: &AB::Device,
        geometry: G,
        renderer: R,
        guidance: S,
        replica: P,
    ) -> Result<Trainer<AB, G, R, S, P>, Error>
    where
        AB: AutodiffBackend,
        G: Geometry<AB>,
    {
        self.validate()?;

        let material = Material::init(&self.material_bounds, self.texture_resolution, device);
        let light = match &self.envmap {
            Some(path) => {
                EnvironmentLight::load(path, self.light_resolution, self.env_scale, device)?
            },
            None if self.optimize_light => EnvironmentLight::init_random(
                self.light_resolution,
                LIGHT_INIT_SCALE,
                LIGHT_INIT_BIAS,
                device,
            ),
            None => EnvironmentLight::uniform(self.light_resolution, self.env_scale, device),
        };
        let light = if self.optimize_light {
            light
        } else {
            light.no_grad()
        };

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "textmesh::trainer::train",
            "TrainerConfig::init > light resolution {}",
            light.resolution(),
        );

        Ok(Trainer {
            config: self.to_owned(),
            device: device.to_owned(),
            geometry,
            guidance,
            history: LossHistory::default(),
            iteration: 0,
            light_mips: light.build_mips(),
            light,
            material,
            optimizer_geometry: self.optimize_geometry.then(|| self.optimizer.init()),
            optimizer_light: self.optimize_light.then(|| self.optimizer.init()),
            optimizer_material: self.optimizer.init(),
            renderer,
            replica,
            scaler: self.grad_scaler.init(),
        })
    }
}

impl Validate for TrainerConfig {
    fn validate(&self) -> Result<(), Error> {
        let positive = [
            ("iteration_count", self.iteration_count as usize),
            ("batch_size", self.batch_size),
            ("texture_resolution[0]", self.texture_resolution[0]),
            ("texture_resolution[1]", self.texture_resolution[1]),
            ("light_resolution", self.light_resolution),
            ("probe_resolution[0]", self.probe_resolution[0]),
            ("probe_resolution[1]", self.probe_resolution[1]),
            ("frame_rate", self.frame_rate as usize),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidConfig(format!("{name} should be positive")));
        }

        if self.material_smoothness_weight < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "material_smoothness_weight should be non-negative: {}",
                self.material_smoothness_weight
            )));
        }

        self.material_bounds.validate()?;
        self.guidance.validate()
    }
}

impl Default for TrainerConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
