//! Rendering validation views and assembling their animations.

pub use crate::{
    batch::{BackgroundMode, Batch},
    dataset::Dataset,
    distributed::Replica,
    error::Error,
    function::*,
    guidance::Guidance,
    render::{Bsdf, Renderer},
    scene::*,
    train::Trainer,
};

use dashmap::DashMap;
use image::{
    codecs::gif::{GifEncoder, Repeat},
    Delay, Frame,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs,
    io::BufWriter,
    path::{Path, PathBuf},
};

/// The file name of a channel animation.
pub const ANIMATION_FILE_NAME: &str = "eval.gif";

/// A kind of image saved for every validation view.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Shaded,
    Relight,
    Kd,
    Ks,
    Normal,
    Mask,
}

/// An extra panel of the validation composite.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayLayer {
    /// The light unrolled to latitude-longitude
    Latlong(bool),
    /// A render with the given shading model
    Bsdf(Bsdf),
}

#[derive(Clone, Debug)]
pub struct ValidationOutput<B: Backend> {
    /// Every panel side by side, `[H, W', 3]`
    pub composite: Tensor<B, 3>,
    /// `[H, W, C]`
    pub layers: BTreeMap<Channel, Tensor<B, 3>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValidationSummary {
    pub animations: Vec<PathBuf>,
    pub frame_counts: BTreeMap<Channel, usize>,
}

impl Channel {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Shaded => "shaded",
            Self::Relight => "relight",
            Self::Kd => "kd",
            Self::Ks => "ks",
            Self::Normal => "normal",
            Self::Mask => "mask",
        }
    }

    pub const fn from_bsdf(bsdf: Bsdf) -> Option<Self> {
        match bsdf {
            Bsdf::Kd => Some(Self::Kd),
            Bsdf::Ks => Some(Self::Ks),
            Bsdf::Normal => Some(Self::Normal),
            Bsdf::Pbr | Bsdf::Diffuse => None,
        }
    }
}

impl<AB, G, R, S, P> Trainer<AB, G, R, S, P>
where
    AB: AutodiffBackend,
    G: Geometry<AB>,
    R: Renderer<AB, G>,
    S: Guidance<AB>,
    P: Replica,
{
    /// Rendering the first view of `batch` with every display layer.
    pub fn validate_view(
        &self,
        batch: &Batch<AB>,
        relight: Option<&EnvironmentLight<AB>>,
    ) -> Result<ValidationOutput<AB>, Error> {
        let stage = self.stage();
        let render = |light: &EnvironmentLight<AB>, bsdf: Option<Bsdf>| {
            let mut mips = light.build_mips();
            if self.config.camera_space_light {
                mips = mips.transform(batch.mv.to_owned());
            }
            let options = self.render_options(bsdf, stage);
            let shaded = self
                .renderer
                .render(batch, &self.geometry, &mips, &self.material, &options)
                .shaded;
            let [_, height, width, channel_count] = shaded.dims();
            shaded
                .slice([0..1, 0..height, 0..width, 0..channel_count])
                .reshape([height, width, channel_count])
        };

        let buffer = render(&self.light, None);
        let [height, width, _] = buffer.dims();
        let rgb = |buffer: Tensor<AB, 3>| buffer.slice([0..height, 0..width, 0..3]);

        let mut layers = BTreeMap::new();
        let shaded = rgb_to_srgb(rgb(buffer.to_owned()));
        layers.insert(Channel::Mask, buffer.slice([0..height, 0..width, 3..4]));
        layers.insert(Channel::Shaded, shaded.to_owned());
        let mut composite = vec![shaded];

        if let Some(relight) = relight {
            let relit = rgb_to_srgb(rgb(render(relight, None)));
            layers.insert(Channel::Relight, relit.to_owned());
            composite.push(relit);
        }

        for layer in &self.config.display {
            match *layer {
                DisplayLayer::Latlong(true) => {
                    let latlong = self.light.to_latlong([height, height * 2])?;
                    composite.push(rgb_to_srgb(latlong));
                },
                DisplayLayer::Latlong(false) => {},
                DisplayLayer::Bsdf(bsdf) => {
                    let image = rgb(render(&self.light, Some(bsdf)));
                    let image = match bsdf {
                        Bsdf::Kd => rgb_to_srgb(image),
                        Bsdf::Normal => normal_to_display(image),
                        Bsdf::Pbr | Bsdf::Diffuse | Bsdf::Ks => image,
                    };
                    if let Some(channel) = Channel::from_bsdf(bsdf) {
                        layers.insert(channel, image.to_owned());
                    }
                    composite.push(image);
                },
            }
        }

        Ok(ValidationOutput {
            composite: Tensor::cat(composite, 1),
            layers,
        })
    }

    /// Saving every channel of every view in `dataset` under `out_dir`.
    ///
    /// Each channel with frames gets an animation.
    pub fn validate(
        &self,
        dataset: &impl Dataset,
        out_dir: impl AsRef<Path>,
        relight: Option<&EnvironmentLight<AB>>,
    ) -> Result<ValidationSummary, Error> {
        let out_dir = out_dir.as_ref();
        let frame_counts = DashMap::<Channel, usize>::new();

        for index in 0..dataset.len() {
            let batch = dataset
                .batch([index])?
                .prepare::<AB>(BackgroundMode::White, &self.device);
            let output = self.validate_view(&batch, relight)?;
            let images = output
                .layers
                .into_iter()
                .map(|(channel, layer)| Ok((channel, get_image_from_tensor(layer)?)))
                .collect::<Result<Vec<_>, Error>>()?;

            images
                .into_par_iter()
                .try_for_each(|(channel, image)| -> Result<(), Error> {
                    let directory = out_dir.join(channel.name());
                    if !frame_counts.contains_key(&channel) {
                        fs::create_dir_all(&directory)?;
                    }

                    let name = channel.name();
                    image.save(directory.join(format!("val_{index:06}_{name}.png")))?;
                    *frame_counts.entry(channel).or_default() += 1;

                    Ok(())
                })?;
        }

        let frame_counts = frame_counts.into_iter().collect::<BTreeMap<_, _>>();
        let animations = frame_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(channel, _)| {
                save_animation(out_dir.join(channel.name()), self.config.frame_rate)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        log::info!(
            target: "textmesh::trainer::validate",
            "Trainer::validate > {} views > {} animations",
            dataset.len(),
            animations.len(),
        );

        Ok(ValidationSummary {
            animations,
            frame_counts,
        })
    }
}

/// Encoding the PNG frames in `directory` to a looping GIF in name order.
pub fn save_animation(
    directory: impl AsRef<Path>,
    frame_rate: u32,
) -> Result<PathBuf, Error> {
    let directory = directory.as_ref();
    let mut frame_paths = fs::read_dir(directory)?
        .map(|entry| Ok(entry?.path()))
        .collect::<Result<Vec<_>, Error>>()?;
    frame_paths.retain(|path| path.extension() == Some(OsStr::new("png")));
    frame_paths.sort();

    let delay = Delay::from_numer_denom_ms(1000, frame_rate.max(1));
    let frames = frame_paths
        .par_iter()
        .map(|path| Ok(Frame::from_parts(image::open(path)?.to_rgba8(), 0, 0, delay)))
        .collect::<Result<Vec<_>, Error>>()?;

    let path = directory.join(ANIMATION_FILE_NAME);
    let mut encoder = GifEncoder::new(BufWriter::new(fs::File::create(&path)?));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{codecs::gif::GifDecoder, AnimationDecoder, RgbImage};
    use std::{fs::File, io::BufReader};

    #[test]
    fn display_layer_serde() {
        let layers = serde_json::from_str::<Vec<DisplayLayer>>(
            r#"[{"latlong": true}, {"bsdf": "kd"}, {"bsdf": "normal"}]"#,
        )
        .unwrap();
        assert_eq!(
            layers,
            [
                DisplayLayer::Latlong(true),
                DisplayLayer::Bsdf(Bsdf::Kd),
                DisplayLayer::Bsdf(Bsdf::Normal),
            ]
        );
    }

    #[test]
    fn save_animation_in_name_order() {
        let directory = tempfile::tempdir().unwrap();
        for (index, value) in [(2, 200), (0, 0), (1, 100)] {
            RgbImage::from_pixel(4, 4, image::Rgb([value; 3]))
                .save(directory.path().join(format!("val_{index:06}_shaded.png")))
                .unwrap();
        }

        let path = save_animation(directory.path(), 30).unwrap();
        assert_eq!(path.file_name().unwrap(), ANIMATION_FILE_NAME);

        let frames = GifDecoder::new(BufReader::new(File::open(&path).unwrap()))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 3);
        let values = frames
            .iter()
            .map(|frame| frame.buffer().get_pixel(0, 0).0[0])
            .collect::<Vec<_>>();
        assert!(values.windows(2).all(|pair| pair[0] < pair[1]), "{values:?}");

        let path = save_animation(directory.path(), 30).unwrap();
        let frames = GifDecoder::new(BufReader::new(File::open(path).unwrap()))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn channel_names() {
        assert_eq!(Channel::Shaded.name(), "shaded");
        assert_eq!(Channel::from_bsdf(Bsdf::Normal), Some(Channel::Normal));
        assert_eq!(Channel::from_bsdf(Bsdf::Pbr), None);
    }
}
