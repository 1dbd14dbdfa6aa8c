//! Rank glyph classification.

use crate::board::Rank;

use anyhow::{Context, Result, bail};
use image::RgbImage;
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Black box turning a glyph patch into a rank label (`A`, `2`..`10`, `J`, `Q`, `K`).
pub trait GlyphClassifier: Send + Sync {
    fn classify(&self, glyph: &RgbImage) -> Option<String>;
}

/// Pixels drawn in card ink: saturated red or near-black.
pub fn ink_mask(image: &RgbImage) -> Vec<bool> {
    image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            (r > 150 && g < 20 && b < 20) || (r < 20 && g < 20 && b < 20)
        })
        .collect()
}

/// Nearest-neighbour classifier over binarised, labelled glyph samples.
#[derive(Debug, Clone)]
pub struct SampleClassifier {
    width: u32,
    height: u32,
    samples: Vec<(String, Vec<bool>)>,
}

impl SampleClassifier {
    pub fn from_samples<I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, RgbImage)>,
    {
        let mut dims = None;
        let mut list = vec![];
        for (label, image) in samples {
            if Rank::parse(&label).is_none() {
                bail!("Invalid glyph label '{label}'");
            }
            let size = image.dimensions();
            match dims {
                None => dims = Some(size),
                Some(expected) if expected != size => bail!(
                    "Glyph sample for '{label}' is {}x{}, expected {}x{}",
                    size.0,
                    size.1,
                    expected.0,
                    expected.1
                ),
                Some(_) => {}
            }
            list.push((label, ink_mask(&image)));
        }
        let Some((width, height)) = dims else {
            bail!("No glyph samples");
        };
        Ok(Self {
            width,
            height,
            samples: list,
        })
    }

    /// Loads `<dir>/<label>/*.png`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut samples = vec![];
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read samples at '{}'", dir.display()))?;
        for entry in entries {
            let label_dir = entry?.path();
            if !label_dir.is_dir() {
                continue;
            }
            let label = label_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            for file in std::fs::read_dir(&label_dir)? {
                let path = file?.path();
                if path.extension().is_none_or(|ext| ext != "png") {
                    continue;
                }
                let image = image::open(&path)
                    .with_context(|| format!("Failed to load sample '{}'", path.display()))?
                    .to_rgb8();
                samples.push((label.clone(), image));
            }
        }
        let classifier = Self::from_samples(samples)
            .with_context(|| format!("Failed to build classifier from '{}'", dir.display()))?;
        info!(
            samples = classifier.len(),
            "Loaded glyph samples from {}",
            dir.display()
        );
        Ok(classifier)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl GlyphClassifier for SampleClassifier {
    fn classify(&self, glyph: &RgbImage) -> Option<String> {
        if glyph.dimensions() != (self.width, self.height) {
            debug!(
                "Glyph is {}x{}, samples are {}x{}",
                glyph.width(),
                glyph.height(),
                self.width,
                self.height
            );
            return None;
        }
        let mask = ink_mask(glyph);
        if !mask.contains(&true) {
            return None;
        }
        self.samples
            .iter()
            .min_by_key(|(_, sample)| sample.iter().zip(&mask).filter(|(a, b)| a != b).count())
            .map(|(label, _)| label.clone())
    }
}

static SHARED: OnceCell<Arc<SampleClassifier>> = OnceCell::new();

/// Process-wide classifier, loaded from `dir` on first use and read-only afterwards.
pub fn shared_classifier(dir: &Path) -> Result<Arc<dyn GlyphClassifier>> {
    let classifier = SHARED.get_or_try_init(|| SampleClassifier::from_dir(dir).map(Arc::new))?;
    Ok(classifier.clone())
}
