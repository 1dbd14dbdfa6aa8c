use image::RgbImage;

/// A template hit at the template's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub x: u32,
    pub y: u32,
    pub score: f32,
}

/// Correlation-matching primitive.
pub trait TemplateMatcher {
    /// Every position scoring at least `threshold`, in row-major order.
    fn locate(&self, image: &RgbImage, template: &RgbImage, threshold: f32) -> Vec<Match>;

    /// Best score anywhere in `image`, `f32::NEG_INFINITY` if the template does not fit.
    fn best_score(&self, image: &RgbImage, template: &RgbImage) -> f32 {
        self.locate(image, template, f32::NEG_INFINITY)
            .iter()
            .map(|m| m.score)
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Mean-subtracted normalized cross-correlation summed over the RGB channels.
///
/// Scores range over `[-1, 1]`. Windows or templates without any variance
/// score 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedCorrelation;

impl NormalizedCorrelation {
    fn score_at(
        image: &RgbImage,
        x: u32,
        y: u32,
        template: &[f64],
        template_norm: f64,
        width: u32,
        height: u32,
    ) -> f32 {
        let raw = image.as_raw();
        let stride = image.width() as usize * 3;
        let n = (width * height) as f64;

        let mut sum = [0f64; 3];
        let mut sum_sq = [0f64; 3];
        let mut cross = 0f64;
        for ty in 0..height as usize {
            let row = (y as usize + ty) * stride + x as usize * 3;
            for tx in 0..width as usize {
                for c in 0..3 {
                    let v = raw[row + tx * 3 + c] as f64;
                    sum[c] += v;
                    sum_sq[c] += v * v;
                    // The template is zero-mean, so the window mean drops out here.
                    cross += v * template[(ty * width as usize + tx) * 3 + c];
                }
            }
        }
        let window_norm: f64 = (0..3).map(|c| sum_sq[c] - sum[c] * sum[c] / n).sum();
        let denom = (window_norm.max(0.0) * template_norm).sqrt();
        if denom <= 1e-6 {
            0.0
        } else {
            (cross / denom) as f32
        }
    }
}

impl TemplateMatcher for NormalizedCorrelation {
    fn locate(&self, image: &RgbImage, template: &RgbImage, threshold: f32) -> Vec<Match> {
        let (width, height) = template.dimensions();
        if width == 0 || height == 0 || width > image.width() || height > image.height() {
            return vec![];
        }

        let n = (width * height) as f64;
        let mut mean = [0f64; 3];
        for pixel in template.pixels() {
            for c in 0..3 {
                mean[c] += pixel[c] as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);
        let centered: Vec<f64> = template
            .pixels()
            .flat_map(|p| (0..3).map(move |c| p[c] as f64 - mean[c]))
            .collect();
        let template_norm: f64 = centered.iter().map(|v| v * v).sum();

        let mut matches = vec![];
        for y in 0..=image.height() - height {
            for x in 0..=image.width() - width {
                let score =
                    Self::score_at(image, x, y, &centered, template_norm, width, height);
                if score >= threshold {
                    matches.push(Match { x, y, score });
                }
            }
        }
        matches
    }
}
