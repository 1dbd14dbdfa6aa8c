use crate::config::Region;

use anyhow::Result;
use image::RgbImage;

/// Grabs the pixels of a screen region.
pub trait ScreenCapture {
    fn capture(&mut self, region: Region) -> Result<RgbImage>;
}

#[cfg(windows)]
pub use self::screen::ScreenshotCapture;

#[cfg(windows)]
mod screen {
    use super::*;

    use anyhow::{Context, anyhow};
    use image::DynamicImage;
    use screenshots::Screen;

    /// Captures from the display containing the screen origin.
    pub struct ScreenshotCapture {
        screen: Screen,
    }

    impl ScreenshotCapture {
        pub fn primary() -> Result<Self> {
            let screen = Screen::from_point(0, 0)
                .map_err(|err| anyhow!("{err}"))
                .context("Failed to find the primary display")?;
            Ok(Self { screen })
        }
    }

    impl ScreenCapture for ScreenshotCapture {
        fn capture(&mut self, region: Region) -> Result<RgbImage> {
            let x = region.x - self.screen.display_info.x;
            let y = region.y - self.screen.display_info.y;
            let image = self
                .screen
                .capture_area(x, y, region.width, region.height)
                .map_err(|err| anyhow!("{err}"))
                .with_context(|| format!("Failed to capture {region:?}"))?;
            Ok(DynamicImage::ImageRgba8(image).to_rgb8())
        }
    }
}

#[cfg(not(windows))]
pub struct ScreenshotCapture;

#[cfg(not(windows))]
impl ScreenshotCapture {
    pub fn primary() -> Result<Self> {
        anyhow::bail!("Screen capture is only supported on Windows");
    }
}

#[cfg(not(windows))]
impl ScreenCapture for ScreenshotCapture {
    fn capture(&mut self, _region: Region) -> Result<RgbImage> {
        anyhow::bail!("Screen capture is only supported on Windows");
    }
}
