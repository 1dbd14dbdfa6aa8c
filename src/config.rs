//! Screen calibration and pacing.
//!
//! Every field has a default calibrated for a 1920x1080 screen, so a YAML file
//! only needs to list what differs.

use crate::board::{FULL_DECK, Point, TOTAL_STACKS};

use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// An absolute screen rectangle.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Converts a point inside the region to absolute screen coordinates.
    pub fn to_screen(&self, x: i32, y: i32) -> Point {
        (self.x + x, self.y + y)
    }
}

/// A rectangle placed relative to some origin.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Patch {
    pub dx: i32,
    pub dy: i32,
    pub width: u32,
    pub height: u32,
}

/// Where the rank glyph and suit icon sit relative to a detected card corner.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CornerLayout {
    /// Relative to the corner anchor.
    pub glyph: Patch,
    /// Relative to the glyph origin.
    pub suit: Patch,
}

impl Default for CornerLayout {
    fn default() -> Self {
        Self {
            glyph: Patch {
                dx: 8,
                dy: -122,
                width: 21,
                height: 20,
            },
            suit: Patch {
                dx: 2,
                dy: 18,
                width: 19,
                height: 17,
            },
        }
    }
}

/// Where the exposed draw-pile card is read from.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeckLayout {
    pub region: Region,
    /// Glyph row inside the region.
    pub root_row: i32,
    /// Glyph column for the 1st, 2nd and 3rd fanned waste position.
    pub root_cols: [i32; 3],
    /// Pixels whose red channel lights up when the 2nd/3rd position is occupied.
    pub probes: [(u32, u32); 2],
    pub brightness: u8,
}

impl Default for DeckLayout {
    fn default() -> Self {
        Self {
            region: Region::new(1121, 92, 179, 44),
            root_row: 9,
            root_cols: [5, 27, 48],
            probes: [(128, 10), (140, 10)],
            brightness: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct VisionConfig {
    /// Minimum normalized correlation for a card corner.
    pub threshold: f32,
    /// Pixel margin that collapses neighbouring corner hits into one card.
    pub margin: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.95,
            margin: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimingConfig {
    pub draw_ms: u64,
    pub foundation_ms: u64,
    pub drag_leg_ms: u64,
    pub click_hold_ms: u64,
    pub observe_delay_ms: u64,
    pub observe_retries: u32,
    pub new_deal_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            draw_ms: 300,
            foundation_ms: 500,
            drag_leg_ms: 100,
            click_hold_ms: 0,
            observe_delay_ms: 300,
            observe_retries: 3,
            new_deal_ms: 2000,
        }
    }
}

impl TimingConfig {
    pub fn draw(&self) -> Duration {
        Duration::from_millis(self.draw_ms)
    }

    pub fn foundation(&self) -> Duration {
        Duration::from_millis(self.foundation_ms)
    }

    pub fn drag_leg(&self) -> Duration {
        Duration::from_millis(self.drag_leg_ms)
    }

    pub fn click_hold(&self) -> Duration {
        Duration::from_millis(self.click_hold_ms)
    }

    pub fn observe_delay(&self) -> Duration {
        Duration::from_millis(self.observe_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Captured area holding the seven stacks.
    pub board: Region,
    pub deck: DeckLayout,
    pub corner: CornerLayout,
    /// Column x positions inside `board`, matched against the glyph's left edge.
    pub columns_x: [i32; TOTAL_STACKS],
    /// Absolute x to drop a dragged card on each column.
    pub drop_x: [i32; TOTAL_STACKS],
    /// Absolute point of the draw pile.
    pub stock: Point,
    /// Vertical distance between fanned face-up cards.
    pub fan_offset_y: i32,
    pub full_deck: usize,
    /// Virtual key code that deals a new game.
    pub new_deal_key: u32,
    pub vision: VisionConfig,
    pub timing: TimingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board: Region::new(960, 270, 960, 774),
            deck: DeckLayout::default(),
            corner: CornerLayout::default(),
            columns_x: [86, 218, 347, 480, 615, 744, 873],
            drop_x: [1046, 1178, 1307, 1440, 1575, 1704, 1833],
            stock: (1040, 160),
            fan_offset_y: 30,
            full_deck: FULL_DECK,
            new_deal_key: 0x71,
            vision: VisionConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

impl Config {
    /// Loads a YAML file on disk, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path.to_path_buf(),
        })?;
        let config: Config =
            serde_yaml::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
                source,
                path: path.to_path_buf(),
            })?;
        config.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Checks the values without performing I/O.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.vision.threshold > 0.0 && self.vision.threshold <= 1.0) {
            return Err(format!(
                "vision.threshold must be in (0, 1], got {}",
                self.vision.threshold
            ));
        }
        if self.vision.margin == 0 {
            return Err("vision.margin must be positive".into());
        }
        if self.full_deck == 0 || self.full_deck > 52 {
            return Err(format!("full_deck must be in 1..=52, got {}", self.full_deck));
        }
        for (name, region) in [("board", &self.board), ("deck.region", &self.deck.region)] {
            if region.width == 0 || region.height == 0 {
                return Err(format!("{name} region is empty"));
            }
        }
        for (name, patch) in [("corner.glyph", &self.corner.glyph), ("corner.suit", &self.corner.suit)] {
            if patch.width == 0 || patch.height == 0 {
                return Err(format!("{name} patch is empty"));
            }
        }
        if self.columns_x.windows(2).any(|w| w[0] >= w[1]) {
            return Err("columns_x must be strictly increasing".into());
        }
        Ok(())
    }
}
