//! Turns captured screen regions into classified cards.
//!
//! The pipeline is: capture the board, locate card corners by correlation,
//! carve glyph and suit patches, classify the suit against four icons and hand
//! the glyph to a [`GlyphClassifier`].

mod capture;
mod glyph;
mod localize;
mod matcher;

pub use self::capture::*;
pub use self::glyph::*;
pub use self::localize::*;
pub use self::matcher::*;

use crate::board::{Card, Point};
use crate::config::{Config, Patch};
use crate::error::PlayError;

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A classified face-up card and the column it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub column: usize,
    pub card: Card,
}

/// Source of fresh observations of the game.
pub trait Perception {
    /// Face-up cards whose corner is visible on the board, in scan order.
    fn detect_cards(&mut self) -> Result<Vec<Detection>>;

    /// The exposed draw-pile card, `None` when it cannot be read.
    fn detect_deck(&mut self) -> Result<Option<Card>>;
}

/// Reference images matched against the screen.
#[derive(Debug, Clone)]
pub struct Templates {
    pub corner: RgbImage,
    /// Indexed like [`crate::board::Suit::ALL`].
    pub suits: [RgbImage; 4],
}

impl Templates {
    /// Loads `card.png` and the four suit icons from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let load = |name: &str| -> Result<RgbImage> {
            let path = dir.join(name);
            Ok(image::open(&path)
                .with_context(|| format!("Failed to load template '{}'", path.display()))?
                .to_rgb8())
        };
        Ok(Self {
            corner: load("card.png")?,
            suits: [
                load("diamond.png")?,
                load("heart.png")?,
                load("spade.png")?,
                load("club.png")?,
            ],
        })
    }
}

/// [`Perception`] backed by screen captures.
pub struct ScreenPerception<C, M> {
    capture: C,
    matcher: M,
    templates: Templates,
    classifier: Arc<dyn GlyphClassifier>,
    config: Config,
}

impl<C: ScreenCapture, M: TemplateMatcher> ScreenPerception<C, M> {
    pub fn new(
        capture: C,
        matcher: M,
        templates: Templates,
        classifier: Arc<dyn GlyphClassifier>,
        config: Config,
    ) -> Self {
        Self {
            capture,
            matcher,
            templates,
            classifier,
            config,
        }
    }

    fn classify(
        &self,
        glyph: &RgbImage,
        suit: &RgbImage,
        location: Point,
    ) -> Result<Card, PlayError> {
        let label = self
            .classifier
            .classify(glyph)
            .ok_or_else(|| PlayError::Perception("glyph not recognized".into()))?;
        let suit = classify_suit(suit, &self.templates.suits, &self.matcher);
        Card::from_label(&label, suit, location)
    }

    /// Classifies every card corner in a captured board region.
    pub fn read_board(&self, region: &RgbImage) -> Vec<Detection> {
        let board = self.config.board;
        let mut detections = vec![];
        for located in locate_cards(region, &self.templates.corner, &self.matcher, &self.config) {
            let location = board.to_screen(located.x, located.y);
            match self.classify(&located.glyph, &located.suit, location) {
                Ok(card) => {
                    debug!(column = located.column, "Detected {card} at {location:?}");
                    detections.push(Detection {
                        column: located.column,
                        card,
                    });
                }
                Err(err) => warn!("Skipping card at {location:?}: {err}"),
            }
        }
        detections
    }

    /// Reads the exposed card from a captured deck region.
    pub fn read_deck(&self, region: &RgbImage) -> Option<Card> {
        let layout = &self.config.deck;
        let lit = |(x, y): (u32, u32)| {
            x < region.width()
                && y < region.height()
                && region.get_pixel(x, y)[0] > layout.brightness
        };
        let mut col = layout.root_cols[0];
        if lit(layout.probes[0]) {
            col = layout.root_cols[1];
        }
        if lit(layout.probes[1]) {
            col = layout.root_cols[2];
        }

        let glyph_patch = Patch {
            dx: 0,
            dy: 0,
            ..self.config.corner.glyph
        };
        let glyph = carve(region, col, layout.root_row, &glyph_patch)?;
        let suit = carve(region, col, layout.root_row, &self.config.corner.suit)?;
        let location = layout.region.to_screen(
            col + glyph_patch.width as i32,
            layout.root_row + glyph_patch.height as i32,
        );
        match self.classify(&glyph, &suit, location) {
            Ok(card) => Some(card),
            Err(err) => {
                debug!("Deck card not read: {err}");
                None
            }
        }
    }
}

impl<C: ScreenCapture, M: TemplateMatcher> Perception for ScreenPerception<C, M> {
    fn detect_cards(&mut self) -> Result<Vec<Detection>> {
        let region = self
            .capture
            .capture(self.config.board)
            .context("Failed to capture the board")?;
        Ok(self.read_board(&region))
    }

    fn detect_deck(&mut self) -> Result<Option<Card>> {
        let region = self
            .capture
            .capture(self.config.deck.region)
            .context("Failed to capture the deck")?;
        Ok(self.read_deck(&region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Rank, Suit};
    use crate::config::Region;
    use crate::vision::glyph::tests::glyph;
    use crate::vision::matcher::tests::{paste, pattern};
    use image::Rgb;

    /// Serves crops of one still frame positioned at the screen origin.
    struct StillFrame(RgbImage);

    impl ScreenCapture for StillFrame {
        fn capture(&mut self, region: Region) -> Result<RgbImage> {
            Ok(image::imageops::crop_imm(
                &self.0,
                region.x as u32,
                region.y as u32,
                region.width,
                region.height,
            )
            .to_image())
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.board = Region::new(0, 0, 200, 80);
        config.corner.glyph = Patch {
            dx: 2,
            dy: -20,
            width: 6,
            height: 5,
        };
        config.corner.suit = Patch {
            dx: 0,
            dy: 6,
            width: 6,
            height: 5,
        };
        config.columns_x = [12, 37, 62, 87, 112, 137, 162];
        config.deck.region = Region::new(0, 100, 60, 20);
        config.deck.root_row = 2;
        config.deck.root_cols = [1, 20, 40];
        config.deck.probes = [(18, 1), (38, 1)];
        config
    }

    fn templates() -> Templates {
        Templates {
            corner: pattern(8, 8, 0),
            suits: std::array::from_fn(|i| pattern(6, 5, i as u32 + 1)),
        }
    }

    fn classifier() -> Arc<dyn GlyphClassifier> {
        Arc::new(
            SampleClassifier::from_samples([
                ("A".to_string(), glyph(0)),
                ("7".to_string(), glyph(1)),
                ("Q".to_string(), glyph(2)),
            ])
            .unwrap(),
        )
    }

    /// Draws a card corner with its glyph and suit icon at `anchor`.
    fn draw_card(screen: &mut RgbImage, anchor: (u32, u32), glyph_seed: u32, suit: Suit) {
        let templates = templates();
        let (ax, ay) = anchor;
        paste(screen, &templates.corner, ax, ay);
        paste(screen, &glyph(glyph_seed), ax + 2, ay - 20);
        paste(screen, &templates.suits[suit.index()], ax + 2, ay - 14);
    }

    fn perception(screen: RgbImage) -> ScreenPerception<StillFrame, NormalizedCorrelation> {
        ScreenPerception::new(
            StillFrame(screen),
            NormalizedCorrelation,
            templates(),
            classifier(),
            test_config(),
        )
    }

    #[test]
    fn test_detect_cards() {
        let mut screen = RgbImage::from_pixel(200, 140, Rgb([40, 120, 40]));
        draw_card(&mut screen, (160, 30), 2, Suit::Hearts);
        draw_card(&mut screen, (10, 40), 0, Suit::Spades);
        draw_card(&mut screen, (85, 60), 1, Suit::Clubs);

        let mut perception = perception(screen);
        let detections = perception.detect_cards().unwrap();
        let found: Vec<_> = detections
            .iter()
            .map(|d| (d.column, d.card.pretty_print(), d.card.location))
            .collect();
        assert_eq!(
            found,
            [
                (6, "QH".to_string(), (168, 15)),
                (0, "AS".to_string(), (18, 25)),
                (3, "7C".to_string(), (93, 45)),
            ]
        );
        // Same frame, same answer
        assert_eq!(perception.detect_cards().unwrap(), detections);
    }

    #[test]
    fn test_detect_cards_on_empty_board() {
        let screen = RgbImage::from_pixel(200, 140, Rgb([40, 120, 40]));
        assert!(perception(screen).detect_cards().unwrap().is_empty());
    }

    #[test]
    fn test_detect_deck_follows_fan() {
        let mut screen = RgbImage::from_pixel(200, 140, Rgb([40, 120, 40]));
        let suits = templates().suits;
        paste(&mut screen, &glyph(1), 20, 102);
        paste(&mut screen, &suits[Suit::Diamonds.index()], 20, 108);
        screen.put_pixel(18, 101, Rgb([250, 250, 250]));

        let card = perception(screen.clone()).detect_deck().unwrap().unwrap();
        assert_eq!(card, Card::new(Rank::new(7).unwrap(), Suit::Diamonds, (0, 0)));
        assert_eq!(card.location, (26, 107));

        // Probe dark: the first position is read, and it is blank
        screen.put_pixel(18, 101, Rgb([0, 0, 0]));
        assert_eq!(perception(screen).detect_deck().unwrap(), None);
    }
}
