//! Finds face-up card corners in a captured board region and carves the rank
//! glyph and suit icon out of each one.

use super::matcher::{Match, TemplateMatcher};
use crate::board::Suit;
use crate::config::{Config, Patch};

use image::RgbImage;
use tracing::{debug, trace};

/// A card corner found on the board, before its glyph is classified.
#[derive(Debug, Clone)]
pub struct LocatedCard {
    pub column: usize,
    pub glyph: RgbImage,
    pub suit: RgbImage,
    /// Bottom-right corner of the glyph, in region coordinates.
    pub x: i32,
    pub y: i32,
}

/// Collapses each blob of neighbouring hits into its first hit in scan order.
///
/// A hit is dropped when it lies within `margin` pixels, both horizontally and
/// vertically, of any hit already accepted in this scan. This is wider than a
/// horizontal check against the last accepted hit alone: fanned corners in one
/// column share an x and are only told apart by their y.
pub fn dedup_anchors(matches: &[Match], margin: u32) -> Vec<Match> {
    let mut accepted: Vec<Match> = vec![];
    for m in matches {
        let near = accepted
            .iter()
            .any(|a| a.x.abs_diff(m.x) < margin && a.y.abs_diff(m.y) < margin);
        if !near {
            accepted.push(*m);
        }
    }
    accepted
}

/// Nearest column by x; on a tie the earlier column wins.
pub fn column_for(x: i32, columns_x: &[i32]) -> usize {
    let mut column = 0;
    let mut min_dist = None;
    for (i, &cx) in columns_x.iter().enumerate() {
        let dist = (cx - x).unsigned_abs();
        if min_dist.is_none_or(|min| dist < min) {
            column = i;
            min_dist = Some(dist);
        }
    }
    column
}

/// Copies `patch` placed at `(x, y)`, or `None` if it falls outside the image.
pub fn carve(image: &RgbImage, x: i32, y: i32, patch: &Patch) -> Option<RgbImage> {
    let left = u32::try_from(x + patch.dx).ok()?;
    let top = u32::try_from(y + patch.dy).ok()?;
    if left + patch.width > image.width() || top + patch.height > image.height() {
        return None;
    }
    Some(image::imageops::crop_imm(image, left, top, patch.width, patch.height).to_image())
}

/// Locates every card corner and carves its glyph and suit patches.
pub fn locate_cards<M: TemplateMatcher + ?Sized>(
    region: &RgbImage,
    corner: &RgbImage,
    matcher: &M,
    config: &Config,
) -> Vec<LocatedCard> {
    let hits = matcher.locate(region, corner, config.vision.threshold);
    let anchors = dedup_anchors(&hits, config.vision.margin);
    trace!(hits = hits.len(), anchors = anchors.len(), "Card corners");

    let mut cards = vec![];
    for anchor in anchors {
        let (ax, ay) = (anchor.x as i32, anchor.y as i32);
        let layout = &config.corner;
        let Some(glyph) = carve(region, ax, ay, &layout.glyph) else {
            debug!("Corner at ({ax}, {ay}) has its glyph outside the region");
            continue;
        };
        let gx = ax + layout.glyph.dx;
        let gy = ay + layout.glyph.dy;
        let Some(suit) = carve(region, gx, gy, &layout.suit) else {
            debug!("Corner at ({ax}, {ay}) has its suit outside the region");
            continue;
        };
        cards.push(LocatedCard {
            column: column_for(gx, &config.columns_x),
            glyph,
            suit,
            x: gx + layout.glyph.width as i32,
            y: gy + layout.glyph.height as i32,
        });
    }
    cards
}

/// Suit whose icon correlates best with `patch`. Never fails; ties go to the
/// earlier suit.
pub fn classify_suit<M: TemplateMatcher + ?Sized>(
    patch: &RgbImage,
    icons: &[RgbImage; 4],
    matcher: &M,
) -> Suit {
    let mut best = (Suit::Diamonds, f32::NEG_INFINITY);
    for (suit, icon) in Suit::ALL.into_iter().zip(icons) {
        let score = matcher.best_score(patch, icon);
        if score > best.1 {
            best = (suit, score);
        }
    }
    best.0
}
