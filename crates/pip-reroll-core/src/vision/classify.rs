//! Pip classification.
//!
//! The processing loop only depends on the [`Classifier`] trait. The
//! [`PaletteClassifier`] is a color-matching implementation good enough for
//! the stock pip colors; hosts with a better recognizer plug in their own.

use serde::{Deserialize, Serialize};

use super::frame::Frame;
use crate::detection::DetectedObject;
use crate::error::Result;
use crate::rank::Rank;

/// Turns a captured frame into an ordered list of classified pips.
///
/// Two calls on the same static frame must return the same ranks, otherwise
/// stop confirmation is meaningless.
pub trait Classifier: Send {
    fn classify(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>>;
}

impl<F> Classifier for F
where
    F: FnMut(&Frame) -> Result<Vec<DetectedObject>> + Send,
{
    fn classify(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>> {
        self(frame)
    }
}

/// Palette classifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    /// Max per-channel difference for a pixel to match a rank color
    pub tolerance: u8,
    /// Smallest blob, in pixels, reported as a pip
    pub min_area: usize,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            tolerance: 40,
            min_area: 12,
        }
    }
}

/// Finds blobs of pixels matching one of the rank colors.
#[derive(Debug, Clone, Default)]
pub struct PaletteClassifier {
    config: PaletteConfig,
}

impl PaletteClassifier {
    pub fn new(config: PaletteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PaletteConfig {
        &self.config
    }

    /// Closest rank color within tolerance.
    fn match_rank(&self, rgb: (u8, u8, u8)) -> Option<Rank> {
        Rank::ALL
            .iter()
            .map(|rank| (*rank, color_distance(rgb, rank.rgb())))
            .filter(|(_, distance)| *distance <= self.config.tolerance)
            .min_by_key(|(_, distance)| *distance)
            .map(|(rank, _)| rank)
    }
}

impl Classifier for PaletteClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>> {
        let width = frame.width as usize;
        let height = frame.height as usize;

        let labels: Vec<Option<Rank>> = frame
            .as_bytes()
            .chunks_exact(Frame::CHANNELS)
            .map(|px| self.match_rank((px[0], px[1], px[2])))
            .collect();

        let mut visited = vec![false; labels.len()];
        let mut objects = Vec::new();
        let mut stack = Vec::new();

        for start in 0..labels.len() {
            let Some(rank) = labels[start] else {
                continue;
            };
            if visited[start] {
                continue;
            }

            // Flood fill the 4-connected blob of this rank
            visited[start] = true;
            stack.push(start);
            let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
            let (mut max_x, mut max_y) = (0usize, 0usize);
            let mut area = 0usize;

            while let Some(i) = stack.pop() {
                let (x, y) = (i % width, i / width);
                area += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let mut neighbors = [None; 4];
                if x > 0 {
                    neighbors[0] = Some(i - 1);
                }
                if x + 1 < width {
                    neighbors[1] = Some(i + 1);
                }
                if y > 0 {
                    neighbors[2] = Some(i - width);
                }
                if y + 1 < height {
                    neighbors[3] = Some(i + width);
                }

                for n in neighbors.into_iter().flatten() {
                    if !visited[n] && labels[n] == Some(rank) {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }

            if area >= self.config.min_area {
                objects.push(DetectedObject::new(
                    rank,
                    min_x as u32,
                    min_y as u32,
                    (max_x - min_x + 1) as u32,
                    (max_y - min_y + 1) as u32,
                ));
            }
        }

        objects.sort_by_key(|object| (object.x, object.y));
        Ok(objects)
    }
}

fn color_distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> u8 {
    a.0.abs_diff(b.0).max(a.1.abs_diff(b.1)).max(a.2.abs_diff(b.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKGROUND: (u8, u8, u8) = (20, 20, 20);

    fn classifier() -> PaletteClassifier {
        PaletteClassifier::new(PaletteConfig {
            tolerance: 10,
            min_area: 4,
        })
    }

    #[test]
    fn test_finds_pips_left_to_right() {
        let mut frame = Frame::filled(40, 10, BACKGROUND);
        frame.fill_rect(25, 2, 3, 3, Rank::Ss.rgb());
        frame.fill_rect(2, 2, 3, 3, Rank::A.rgb());
        frame.fill_rect(12, 4, 3, 3, Rank::F.rgb());

        let objects = classifier().classify(&frame).unwrap();
        let ranks: Vec<Rank> = objects.iter().map(|o| o.rank).collect();
        assert_eq!(ranks, vec![Rank::A, Rank::F, Rank::Ss]);

        assert_eq!(objects[0], DetectedObject::new(Rank::A, 2, 2, 3, 3));
        assert_eq!(objects[1].center(), (13, 5));
    }

    #[test]
    fn test_small_blobs_ignored() {
        let mut frame = Frame::filled(10, 10, BACKGROUND);
        frame.fill_rect(1, 1, 1, 2, Rank::S.rgb());

        assert!(classifier().classify(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_tolerance_allows_near_colors() {
        let (r, g, b) = Rank::B.rgb();
        let mut frame = Frame::filled(10, 10, BACKGROUND);
        frame.fill_rect(0, 0, 2, 2, (r.saturating_sub(5), g, b));
        frame.fill_rect(2, 0, 2, 2, (r, g.saturating_sub(4), b));

        let objects = classifier().classify(&frame).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].rank, Rank::B);
        assert_eq!(objects[0].width, 4);
    }

    #[test]
    fn test_adjacent_ranks_stay_separate() {
        let mut frame = Frame::filled(10, 4, BACKGROUND);
        frame.fill_rect(0, 0, 2, 2, Rank::S.rgb());
        frame.fill_rect(2, 0, 2, 2, Rank::Ss.rgb());

        let objects = classifier().classify(&frame).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].rank, Rank::S);
        assert_eq!(objects[1].rank, Rank::Ss);
    }

    #[test]
    fn test_deterministic() {
        let mut frame = Frame::filled(20, 20, BACKGROUND);
        frame.fill_rect(3, 3, 4, 4, Rank::C.rgb());
        frame.fill_rect(10, 10, 4, 4, Rank::D.rgb());

        let mut classifier = classifier();
        let first = classifier.classify(&frame).unwrap();
        let second = classifier.classify(&frame).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_closure_classifier() {
        let mut classify =
            |_frame: &Frame| -> Result<Vec<DetectedObject>> { Ok(vec![DetectedObject::at(Rank::A, 0, 0)]) };
        let frame = Frame::filled(1, 1, BACKGROUND);
        assert_eq!(Classifier::classify(&mut classify, &frame).unwrap().len(), 1);
    }
}
