//! Classification results and per-rank counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::rank::Rank;

/// A single classified pip in a captured frame.
///
/// Position and bounds are in frame pixels, relative to the top-left corner
/// of the capture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Assigned quality rank
    pub rank: Rank,
    /// Left edge of the bounding box
    pub x: u32,
    /// Top edge of the bounding box
    pub y: u32,
    /// Bounding box width
    pub width: u32,
    /// Bounding box height
    pub height: u32,
}

impl DetectedObject {
    pub fn new(rank: Rank, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            rank,
            x,
            y,
            width,
            height,
        }
    }

    /// Object with a one-pixel box, handy when only the rank matters.
    pub fn at(rank: Rank, x: u32, y: u32) -> Self {
        Self::new(rank, x, y, 1, 1)
    }

    /// Center of the bounding box.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Count of detected objects per rank.
///
/// Every rank always has an entry; ranks that were not seen are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<Rank, usize>", from = "BTreeMap<Rank, usize>")]
pub struct RankCounts {
    counts: [usize; Rank::COUNT],
}

impl RankCounts {
    /// All-zero counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally a detection set.
    pub fn from_objects(objects: &[DetectedObject]) -> Self {
        let mut counts = Self::new();
        for object in objects {
            counts.counts[object.rank.index()] += 1;
        }
        counts
    }

    pub fn get(&self, rank: Rank) -> usize {
        self.counts[rank.index()]
    }

    /// Total objects across all ranks.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(rank, count)` pairs, lowest rank first.
    pub fn iter(&self) -> impl Iterator<Item = (Rank, usize)> + '_ {
        Rank::ALL.iter().map(move |rank| (*rank, self.get(*rank)))
    }
}

impl From<RankCounts> for BTreeMap<Rank, usize> {
    fn from(counts: RankCounts) -> Self {
        counts.iter().collect()
    }
}

impl From<BTreeMap<Rank, usize>> for RankCounts {
    fn from(map: BTreeMap<Rank, usize>) -> Self {
        let mut counts = Self::new();
        for (rank, count) in map {
            counts.counts[rank.index()] = count;
        }
        counts
    }
}

impl std::fmt::Display for RankCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(rank, count)| format!("{}:{}", rank, count))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_from_objects() {
        let objects = vec![
            DetectedObject::at(Rank::D, 0, 0),
            DetectedObject::at(Rank::D, 10, 0),
            DetectedObject::at(Rank::S, 20, 0),
        ];
        let counts = RankCounts::from_objects(&objects);

        assert_eq!(counts.get(Rank::D), 2);
        assert_eq!(counts.get(Rank::S), 1);
        for rank in [Rank::F, Rank::C, Rank::B, Rank::A, Rank::Ss] {
            assert_eq!(counts.get(rank), 0);
        }
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_counts_always_have_every_rank() {
        let counts = RankCounts::new();
        assert_eq!(counts.iter().count(), Rank::COUNT);
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn test_counts_serialize_as_map() {
        let counts = RankCounts::from_objects(&[DetectedObject::at(Rank::Ss, 0, 0)]);
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json["SS"], 1);
        assert_eq!(json["F"], 0);

        let back: RankCounts = serde_json::from_value(json).unwrap();
        assert_eq!(back, counts);
    }

    #[test]
    fn test_object_center() {
        let object = DetectedObject::new(Rank::A, 10, 20, 6, 4);
        assert_eq!(object.center(), (13, 22));
    }
}
