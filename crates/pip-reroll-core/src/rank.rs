//! Pip quality ranks.
//!
//! Ranks form a fixed total order from `F` (lowest) to `SS` (highest). Every
//! threshold comparison in the crate ("at least rank A") goes through the
//! derived `Ord`, so the declaration order below is load-bearing.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Quality rank assigned to a detected pip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    F,
    D,
    C,
    B,
    A,
    S,
    #[serde(rename = "SS")]
    Ss,
}

impl Rank {
    /// Number of ranks in the order.
    pub const COUNT: usize = 7;

    /// All ranks, lowest first.
    pub const ALL: [Rank; Rank::COUNT] = [
        Self::F,
        Self::D,
        Self::C,
        Self::B,
        Self::A,
        Self::S,
        Self::Ss,
    ];

    /// The single highest rank, counted separately by the SS requirement.
    pub const HIGHEST: Rank = Rank::Ss;

    /// Position in the order, `0` for `F`.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Rank label as shown in game and sent over the slots socket.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::F => "F",
            Self::D => "D",
            Self::C => "C",
            Self::B => "B",
            Self::A => "A",
            Self::S => "S",
            Self::Ss => "SS",
        }
    }

    /// Pip color as it appears on screen, blue-green-red.
    pub fn bgr(self) -> (u8, u8, u8) {
        match self {
            Self::F => (182, 171, 165),
            Self::D => (243, 177, 149),
            Self::C => (130, 255, 105),
            Self::B => (255, 134, 148),
            Self::A => (66, 201, 255),
            Self::S => (102, 56, 255),
            Self::Ss => (174, 130, 255),
        }
    }

    /// Pip color in red-green-blue order, matching captured frames.
    pub fn rgb(self) -> (u8, u8, u8) {
        let (b, g, r) = self.bgr();
        (r, g, b)
    }

    /// Display color as `#rrggbb`.
    pub fn hex(self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim();
        Rank::ALL
            .into_iter()
            .find(|rank| rank.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| Error::InvalidRank(label.to_string()))
    }
}
