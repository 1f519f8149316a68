use std::fmt;
use std::str::FromStr;

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grid-resolution coordinate of a single tile.
///
/// The senses feed keys per-target paths by the `"x,y"` rendering of this
/// type, so [`fmt::Display`] and [`FromStr`] are part of the wire contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Continuous position of the tile for visual interpolation.
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Error returned when a stringified tile coordinate cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tile coordinate {0:?}")]
pub struct ParseTileError(pub String);

impl FromStr for TileCoord {
    type Err = ParseTileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once(',').ok_or_else(|| ParseTileError(s.to_string()))?;
        let x = x.trim().parse().map_err(|_| ParseTileError(s.to_string()))?;
        let y = y.trim().parse().map_err(|_| ParseTileError(s.to_string()))?;
        Ok(Self { x, y })
    }
}

/// Eight-way compass facing. Positive `y` points south (screen convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    North,
    NorthEast,
    East,
    SouthEast,
    #[default]
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Facing {
    /// Facing for a step with the given tile delta.
    ///
    /// Returns `None` for the zero vector; a valid path never contains a
    /// zero-length segment, so callers treat that as a contract breach.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx.signum(), dy.signum()) {
            (0, 0) => None,
            (0, -1) => Some(Facing::North),
            (1, -1) => Some(Facing::NorthEast),
            (1, 0) => Some(Facing::East),
            (1, 1) => Some(Facing::SouthEast),
            (0, 1) => Some(Facing::South),
            (-1, 1) => Some(Facing::SouthWest),
            (-1, 0) => Some(Facing::West),
            (-1, -1) => Some(Facing::NorthWest),
            _ => unreachable!("signum returns -1, 0, or 1"),
        }
    }

    /// Facing for the step between two consecutive waypoints.
    pub fn from_step(from: TileCoord, to: TileCoord) -> Option<Self> {
        Self::from_delta(to.x - from.x, to.y - from.y)
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facing::North => "N",
            Facing::NorthEast => "NE",
            Facing::East => "E",
            Facing::SouthEast => "SE",
            Facing::South => "S",
            Facing::SouthWest => "SW",
            Facing::West => "W",
            Facing::NorthWest => "NW",
        };
        f.write_str(name)
    }
}
