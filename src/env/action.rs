use serde::{Deserialize, Serialize};

/// Cardinal direction the maze runner can move
///
/// Discriminants match the action-vector index used by the agents:
/// 0 Up, 1 Right, 2 Down, 3 Left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// All directions in action-index order
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Number of discrete actions
    pub const COUNT: usize = Self::ALL.len();

    /// Map an action index to a direction, `None` when out of range
    pub fn from_index(idx: usize) -> Option<Direction> {
        Self::ALL.get(idx).copied()
    }

    /// Action index of this direction
    pub fn index(self) -> usize {
        self as usize
    }
}
